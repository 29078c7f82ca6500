//! # Download and Fetch Subcommands
//!
//! `plateau download` retrieves one archive URL (typically a completed pack
//! job's) into a directory and expands its CityGML files. `plateau fetch`
//! runs the whole catalog, pack, wait and download sequence for a mesh.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use plateau_client::PlateauClient;
use plateau_core::{FeatureType, MeshCode};

use crate::print_json;

/// Arguments for the `plateau download` subcommand.
#[derive(Args, Debug)]
pub struct DownloadArgs {
    /// Archive URL.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Directory to save into; created if missing.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,

    /// Mesh code the archive covers; names the extraction directory.
    #[arg(long)]
    pub mesh: Option<MeshCode>,

    /// Feature types the archive holds; names the extraction directory.
    #[arg(short = 't', long = "feature-type")]
    pub feature_types: Vec<FeatureType>,

    /// Keep the archive as downloaded without extracting it.
    #[arg(long)]
    pub no_extract: bool,
}

/// Arguments for the `plateau fetch` subcommand.
#[derive(Args, Debug)]
pub struct FetchArgs {
    /// Mesh code to fetch (typically a tertiary mesh, 8 digits).
    #[arg(value_name = "MESH")]
    pub mesh: MeshCode,

    /// Feature types to include.
    #[arg(short = 't', long = "feature-type", required = true)]
    pub feature_types: Vec<FeatureType>,

    /// Directory to save into; created if missing.
    #[arg(long, default_value = ".")]
    pub dir: PathBuf,
}

/// Execute `plateau download`.
pub async fn run_download(args: &DownloadArgs, client: &PlateauClient) -> Result<u8> {
    let archive = client
        .retrieval()
        .download(
            &args.url,
            &args.dir,
            args.mesh.as_ref(),
            &args.feature_types,
            !args.no_extract,
        )
        .await
        .with_context(|| format!("download of {} failed", args.url))?;
    print_json(&archive)?;
    Ok(0)
}

/// Execute `plateau fetch`.
pub async fn run_fetch(args: &FetchArgs, client: &PlateauClient) -> Result<u8> {
    let fetched = client
        .fetch_mesh(&args.mesh, &args.feature_types, &args.dir)
        .await
        .with_context(|| format!("fetching mesh {} failed", args.mesh))?;
    print_json(&fetched)?;
    Ok(0)
}
