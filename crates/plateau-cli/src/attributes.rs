//! # Attribute Subcommands
//!
//! Feature attribute lookups. Coded values are labelled from server code
//! lists unless `--skip-code-list-fetch` is given.

use anyhow::{Context, Result};
use clap::Args;
use plateau_client::PlateauClient;

use crate::print_json;

/// Arguments for the `plateau attributes` subcommand.
#[derive(Args, Debug)]
pub struct AttributesArgs {
    /// CityGML file URL.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Feature id (`gml:id`) within the file.
    #[arg(value_name = "ID")]
    pub id: String,

    /// Return raw codes without fetching code lists.
    #[arg(long)]
    pub skip_code_list_fetch: bool,
}

/// Arguments for the `plateau features` subcommand.
#[derive(Args, Debug)]
pub struct FeaturesArgs {
    /// CityGML file URL.
    #[arg(value_name = "URL")]
    pub url: String,

    /// Spatial id.
    #[arg(value_name = "SID", allow_hyphen_values = true)]
    pub sid: String,
}

/// Arguments for the `plateau spatial-attributes` subcommand.
#[derive(Args, Debug)]
pub struct SpatialAttributesArgs {
    /// Spatial id.
    #[arg(value_name = "SID", allow_hyphen_values = true)]
    pub sid: String,

    /// Feature class, e.g. `Building`.
    #[arg(long = "type", value_name = "TYPE")]
    pub feature_type: String,

    /// Return raw codes without fetching code lists.
    #[arg(long)]
    pub skip_code_list_fetch: bool,
}

/// Execute `plateau attributes`.
pub async fn run_attributes(args: &AttributesArgs, client: &PlateauClient) -> Result<u8> {
    let resolved = client
        .attributes()
        .resolve(&args.url, &args.id, args.skip_code_list_fetch)
        .await
        .with_context(|| format!("attribute lookup for {} failed", args.id))?;
    print_json(&resolved)?;
    Ok(0)
}

/// Execute `plateau features`.
pub async fn run_features(args: &FeaturesArgs, client: &PlateauClient) -> Result<u8> {
    let features = client
        .attributes()
        .features(&args.url, &args.sid)
        .await
        .with_context(|| format!("feature lookup for spatial id {} failed", args.sid))?;
    print_json(&features)?;
    Ok(0)
}

/// Execute `plateau spatial-attributes`.
pub async fn run_spatial_attributes(
    args: &SpatialAttributesArgs,
    client: &PlateauClient,
) -> Result<u8> {
    let resolved = client
        .attributes()
        .resolve_spatial(&args.sid, &args.feature_type, args.skip_code_list_fetch)
        .await
        .with_context(|| format!("attribute lookup for spatial id {} failed", args.sid))?;
    print_json(&resolved)?;
    Ok(0)
}
