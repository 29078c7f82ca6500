//! # plateau-cli -- CLI Tool for the PLATEAU Stack
//!
//! Provides the `plateau` command-line interface. Every subcommand prints a
//! single JSON document on stdout so a tool-invocation layer can consume it
//! directly; logs go to stderr.
//!
//! ## Subcommands
//!
//! - `plateau mesh` / `plateau mesh-bounds` -- area mesh codes.
//! - `plateau list` -- CityGML file URLs from the data catalog.
//! - `plateau pack submit|status|wait|url` -- packaging jobs.
//! - `plateau download` / `plateau fetch` -- archive retrieval.
//! - `plateau attributes` / `features` / `spatial-attributes` -- feature attributes.
//! - `plateau qgis` -- QGIS load command for a CityGML file.
//!
//! ```bash
//! plateau mesh --lat 35.681 --lon 139.767 --level 3
//! plateau fetch 53394611 -t bldg -t tran --dir ./plateau
//! ```
//!
//! Failures print `{"error": {"kind": ..., "message": ...}}` and exit non-zero.

pub mod attributes;
pub mod catalog;
pub mod download;
pub mod mesh;
pub mod pack;
pub mod qgis;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use plateau_client::{PlateauApiConfig, PlateauApiError, PlateauClient};
use plateau_core::ValidationError;
use serde::Serialize;
use url::Url;

use crate::attributes::{AttributesArgs, FeaturesArgs, SpatialAttributesArgs};
use crate::catalog::ListArgs;
use crate::download::{DownloadArgs, FetchArgs};
use crate::mesh::{MeshArgs, MeshBoundsArgs};
use crate::pack::PackArgs;
use crate::qgis::QgisArgs;

/// PLATEAU CityGML toolkit
///
/// Converts coordinates to JIS area mesh codes, queries the PLATEAU data
/// catalog, packages and downloads CityGML, resolves feature attributes and
/// prepares QGIS load commands.
#[derive(Parser, Debug)]
#[command(name = "plateau", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// PLATEAU API base URL (overrides PLATEAU_API_URL).
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<Url>,

    /// Per-request timeout in seconds (overrides PLATEAU_TIMEOUT_SECS).
    #[arg(long, global = true, value_name = "SECS")]
    pub timeout: Option<u64>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Area mesh code for a latitude/longitude.
    Mesh(MeshArgs),

    /// Bounding box of an area mesh code.
    MeshBounds(MeshBoundsArgs),

    /// CityGML file URLs for a mesh or municipality and a feature type.
    List(ListArgs),

    /// Packaging jobs (submit, status, wait, url).
    Pack(PackArgs),

    /// Download an archive and extract its CityGML files.
    Download(DownloadArgs),

    /// Catalog, package, wait for and download the CityGML of one mesh.
    Fetch(FetchArgs),

    /// Attributes of one feature, with code-list labels.
    Attributes(AttributesArgs),

    /// Feature ids inside a spatial id.
    Features(FeaturesArgs),

    /// Attributes of every feature of a type inside a spatial id.
    SpatialAttributes(SpatialAttributesArgs),

    /// QGIS Python command that loads a CityGML file.
    Qgis(QgisArgs),
}

/// Connection overrides taken from global flags.
#[derive(Debug, Clone, Default)]
pub struct ClientOptions {
    pub base_url: Option<Url>,
    pub timeout_secs: Option<u64>,
}

impl ClientOptions {
    /// Environment configuration with flag overrides applied.
    pub fn config(&self) -> Result<PlateauApiConfig> {
        let mut config =
            PlateauApiConfig::from_env().context("failed to load PLATEAU configuration")?;
        if let Some(url) = &self.base_url {
            config.base_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            config.timeout_secs = secs;
        }
        Ok(config)
    }

    pub fn client(&self) -> Result<PlateauClient> {
        let config = self.config()?;
        tracing::debug!(?config, "building PLATEAU client");
        Ok(PlateauClient::new(config)?)
    }
}

/// Execute a parsed command line.
pub async fn run(cli: Cli) -> Result<u8> {
    let options = ClientOptions {
        base_url: cli.base_url,
        timeout_secs: cli.timeout,
    };

    match cli.command {
        Commands::Mesh(args) => mesh::run_mesh(&args),
        Commands::MeshBounds(args) => mesh::run_mesh_bounds(&args),
        Commands::Qgis(args) => qgis::run_qgis(&args),
        Commands::List(args) => catalog::run_list(&args, &options.client()?).await,
        Commands::Pack(args) => pack::run_pack(&args, &options.client()?).await,
        Commands::Download(args) => download::run_download(&args, &options.client()?).await,
        Commands::Fetch(args) => download::run_fetch(&args, &options.client()?).await,
        Commands::Attributes(args) => attributes::run_attributes(&args, &options.client()?).await,
        Commands::Features(args) => attributes::run_features(&args, &options.client()?).await,
        Commands::SpatialAttributes(args) => {
            attributes::run_spatial_attributes(&args, &options.client()?).await
        }
    }
}

/// Print `value` as pretty JSON on stdout.
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    let rendered = serde_json::to_string_pretty(value).context("failed to serialize output")?;
    println!("{rendered}");
    Ok(())
}

/// The `{"error": {...}}` document printed for a failed command.
pub fn error_report(err: &anyhow::Error) -> serde_json::Value {
    let kind = err
        .chain()
        .find_map(|e| {
            if let Some(api) = e.downcast_ref::<PlateauApiError>() {
                return serde_json::to_value(api.kind()).ok();
            }
            e.downcast_ref::<ValidationError>()
                .map(|_| serde_json::Value::from("InvalidInput"))
        })
        .unwrap_or_else(|| serde_json::Value::from("Internal"));

    serde_json::json!({
        "error": {
            "kind": kind,
            "message": format!("{err:#}"),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "plateau",
            "mesh",
            "--lat",
            "35.1",
            "--lon",
            "136.9",
            "--base-url",
            "http://127.0.0.1:8080",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.base_url.unwrap().as_str(), "http://127.0.0.1:8080/");
        assert!(matches!(cli.command, Commands::Mesh(_)));
    }

    #[test]
    fn rejects_invalid_base_url() {
        assert!(Cli::try_parse_from(["plateau", "--base-url", "not a url", "mesh-bounds", "5339"]).is_err());
    }

    #[test]
    fn requires_a_subcommand() {
        assert!(Cli::try_parse_from(["plateau"]).is_err());
    }

    #[test]
    fn options_override_config() {
        let options = ClientOptions {
            base_url: Some(Url::parse("http://127.0.0.1:9000").unwrap()),
            timeout_secs: Some(7),
        };
        let config = options.config().unwrap();
        assert_eq!(config.base_url.as_str(), "http://127.0.0.1:9000/");
        assert_eq!(config.timeout_secs, 7);
    }

    #[test]
    fn error_report_carries_api_error_kind() {
        let err = anyhow::Error::new(PlateauApiError::UnknownJob { id: "j-1".into() })
            .context("pack status failed");
        let report = error_report(&err);
        assert_eq!(report["error"]["kind"], "UnknownJob");
        let message = report["error"]["message"].as_str().unwrap();
        assert!(message.contains("pack status failed"));
        assert!(message.contains("j-1"));
    }

    #[test]
    fn error_report_maps_validation_and_other_errors() {
        let invalid = anyhow::Error::new(ValidationError::InvalidMeshLevel(9));
        assert_eq!(error_report(&invalid)["error"]["kind"], "InvalidInput");

        let other = anyhow::anyhow!("disk on fire");
        assert_eq!(error_report(&other)["error"]["kind"], "Internal");
    }
}
