//! # Pack Subcommand
//!
//! Packaging-job lifecycle: submit source URLs, probe or wait for status, and
//! resolve the archive location of a completed job.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use plateau_client::PlateauClient;
use plateau_core::PackJobId;

use crate::print_json;

/// Arguments for the `plateau pack` subcommand.
#[derive(Args, Debug)]
pub struct PackArgs {
    #[command(subcommand)]
    pub command: PackCommand,
}

/// Pack subcommands.
#[derive(Subcommand, Debug)]
pub enum PackCommand {
    /// Submit CityGML URLs for packaging into one zip archive.
    Submit {
        /// CityGML file URLs (duplicates are dropped).
        #[arg(value_name = "URL", required = true)]
        urls: Vec<String>,
    },

    /// Probe a job's status once.
    Status {
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Poll a job until it completes, fails or the wait times out.
    Wait {
        #[arg(value_name = "ID")]
        id: String,
        /// Seconds between polls (default: PLATEAU_POLL_INTERVAL_SECS).
        #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
        interval: Option<u64>,
        /// Seconds to wait before giving up (default: PLATEAU_PACK_TIMEOUT_SECS).
        #[arg(long, value_name = "SECS")]
        max_wait: Option<u64>,
    },

    /// Download location of a completed job.
    Url {
        #[arg(value_name = "ID")]
        id: String,
    },
}

/// Execute the pack subcommand.
pub async fn run_pack(args: &PackArgs, client: &PlateauClient) -> Result<u8> {
    let pack = client.pack();
    match &args.command {
        PackCommand::Submit { urls } => {
            let job = pack
                .submit(urls.iter().cloned())
                .await
                .context("pack submission failed")?;
            print_json(&job)?;
        }
        PackCommand::Status { id } => {
            let job = pack
                .poll(&PackJobId::new(id.as_str())?)
                .await
                .with_context(|| format!("status probe for pack job {id} failed"))?;
            print_json(&job)?;
        }
        PackCommand::Wait {
            id,
            interval,
            max_wait,
        } => {
            let config = client.config();
            let interval = interval.map_or(config.poll_interval(), Duration::from_secs);
            let max_wait = max_wait.map_or(config.pack_timeout(), Duration::from_secs);
            let job = pack
                .await_completion(&PackJobId::new(id.as_str())?, interval, max_wait)
                .await
                .with_context(|| format!("waiting for pack job {id} failed"))?;
            print_json(&job)?;
        }
        PackCommand::Url { id } => {
            let job = pack
                .poll(&PackJobId::new(id.as_str())?)
                .await
                .with_context(|| format!("status probe for pack job {id} failed"))?;
            print_json(&pack.resolve_download(&job)?)?;
        }
    }
    Ok(0)
}
