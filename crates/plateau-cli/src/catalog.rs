//! # List Subcommand
//!
//! Queries the PLATEAU data catalog for the CityGML files of one feature type
//! within a mesh (`m:53394611`) or municipality (`13101`).

use anyhow::{Context, Result};
use clap::Args;
use plateau_client::{Conditions, PlateauClient};
use plateau_core::FeatureType;
use serde::Serialize;

use crate::print_json;

/// Arguments for the `plateau list` subcommand.
#[derive(Args, Debug)]
pub struct ListArgs {
    /// `m:<mesh code>` or a municipality code.
    #[arg(value_name = "CONDITIONS")]
    pub conditions: String,

    /// Feature type code (bldg, tran, brid, urf, luse, fld, tnm, lsld, htd, ifld, frn, veg, dem).
    #[arg(short = 't', long = "feature-type")]
    pub feature_type: FeatureType,
}

#[derive(Debug, Serialize)]
struct ListOutput<'a> {
    conditions: &'a str,
    feature_type: FeatureType,
    urls: Vec<String>,
}

/// Execute `plateau list`.
pub async fn run_list(args: &ListArgs, client: &PlateauClient) -> Result<u8> {
    let conditions = Conditions::parse(&args.conditions)?;
    let urls = client
        .catalog()
        .list_citygml(&conditions, args.feature_type)
        .await
        .with_context(|| format!("catalog lookup for {conditions} failed"))?;

    print_json(&ListOutput {
        conditions: conditions.as_str(),
        feature_type: args.feature_type,
        urls,
    })?;
    Ok(0)
}
