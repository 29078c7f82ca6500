//! # Mesh Subcommands
//!
//! `plateau mesh` converts a latitude/longitude into a JIS area mesh code;
//! `plateau mesh-bounds` reports the cell a code covers. Neither touches the
//! network.

use anyhow::Result;
use clap::Args;
use plateau_core::mesh::{decode, encode};
use plateau_core::MeshCode;
use serde::Serialize;

use crate::print_json;

/// Arguments for the `plateau mesh` subcommand.
#[derive(Args, Debug)]
pub struct MeshArgs {
    /// Latitude in decimal degrees (JGD2011).
    #[arg(long, allow_hyphen_values = true)]
    pub lat: f64,

    /// Longitude in decimal degrees (JGD2011).
    #[arg(long, allow_hyphen_values = true)]
    pub lon: f64,

    /// Mesh level: 1 primary, 2 secondary, 3 tertiary, 4 half, 5 quarter.
    #[arg(long, default_value_t = 2)]
    pub level: u8,
}

/// Arguments for the `plateau mesh-bounds` subcommand.
#[derive(Args, Debug)]
pub struct MeshBoundsArgs {
    /// Mesh code (4, 6, 8, 9 or 10 digits).
    #[arg(value_name = "CODE")]
    pub code: String,
}

#[derive(Debug, Serialize)]
struct MeshOutput {
    mesh_code: MeshCode,
    level: u8,
    lat: f64,
    lon: f64,
}

#[derive(Debug, Serialize)]
struct BoundsOutput {
    mesh_code: String,
    level: u8,
    south: f64,
    west: f64,
    north: f64,
    east: f64,
    center: [f64; 2],
}

/// Execute `plateau mesh`.
pub fn run_mesh(args: &MeshArgs) -> Result<u8> {
    let code = encode(args.lat, args.lon, args.level)?;
    tracing::debug!(lat = args.lat, lon = args.lon, %code, "encoded mesh code");
    print_json(&MeshOutput {
        level: code.level().as_u8(),
        mesh_code: code,
        lat: args.lat,
        lon: args.lon,
    })?;
    Ok(0)
}

/// Execute `plateau mesh-bounds`.
pub fn run_mesh_bounds(args: &MeshBoundsArgs) -> Result<u8> {
    print_json(&bounds_output(&args.code)?)?;
    Ok(0)
}

fn bounds_output(code: &str) -> Result<BoundsOutput> {
    let code = code.trim();
    let bounds = decode(code)?;
    let (lat, lon) = bounds.center();
    Ok(BoundsOutput {
        mesh_code: code.to_string(),
        level: MeshCode::parse(code)?.level().as_u8(),
        south: bounds.south,
        west: bounds.west,
        north: bounds.north,
        east: bounds.east,
        center: [lat, lon],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Cli;
    use clap::Parser;

    #[test]
    fn mesh_defaults_to_secondary_level() {
        let cli = Cli::try_parse_from(["plateau", "mesh", "--lat", "35.1", "--lon", "136.9"]).unwrap();
        match cli.command {
            crate::Commands::Mesh(args) => assert_eq!(args.level, 2),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn mesh_accepts_negative_coordinates_for_validation() {
        let cli = Cli::try_parse_from(["plateau", "mesh", "--lat", "-1", "--lon", "139"]).unwrap();
        match cli.command {
            crate::Commands::Mesh(args) => {
                let err = run_mesh(&args).unwrap_err();
                assert!(err.downcast_ref::<plateau_core::ValidationError>().is_some());
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn bounds_of_primary_mesh() {
        let out = bounds_output("5339").unwrap();
        assert_eq!(out.level, 1);
        assert!((out.south - 35.333_333).abs() < 1e-5);
        assert!((out.west - 139.0).abs() < 1e-9);
        assert!((out.north - 36.0).abs() < 1e-9);
        assert!((out.east - 140.0).abs() < 1e-9);
    }

    #[test]
    fn bounds_rejects_malformed_code() {
        assert!(bounds_output("53x9").is_err());
    }
}
