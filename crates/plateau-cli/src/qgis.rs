//! # QGIS Subcommand
//!
//! Builds the one-line Python command that loads a CityGML file into QGIS
//! through the PLATEAU QGIS plugin's `load_as_vector` processing algorithm.
//! The command is only generated; running it is left to whoever drives QGIS.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use clap::Args;
use serde::Serialize;

use crate::print_json;

/// CRS of PLATEAU CityGML (JGD2011 geographic 3D).
pub const PLATEAU_CRS: &str = "EPSG:6668";

/// Arguments for the `plateau qgis` subcommand.
#[derive(Args, Debug)]
pub struct QgisArgs {
    /// Path of the CityGML file to load.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// LOD preference: 0 simplest, 1 detailed, 2 all.
    #[arg(long, default_value_t = 0)]
    pub lod: u8,

    /// One layer per semantic part (walls, roofs, ...).
    #[arg(long)]
    pub semantic_parts: bool,
}

#[derive(Debug, Serialize)]
struct QgisOutput {
    command: String,
    status: &'static str,
    message: &'static str,
}

/// `processing.runAndLoadResults(...)` command for `path`.
///
/// # Errors
///
/// Fails when `lod_preference` is not 0, 1 or 2, or the path is not valid UTF-8.
pub fn load_command(path: &Path, lod_preference: u8, semantic_parts: bool) -> Result<String> {
    if lod_preference > 2 {
        bail!("LOD preference must be 0, 1 or 2, got {lod_preference}");
    }
    let Some(path) = path.to_str() else {
        bail!("path {} is not valid UTF-8", path.display());
    };
    let semantic = if semantic_parts { "True" } else { "False" };
    Ok(format!(
        "processing.runAndLoadResults(\"plateau_plugin:load_as_vector\", {{'INPUT': {input}, \
         'LOD_PREFERENCE': {lod_preference}, 'SEMANTIC_PARTS': {semantic}, 'FORCE_2D': False, \
         'APPEND_MODE': True, 'CRS': QgsCoordinateReferenceSystem('{PLATEAU_CRS}')}})",
        input = python_string(path),
    ))
}

/// Single-quoted Python string literal.
fn python_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('\'');
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Execute `plateau qgis`.
pub fn run_qgis(args: &QgisArgs) -> Result<u8> {
    let command = load_command(&args.path, args.lod, args.semantic_parts)?;
    print_json(&QgisOutput {
        command,
        status: "ready",
        message: "Run in the QGIS Python console with the PLATEAU QGIS plugin enabled.",
    })?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_plugin_command() {
        let cmd = load_command(Path::new("/data/53394611_bldg_6697_op.gml"), 1, true).unwrap();
        assert_eq!(
            cmd,
            "processing.runAndLoadResults(\"plateau_plugin:load_as_vector\", \
             {'INPUT': '/data/53394611_bldg_6697_op.gml', 'LOD_PREFERENCE': 1, \
             'SEMANTIC_PARTS': True, 'FORCE_2D': False, 'APPEND_MODE': True, \
             'CRS': QgsCoordinateReferenceSystem('EPSG:6668')})"
        );
    }

    #[test]
    fn rejects_lod_out_of_range() {
        assert!(load_command(Path::new("a.gml"), 3, false).is_err());
    }

    #[test]
    fn quotes_awkward_paths() {
        let cmd = load_command(Path::new(r"C:\data\o'brien.gml"), 0, false).unwrap();
        assert!(cmd.contains(r"'INPUT': 'C:\\data\\o\'brien.gml'"));
        assert!(cmd.contains("'SEMANTIC_PARTS': False"));
    }

    #[test]
    fn python_string_escapes_control_characters() {
        assert_eq!(python_string("a\nb"), r"'a\nb'");
    }
}
