//! # Validation Errors
//!
//! Errors raised when caller-supplied input fails domain validation. Each
//! variant carries the rejected value so the tool layer can tell the agent
//! exactly which argument to reformulate.

use thiserror::Error;

/// Validation errors for domain primitives.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Latitude is not finite or lies outside the mesh coverage area.
    #[error("latitude {0} is outside the area mesh coverage [0, 66.666…)")]
    LatitudeOutOfRange(f64),

    /// Longitude is not finite or lies outside the mesh coverage area.
    #[error("longitude {0} is outside the area mesh coverage [100, 180)")]
    LongitudeOutOfRange(f64),

    /// Mesh level is not one of 1..=5.
    #[error("invalid mesh level {0} (expected 1-5)")]
    InvalidMeshLevel(u8),

    /// Mesh code string is malformed.
    #[error("invalid mesh code \"{code}\": {reason}")]
    InvalidMeshCode {
        /// The string that failed to parse.
        code: String,
        /// Why it was rejected.
        reason: String,
    },

    /// Feature type code is not a known PLATEAU feature type.
    #[error("unknown feature type \"{0}\"")]
    UnknownFeatureType(String),

    /// Catalog condition is neither `m:<mesh code>` nor a municipality code.
    #[error("invalid catalog condition \"{0}\" (expected m:<mesh code> or a municipality code)")]
    InvalidCondition(String),

    /// Packaging job identifier is empty.
    #[error("pack job id must be non-empty")]
    EmptyJobId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_code_error_names_the_input() {
        let err = ValidationError::InvalidMeshCode {
            code: "53x9".into(),
            reason: "non-digit character".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("53x9"));
        assert!(msg.contains("non-digit"));
    }

    #[test]
    fn level_error_display() {
        assert_eq!(
            ValidationError::InvalidMeshLevel(6).to_string(),
            "invalid mesh level 6 (expected 1-5)"
        );
    }
}
