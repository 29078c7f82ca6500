#![deny(missing_docs)]

//! # plateau-core: Foundational Types for the PLATEAU Stack
//!
//! This crate defines the types every other crate in the workspace builds on.
//! It has no internal crate dependencies and performs no I/O.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** A [`MeshCode`] is validated
//!    at construction; a [`PackJobId`] cannot be passed where a feature URL is
//!    expected.
//!
//! 2. **Integer grid arithmetic.** The JIS area mesh codec works in units of
//!    1/8 arc-second, so every cell edge of every level is an exact integer and
//!    boundary points are assigned to exactly one cell.
//!
//! 3. **One status enum.** [`PackStatus`] is the only vocabulary for
//!    packaging-job state past the client boundary; remote status strings are
//!    mapped into it in one place (`plateau-client`).
//!
//! 4. **Structured errors.** [`ValidationError`] carries the rejected input.

pub mod error;
pub mod feature;
pub mod job;
pub mod mesh;

pub use error::ValidationError;
pub use feature::FeatureType;
pub use job::{DownloadDescriptor, Observation, PackJob, PackJobId, PackStatus};
pub use mesh::{MeshBounds, MeshCode, MeshLevel};
