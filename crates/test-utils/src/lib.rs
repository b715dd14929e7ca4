//! Shared test utilities for the NBS suitability workspace.
//!
//! This crate provides common testing infrastructure including:
//! - Raster data generators
//! - Configuration document fixtures
//! - Zarr raster writers for integration tests
//!
//! # Usage
//!
//! Add to your crate's `Cargo.toml`:
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { path = "../test-utils" }
//! ```
//!
//! Then import in your tests:
//!
//! ```ignore
//! use test_utils::{fixtures, write_zarr_raster};
//! ```

pub mod fixtures;
pub mod generators;
pub mod zarr;

// Re-export commonly used items at the crate root
pub use fixtures::*;
pub use generators::*;
pub use zarr::*;

/// Creates a temporary directory that is removed when dropped.
pub fn temp_test_dir() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("nbs-test-")
        .tempdir()
        .expect("Failed to create temp directory")
}
