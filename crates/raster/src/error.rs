//! Error types for raster access.

use thiserror::Error;

/// Errors that can occur while opening or reading a raster.
///
/// These never escape the window loader: a failing criterion is logged and
/// skipped while the others load.
#[derive(Error, Debug)]
pub enum RasterError {
    /// Failed to open the raster source.
    #[error("failed to open raster: {0}")]
    OpenFailed(String),

    /// Failed to read data from the raster.
    #[error("failed to read raster window: {0}")]
    ReadFailed(String),

    /// The requested pixel window is outside the raster.
    #[error("pixel window {requested} is outside raster of {width}x{height}")]
    OutOfBounds {
        requested: String,
        width: usize,
        height: usize,
    },

    /// Invalid or missing metadata on the raster source.
    #[error("invalid raster metadata: {0}")]
    InvalidMetadata(String),

    /// Sample count does not match the window dimensions.
    #[error("window holds {actual} samples, expected {expected}")]
    SampleCount { expected: usize, actual: usize },

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl RasterError {
    /// Create an OpenFailed error.
    pub fn open_failed(msg: impl Into<String>) -> Self {
        Self::OpenFailed(msg.into())
    }

    /// Create a ReadFailed error.
    pub fn read_failed(msg: impl Into<String>) -> Self {
        Self::ReadFailed(msg.into())
    }

    /// Create an InvalidMetadata error.
    pub fn invalid_metadata(msg: impl Into<String>) -> Self {
        Self::InvalidMetadata(msg.into())
    }
}

impl From<std::io::Error> for RasterError {
    fn from(err: std::io::Error) -> Self {
        Self::ReadFailed(err.to_string())
    }
}

impl From<RasterError> for nbs_common::NbsError {
    fn from(err: RasterError) -> Self {
        nbs_common::NbsError::RasterError(err.to_string())
    }
}

/// Result type for raster operations.
pub type Result<T> = std::result::Result<T, RasterError>;
