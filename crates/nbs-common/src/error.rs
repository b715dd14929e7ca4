//! Error types for the suitability engine.

use thiserror::Error;

/// Result type alias using NbsError.
pub type NbsResult<T> = Result<T, NbsError>;

/// Primary error type for engine operations.
///
/// Only configuration problems are fatal. Raster, sampling and ranking
/// edge cases degrade to zero scores and never surface here.
#[derive(Debug, Error)]
pub enum NbsError {
    // === Configuration Errors ===
    #[error("Failed to fetch configuration document '{document}': {message}")]
    ConfigFetch { document: String, message: String },

    #[error("Failed to parse configuration document '{document}': {message}")]
    ConfigParse { document: String, message: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown challenge category: {0}")]
    UnknownCategory(String),

    // === Input Errors ===
    #[error("Invalid cell key: {0}")]
    InvalidCellKey(String),

    #[error("Invalid parameter value for '{param}': {message}")]
    InvalidParameter { param: String, message: String },

    // === Data Errors ===
    #[error("Raster error: {0}")]
    RasterError(String),

    #[error("Cache error: {0}")]
    CacheError(String),

    // === Infrastructure Errors ===
    #[error("Scoring worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl NbsError {
    /// Whether this error must abort initialization.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            NbsError::ConfigFetch { .. }
                | NbsError::ConfigParse { .. }
                | NbsError::InvalidConfig(_)
        )
    }

    pub fn config_fetch(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigFetch {
            document: document.into(),
            message: message.into(),
        }
    }

    pub fn config_parse(document: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigParse {
            document: document.into(),
            message: message.into(),
        }
    }

    pub fn invalid_parameter(param: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            param: param.into(),
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for NbsError {
    fn from(err: std::io::Error) -> Self {
        NbsError::InternalError(err.to_string())
    }
}

impl From<serde_json::Error> for NbsError {
    fn from(err: serde_json::Error) -> Self {
        NbsError::InternalError(format!("JSON error: {}", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(NbsError::config_fetch("solutionCosts", "404").is_fatal());
        assert!(NbsError::InvalidConfig("negative weight".into()).is_fatal());
        assert!(!NbsError::RasterError("bad window".into()).is_fatal());
        assert!(!NbsError::UnknownCategory("Drought".into()).is_fatal());
    }

    #[test]
    fn test_display() {
        let err = NbsError::config_parse("solutionCriteria", "expected map");
        assert_eq!(
            err.to_string(),
            "Failed to parse configuration document 'solutionCriteria': expected map"
        );
    }
}
