//! Configuration for the raster window loader.

use serde::{Deserialize, Serialize};

/// Configuration for [`crate::RasterWindowLoader`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RasterLoaderConfig {
    /// Read and write decoded windows through the `raster-window` cache.
    pub window_cache_enabled: bool,

    /// Windows larger than this many pixels are not loaded.
    pub max_window_pixels: usize,

    /// Maximum number of criterion windows read concurrently.
    pub max_concurrent_reads: usize,
}

impl Default for RasterLoaderConfig {
    fn default() -> Self {
        Self {
            window_cache_enabled: true,
            max_window_pixels: 16_777_216,
            max_concurrent_reads: 8,
        }
    }
}

impl RasterLoaderConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `NBS_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("NBS_WINDOW_CACHE") {
            self.window_cache_enabled = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("NBS_MAX_WINDOW_PIXELS") {
            if let Ok(pixels) = val.parse() {
                self.max_window_pixels = pixels;
            }
        }

        if let Ok(val) = std::env::var("NBS_MAX_CONCURRENT_READS") {
            if let Ok(n) = val.parse() {
                self.max_concurrent_reads = n;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_window_pixels == 0 {
            return Err("max_window_pixels must be > 0".to_string());
        }

        if self.max_concurrent_reads == 0 {
            return Err("max_concurrent_reads must be > 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        let config = RasterLoaderConfig::default();
        assert!(config.validate().is_ok());
        assert!(config.window_cache_enabled);
    }

    #[test]
    fn test_invalid_config() {
        let config = RasterLoaderConfig {
            max_concurrent_reads: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = RasterLoaderConfig {
            max_window_pixels: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_document_uses_defaults() {
        let config: RasterLoaderConfig =
            serde_json::from_str(r#"{"max_concurrent_reads": 2}"#).unwrap();
        assert_eq!(config.max_concurrent_reads, 2);
        assert_eq!(config.max_window_pixels, 16_777_216);
    }
}
