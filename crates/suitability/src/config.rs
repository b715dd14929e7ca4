//! Engine configuration.

use std::path::{Path, PathBuf};

use nbs_common::{NbsError, NbsResult};
use raster::RasterLoaderConfig;
use serde::{Deserialize, Serialize};

use crate::config_loader::{ConfigSource, FileConfigSource, HttpConfigSource};

/// Configuration for [`crate::SuitabilityEngine`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Cell edge length in meters.
    pub cell_size_meters: f64,

    /// Quiet interval before a scheduled refresh runs.
    pub quiet_interval_ms: u64,

    /// Viewports needing more cells than this generate none.
    pub max_cells: usize,

    /// Score on a background worker instead of inline.
    pub worker_enabled: bool,

    /// Category active after initialization. Defaults to the first one
    /// in the configuration.
    pub default_category: Option<String>,

    /// Base URL of the configuration documents.
    pub config_url: Option<String>,

    /// Directory holding the configuration documents. Used when no URL is set.
    pub config_dir: Option<PathBuf>,

    /// Directory of `<criterion>.zarr` rasters.
    pub raster_dir: Option<PathBuf>,

    /// Redis URL for the persistent cache. In-memory when unset.
    pub redis_url: Option<String>,

    /// Entries kept by the in-memory cache.
    pub cache_capacity: usize,

    pub raster: RasterLoaderConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            cell_size_meters: 100.0,
            quiet_interval_ms: 250,
            max_cells: 40_000,
            worker_enabled: false,
            default_category: None,
            config_url: None,
            config_dir: None,
            raster_dir: None,
            redis_url: None,
            cache_capacity: 256,
            raster: RasterLoaderConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Load configuration from a YAML file, then apply environment overrides.
    pub fn from_yaml_file(path: &Path) -> NbsResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            NbsError::InvalidConfig(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let mut config: Self = serde_yaml::from_str(&text).map_err(|e| {
            NbsError::InvalidConfig(format!("Failed to parse {}: {}", path.display(), e))
        })?;
        config.apply_env();
        Ok(config)
    }

    /// Override fields from `NBS_*` environment variables.
    pub fn apply_env(&mut self) {
        if let Ok(val) = std::env::var("NBS_CELL_SIZE_METERS") {
            if let Ok(meters) = val.parse() {
                self.cell_size_meters = meters;
            }
        }

        if let Ok(val) = std::env::var("NBS_QUIET_INTERVAL_MS") {
            if let Ok(ms) = val.parse() {
                self.quiet_interval_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("NBS_MAX_CELLS") {
            if let Ok(n) = val.parse() {
                self.max_cells = n;
            }
        }

        if let Ok(val) = std::env::var("NBS_WORKER") {
            self.worker_enabled = val.to_lowercase() == "true" || val == "1";
        }

        if let Ok(val) = std::env::var("NBS_CATEGORY") {
            self.default_category = Some(val);
        }

        if let Ok(val) = std::env::var("NBS_CONFIG_URL") {
            self.config_url = Some(val);
        }

        if let Ok(val) = std::env::var("NBS_CONFIG_DIR") {
            self.config_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("NBS_RASTER_DIR") {
            self.raster_dir = Some(PathBuf::from(val));
        }

        if let Ok(val) = std::env::var("REDIS_URL") {
            self.redis_url = Some(val);
        }

        if let Ok(val) = std::env::var("NBS_CACHE_CAPACITY") {
            if let Ok(n) = val.parse() {
                self.cache_capacity = n;
            }
        }

        self.raster.apply_env();
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if !self.cell_size_meters.is_finite() || self.cell_size_meters <= 0.0 {
            return Err("cell_size_meters must be a positive number".to_string());
        }

        if self.max_cells == 0 {
            return Err("max_cells must be > 0".to_string());
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }

        self.raster.validate()
    }

    pub fn quiet_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.quiet_interval_ms)
    }

    /// The configuration source named by this config: the URL if set,
    /// otherwise the directory.
    pub fn config_source(&self) -> NbsResult<Box<dyn ConfigSource>> {
        if let Some(url) = &self.config_url {
            return Ok(Box::new(HttpConfigSource::new(url.clone())?));
        }
        if let Some(dir) = &self.config_dir {
            return Ok(Box::new(FileConfigSource::new(dir.clone())));
        }
        Err(NbsError::InvalidConfig(
            "either config_url or config_dir must be set".to_string(),
        ))
    }
}
