//! Loads per-criterion pixel windows covering an extent of interest.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use metrics::counter;
use nbs_common::{BoundingBox, CriterionId};
use storage::{KeyValueStore, Namespace};
use tracing::{debug, info, instrument, warn};

use crate::catalog::RasterCatalog;
use crate::codec::{decode_samples, encode_samples};
use crate::config::RasterLoaderConfig;
use crate::error::Result;
use crate::source::RasterSource;
use crate::types::{LoadStats, LoadedWindow, PixelWindow};
use crate::window::{pixel_window_for, window_bounds};

/// What happened to one criterion during a load.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowOutcome {
    /// A window covering the extent was loaded.
    Loaded(LoadedWindow),
    /// The raster does not intersect the extent. Any previous window is kept.
    OutsideExtent,
    /// The covering window exceeded the configured pixel limit. Any
    /// previous window is kept.
    TooLarge,
    /// Reading failed; the criterion is zero-valued from now on.
    Failed(String),
}

/// Result of loading windows for one extent.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowLoad {
    pub extent: BoundingBox,
    pub outcomes: BTreeMap<CriterionId, WindowOutcome>,
}

impl WindowLoad {
    pub fn stats(&self) -> LoadStats {
        let mut stats = LoadStats::default();
        for outcome in self.outcomes.values() {
            match outcome {
                WindowOutcome::Loaded(_) => stats.loaded += 1,
                WindowOutcome::OutsideExtent => stats.outside_extent += 1,
                WindowOutcome::TooLarge => stats.too_large += 1,
                WindowOutcome::Failed(_) => stats.failed += 1,
            }
        }
        stats
    }
}

/// Loads raster windows through a key-value cache.
pub struct RasterWindowLoader {
    catalog: Arc<RasterCatalog>,
    cache: Arc<dyn KeyValueStore>,
    config: RasterLoaderConfig,
}

impl RasterWindowLoader {
    pub fn new(
        catalog: Arc<RasterCatalog>,
        cache: Arc<dyn KeyValueStore>,
        config: RasterLoaderConfig,
    ) -> Self {
        Self {
            catalog,
            cache,
            config,
        }
    }

    pub fn catalog(&self) -> &Arc<RasterCatalog> {
        &self.catalog
    }

    pub fn config(&self) -> &RasterLoaderConfig {
        &self.config
    }

    /// Load a window covering `extent` for each criterion in the catalog.
    ///
    /// Criteria without a registered source are ignored. A failure for one
    /// criterion is logged and reported in its outcome; the rest still load.
    #[instrument(skip(self, criteria), fields(criteria = criteria.len(), extent = %extent))]
    pub async fn load_windows(
        &self,
        criteria: &BTreeSet<CriterionId>,
        extent: &BoundingBox,
    ) -> WindowLoad {
        let tasks: Vec<_> = criteria
            .iter()
            .filter_map(|criterion| self.catalog.get(criterion).cloned())
            .map(|source| {
                let extent = *extent;
                async move {
                    let outcome = self.load_one(source.as_ref(), &extent).await;
                    (source.criterion().clone(), outcome)
                }
            })
            .collect();

        let outcomes: BTreeMap<_, _> = stream::iter(tasks)
            .buffer_unordered(self.config.max_concurrent_reads.max(1))
            .collect()
            .await;

        let load = WindowLoad {
            extent: *extent,
            outcomes,
        };

        let stats = load.stats();
        info!(
            loaded = stats.loaded,
            outside_extent = stats.outside_extent,
            too_large = stats.too_large,
            failed = stats.failed,
            "Raster windows loaded"
        );

        load
    }

    async fn load_one(&self, source: &dyn RasterSource, extent: &BoundingBox) -> WindowOutcome {
        let criterion = source.criterion();
        let meta = source.metadata();

        let Some(pixel) = pixel_window_for(extent, meta) else {
            debug!(criterion = %criterion, "Raster does not intersect extent");
            return WindowOutcome::OutsideExtent;
        };

        if pixel.len() > self.config.max_window_pixels {
            warn!(
                criterion = %criterion,
                pixels = pixel.len(),
                limit = self.config.max_window_pixels,
                "Raster window too large, skipping"
            );
            return WindowOutcome::TooLarge;
        }

        let samples = match self.read_samples(source, &pixel).await {
            Ok(samples) => samples,
            Err(e) => {
                counter!("raster_window_failures_total").increment(1);
                warn!(criterion = %criterion, window = %pixel, error = %e, "Failed to load raster window");
                return WindowOutcome::Failed(e.to_string());
            }
        };

        match LoadedWindow::new(pixel, window_bounds(&pixel, meta), samples) {
            Ok(window) => {
                counter!("raster_window_loads_total").increment(1);
                WindowOutcome::Loaded(window)
            }
            Err(e) => {
                counter!("raster_window_failures_total").increment(1);
                warn!(criterion = %criterion, error = %e, "Malformed raster window");
                WindowOutcome::Failed(e.to_string())
            }
        }
    }

    /// Cached samples if present, otherwise read from the source and cache.
    async fn read_samples(&self, source: &dyn RasterSource, pixel: &PixelWindow) -> Result<Vec<f32>> {
        let key = pixel.cache_key(source.criterion());

        if self.config.window_cache_enabled {
            match self.cache.get(Namespace::RasterWindow, &key).await {
                Ok(Some(bytes)) => {
                    if let Some(samples) = decode_samples(&bytes, pixel.len()) {
                        counter!("raster_window_cache_hits_total").increment(1);
                        debug!(key = %key, "Raster window cache hit");
                        return Ok(samples);
                    }
                    debug!(key = %key, "Discarding cached window with wrong length");
                }
                Ok(None) => debug!(key = %key, "Raster window cache miss"),
                Err(e) => warn!(key = %key, error = %e, "Raster window cache read failed"),
            }
        }

        let samples = source.read_window(pixel).await?;

        if self.config.window_cache_enabled {
            if let Err(e) = self
                .cache
                .put(Namespace::RasterWindow, &key, encode_samples(&samples))
                .await
            {
                warn!(key = %key, error = %e, "Raster window cache write failed");
            }
        }

        Ok(samples)
    }
}
