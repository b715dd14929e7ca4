//! Registry of raster sources by criterion.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::Arc;

use nbs_common::CriterionId;
use tracing::{info, warn};

use crate::source::{RasterSource, ZarrRasterSource};

/// The raster sources available to the engine.
#[derive(Default, Clone)]
pub struct RasterCatalog {
    sources: BTreeMap<CriterionId, Arc<dyn RasterSource>>,
}

impl RasterCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a source under its own criterion, replacing any previous one.
    pub fn insert(&mut self, source: Arc<dyn RasterSource>) {
        self.sources.insert(source.criterion().clone(), source);
    }

    pub fn with_source(mut self, source: Arc<dyn RasterSource>) -> Self {
        self.insert(source);
        self
    }

    pub fn get(&self, criterion: &CriterionId) -> Option<&Arc<dyn RasterSource>> {
        self.sources.get(criterion)
    }

    pub fn sources(&self) -> impl Iterator<Item = &Arc<dyn RasterSource>> {
        self.sources.values()
    }

    pub fn criteria(&self) -> impl Iterator<Item = &CriterionId> {
        self.sources.keys()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Open `{dir}/{criterion}.zarr` for each criterion.
    ///
    /// Missing or malformed rasters are logged and left out; they never
    /// prevent the others from opening.
    pub fn open_zarr_directory(dir: &Path, criteria: &BTreeSet<CriterionId>) -> Self {
        let mut catalog = Self::new();

        for criterion in criteria {
            let path = dir.join(format!("{}.zarr", criterion));
            if !path.exists() {
                warn!(criterion = %criterion, path = %path.display(), "Raster not found for criterion");
                continue;
            }

            match ZarrRasterSource::open_dir(&path, criterion.clone()) {
                Ok(source) => {
                    let meta = source.metadata();
                    info!(
                        criterion = %criterion,
                        width = meta.width,
                        height = meta.height,
                        bounds = %meta.bounds,
                        "Opened criterion raster"
                    );
                    catalog.insert(Arc::new(source));
                }
                Err(e) => {
                    warn!(criterion = %criterion, error = %e, "Failed to open criterion raster");
                }
            }
        }

        catalog
    }
}

impl std::fmt::Debug for RasterCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RasterCatalog")
            .field("criteria", &self.sources.keys().collect::<Vec<_>>())
            .finish()
    }
}
