//! Core types for windowed raster access.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use nbs_common::{BoundingBox, CriterionId};
use serde::{Deserialize, Serialize};

use crate::catalog::RasterCatalog;
use crate::error::{RasterError, Result};
use crate::loader::{WindowLoad, WindowOutcome};

/// Full extent and pixel dimensions of a raster source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RasterMetadata {
    /// Geographic extent of the whole raster.
    pub bounds: BoundingBox,
    /// Number of columns.
    pub width: usize,
    /// Number of rows. Row 0 is the northern edge.
    pub height: usize,
}

impl RasterMetadata {
    pub fn new(bounds: BoundingBox, width: usize, height: usize) -> Self {
        Self {
            bounds,
            width,
            height,
        }
    }

    /// Check that the raster has pixels and a non-degenerate extent.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RasterError::invalid_metadata(format!(
                "raster has no pixels ({}x{})",
                self.width, self.height
            )));
        }
        if !self.bounds.is_valid() || self.bounds.width() <= 0.0 || self.bounds.height() <= 0.0 {
            return Err(RasterError::invalid_metadata(format!(
                "degenerate raster extent {}",
                self.bounds
            )));
        }
        Ok(())
    }

    /// Degrees per pixel as (x, y).
    pub fn resolution(&self) -> (f64, f64) {
        (
            self.bounds.width() / self.width as f64,
            self.bounds.height() / self.height as f64,
        )
    }

    pub fn pixel_count(&self) -> usize {
        self.width * self.height
    }
}

/// A rectangle in raster pixel space. Upper bounds are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PixelWindow {
    pub x0: usize,
    pub y0: usize,
    pub x1: usize,
    pub y1: usize,
}

impl PixelWindow {
    pub fn new(x0: usize, y0: usize, x1: usize, y1: usize) -> Self {
        Self { x0, y0, x1, y1 }
    }

    pub fn width(&self) -> usize {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> usize {
        self.y1.saturating_sub(self.y0)
    }

    /// Number of pixels covered.
    pub fn len(&self) -> usize {
        self.width() * self.height()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the window lies inside a raster of the given size.
    pub fn fits(&self, width: usize, height: usize) -> bool {
        !self.is_empty() && self.x1 <= width && self.y1 <= height
    }

    /// Key for the `raster-window` cache namespace.
    pub fn cache_key(&self, criterion: &CriterionId) -> String {
        format!("{}:{}:{}:{}:{}", criterion, self.x0, self.y0, self.x1, self.y1)
    }
}

impl std::fmt::Display for PixelWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}..{}, {}..{}]", self.x0, self.x1, self.y0, self.y1)
    }
}

/// Samples for one loaded pixel window, row-major from the north-west.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedWindow {
    pixel: PixelWindow,
    bounds: BoundingBox,
    samples: Arc<Vec<f32>>,
}

impl LoadedWindow {
    /// Fails unless `samples.len() == pixel.width() * pixel.height()`.
    pub fn new(pixel: PixelWindow, bounds: BoundingBox, samples: Vec<f32>) -> Result<Self> {
        if samples.len() != pixel.len() {
            return Err(RasterError::SampleCount {
                expected: pixel.len(),
                actual: samples.len(),
            });
        }
        Ok(Self {
            pixel,
            bounds,
            samples: Arc::new(samples),
        })
    }

    pub fn pixel(&self) -> &PixelWindow {
        &self.pixel
    }

    /// Geographic extent of the window.
    pub fn bounds(&self) -> &BoundingBox {
        &self.bounds
    }

    pub fn width(&self) -> usize {
        self.pixel.width()
    }

    pub fn height(&self) -> usize {
        self.pixel.height()
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Deep copy that shares no buffer with `self`.
    pub fn detached(&self) -> Self {
        Self {
            pixel: self.pixel,
            bounds: self.bounds,
            samples: Arc::new(self.samples.as_ref().clone()),
        }
    }
}

/// A criterion's raster source extent plus its most recently loaded window.
///
/// Each load replaces the window; windows are never merged.
#[derive(Debug, Clone, PartialEq)]
pub struct CriterionRaster {
    criterion: CriterionId,
    source: RasterMetadata,
    window: Option<LoadedWindow>,
    failed: bool,
}

impl CriterionRaster {
    pub fn new(criterion: CriterionId, source: RasterMetadata) -> Self {
        Self {
            criterion,
            source,
            window: None,
            failed: false,
        }
    }

    pub fn criterion(&self) -> &CriterionId {
        &self.criterion
    }

    pub fn source(&self) -> &RasterMetadata {
        &self.source
    }

    pub fn window(&self) -> Option<&LoadedWindow> {
        self.window.as_ref()
    }

    /// A failed criterion keeps no window and is never reloaded.
    pub fn is_failed(&self) -> bool {
        self.failed
    }

    pub fn replace_window(&mut self, window: Option<LoadedWindow>) {
        self.window = window;
    }

    pub fn mark_failed(&mut self) {
        self.failed = true;
        self.window = None;
    }

    pub fn detached(&self) -> Self {
        Self {
            criterion: self.criterion.clone(),
            source: self.source,
            window: self.window.as_ref().map(LoadedWindow::detached),
            failed: self.failed,
        }
    }
}

/// Every registered criterion raster, keyed by criterion.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RasterSet {
    rasters: BTreeMap<CriterionId, CriterionRaster>,
}

impl RasterSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every source in the catalog with no window loaded.
    pub fn from_catalog(catalog: &RasterCatalog) -> Self {
        let rasters = catalog
            .sources()
            .map(|source| {
                let id = source.criterion().clone();
                (id.clone(), CriterionRaster::new(id, *source.metadata()))
            })
            .collect();
        Self { rasters }
    }

    pub fn insert(&mut self, raster: CriterionRaster) {
        self.rasters.insert(raster.criterion().clone(), raster);
    }

    pub fn get(&self, criterion: &CriterionId) -> Option<&CriterionRaster> {
        self.rasters.get(criterion)
    }

    pub fn contains(&self, criterion: &CriterionId) -> bool {
        self.rasters.contains_key(criterion)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CriterionRaster> {
        self.rasters.values()
    }

    pub fn len(&self) -> usize {
        self.rasters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rasters.is_empty()
    }

    /// The subset of `wanted` that is registered and has not failed.
    pub fn loadable_criteria(&self, wanted: &BTreeSet<CriterionId>) -> BTreeSet<CriterionId> {
        wanted
            .iter()
            .filter(|id| self.rasters.get(*id).is_some_and(|r| !r.is_failed()))
            .cloned()
            .collect()
    }

    /// Replace windows with the outcome of a load.
    ///
    /// Skipped criteria keep whatever window they had.
    pub fn apply(&mut self, load: WindowLoad) {
        for (criterion, outcome) in load.outcomes {
            let Some(raster) = self.rasters.get_mut(&criterion) else {
                continue;
            };
            match outcome {
                WindowOutcome::Loaded(window) => raster.replace_window(Some(window)),
                WindowOutcome::OutsideExtent | WindowOutcome::TooLarge => {}
                WindowOutcome::Failed(_) => raster.mark_failed(),
            }
        }
    }

    /// Deep copy for handing to another thread.
    pub fn detached(&self) -> Self {
        Self {
            rasters: self
                .rasters
                .iter()
                .map(|(id, raster)| (id.clone(), raster.detached()))
                .collect(),
        }
    }
}

/// Counters from a single window load.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    pub loaded: usize,
    pub outside_extent: usize,
    pub too_large: usize,
    pub failed: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta() -> RasterMetadata {
        RasterMetadata::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 10, 10)
    }

    #[test]
    fn test_metadata_validate() {
        assert!(meta().validate().is_ok());
        assert!(RasterMetadata::new(BoundingBox::new(0.0, 0.0, 10.0, 10.0), 0, 10)
            .validate()
            .is_err());
        assert!(RasterMetadata::new(BoundingBox::new(0.0, 0.0, 0.0, 10.0), 10, 10)
            .validate()
            .is_err());
    }

    #[test]
    fn test_pixel_window_dimensions() {
        let w = PixelWindow::new(2, 3, 6, 5);
        assert_eq!(w.width(), 4);
        assert_eq!(w.height(), 2);
        assert_eq!(w.len(), 8);
        assert!(w.fits(6, 5));
        assert!(!w.fits(5, 5));
        assert_eq!(w.cache_key(&CriterionId::new("wet_soil")), "wet_soil:2:3:6:5");
    }

    #[test]
    fn test_loaded_window_rejects_wrong_length() {
        let w = PixelWindow::new(0, 0, 2, 2);
        let bounds = BoundingBox::new(0.0, 0.0, 2.0, 2.0);
        assert!(LoadedWindow::new(w, bounds, vec![0.0; 3]).is_err());
        assert!(LoadedWindow::new(w, bounds, vec![0.0; 4]).is_ok());
    }

    #[test]
    fn test_detached_does_not_share_samples() {
        let w = PixelWindow::new(0, 0, 1, 1);
        let window = LoadedWindow::new(w, BoundingBox::new(0.0, 0.0, 1.0, 1.0), vec![1.0]).unwrap();
        let copy = window.detached();
        assert_eq!(copy, window);
        assert!(!Arc::ptr_eq(&copy.samples, &window.samples));
    }

    #[test]
    fn test_apply_replaces_and_fails() {
        let wet = CriterionId::new("wet_soil");
        let slope = CriterionId::new("slope");
        let mut set = RasterSet::new();
        set.insert(CriterionRaster::new(wet.clone(), meta()));
        set.insert(CriterionRaster::new(slope.clone(), meta()));

        let window = LoadedWindow::new(
            PixelWindow::new(0, 0, 1, 1),
            BoundingBox::new(0.0, 9.0, 1.0, 10.0),
            vec![1.0],
        )
        .unwrap();

        let mut outcomes = BTreeMap::new();
        outcomes.insert(wet.clone(), WindowOutcome::Loaded(window));
        outcomes.insert(slope.clone(), WindowOutcome::Failed("boom".into()));
        set.apply(WindowLoad {
            extent: BoundingBox::new(0.0, 9.0, 1.0, 10.0),
            outcomes,
        });

        assert!(set.get(&wet).unwrap().window().is_some());
        assert!(set.get(&slope).unwrap().is_failed());

        let wanted: BTreeSet<_> = [wet.clone(), slope, CriterionId::new("unknown")]
            .into_iter()
            .collect();
        assert_eq!(set.loadable_criteria(&wanted), [wet].into_iter().collect());
    }
}
