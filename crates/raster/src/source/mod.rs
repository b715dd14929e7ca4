//! Raster sources: one gridded geographic raster per criterion.

mod memory;
mod zarr;

pub use memory::MemoryRaster;
pub use zarr::ZarrRasterSource;

use async_trait::async_trait;
use nbs_common::CriterionId;

use crate::error::Result;
use crate::types::{PixelWindow, RasterMetadata};

/// A single-band raster that supports windowed reads.
#[async_trait]
pub trait RasterSource: Send + Sync {
    /// The criterion this raster represents.
    fn criterion(&self) -> &CriterionId;

    /// Full extent and pixel dimensions.
    fn metadata(&self) -> &RasterMetadata;

    /// Read the samples inside `window`, row-major from the north-west.
    ///
    /// The returned vector holds exactly `window.len()` values.
    async fn read_window(&self, window: &PixelWindow) -> Result<Vec<f32>>;
}
