//! Zarr V3 raster source.
//!
//! The array is 2-D with shape `[rows, cols]`, row 0 at the northern edge.
//! Its geographic extent is read from the `bbox` attribute as
//! `[min_lon, min_lat, max_lon, max_lat]`.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use nbs_common::{BoundingBox, CriterionId};
use tracing::debug;
use zarrs::array::Array;
use zarrs::array_subset::ArraySubset;
use zarrs::storage::ReadableStorageTraits;
use zarrs_filesystem::FilesystemStore;

use super::RasterSource;
use crate::error::{RasterError, Result};
use crate::types::{PixelWindow, RasterMetadata};

/// Raster backed by a Zarr array.
pub struct ZarrRasterSource<S: ReadableStorageTraits + Send + Sync + 'static> {
    criterion: CriterionId,
    array: Arc<Array<S>>,
    metadata: RasterMetadata,
}

impl<S: ReadableStorageTraits + Send + Sync + 'static> ZarrRasterSource<S> {
    /// Open the array at `path` inside `storage`.
    pub fn open(storage: S, path: &str, criterion: impl Into<CriterionId>) -> Result<Self> {
        let array = Array::open(Arc::new(storage), path)
            .map_err(|e| RasterError::open_failed(e.to_string()))?;

        let metadata = Self::extract_metadata(&array)?;

        Ok(Self {
            criterion: criterion.into(),
            array: Arc::new(array),
            metadata,
        })
    }

    fn extract_metadata(array: &Array<S>) -> Result<RasterMetadata> {
        let shape = array.shape();
        if shape.len() != 2 {
            return Err(RasterError::invalid_metadata(format!(
                "expected a 2-D array, found {} dimensions",
                shape.len()
            )));
        }

        let bounds = array
            .attributes()
            .get("bbox")
            .and_then(|v| v.as_array())
            .and_then(|arr| {
                if arr.len() == 4 {
                    Some(BoundingBox::new(
                        arr[0].as_f64()?,
                        arr[1].as_f64()?,
                        arr[2].as_f64()?,
                        arr[3].as_f64()?,
                    ))
                } else {
                    None
                }
            })
            .ok_or_else(|| RasterError::invalid_metadata("missing or malformed bbox attribute"))?;

        let metadata = RasterMetadata::new(bounds, shape[1] as usize, shape[0] as usize);
        metadata.validate()?;
        Ok(metadata)
    }
}

impl ZarrRasterSource<FilesystemStore> {
    /// Open a Zarr store directory whose root node is the array.
    pub fn open_dir(path: &Path, criterion: impl Into<CriterionId>) -> Result<Self> {
        let store = FilesystemStore::new(path)
            .map_err(|e| RasterError::open_failed(format!("{}: {}", path.display(), e)))?;
        Self::open(store, "/", criterion)
    }
}

#[async_trait]
impl<S: ReadableStorageTraits + Send + Sync + 'static> RasterSource for ZarrRasterSource<S> {
    fn criterion(&self) -> &CriterionId {
        &self.criterion
    }

    fn metadata(&self) -> &RasterMetadata {
        &self.metadata
    }

    async fn read_window(&self, window: &PixelWindow) -> Result<Vec<f32>> {
        let RasterMetadata { width, height, .. } = self.metadata;
        if !window.fits(width, height) {
            return Err(RasterError::OutOfBounds {
                requested: window.to_string(),
                width,
                height,
            });
        }

        // Zarr uses [row, col] indexing
        let subset = ArraySubset::new_with_start_shape(
            vec![window.y0 as u64, window.x0 as u64],
            vec![window.height() as u64, window.width() as u64],
        )
        .map_err(|e| RasterError::read_failed(e.to_string()))?;

        debug!(criterion = %self.criterion, window = %window, "Reading Zarr window");

        // Chunk decoding is CPU-bound
        let array = Arc::clone(&self.array);
        let data: Vec<f32> = tokio::task::spawn_blocking(move || {
            array
                .retrieve_array_subset_elements(&subset)
                .map_err(|e| RasterError::read_failed(e.to_string()))
        })
        .await
        .map_err(|e| RasterError::read_failed(format!("read task failed: {}", e)))??;

        if data.len() != window.len() {
            return Err(RasterError::SampleCount {
                expected: window.len(),
                actual: data.len(),
            });
        }
        Ok(data)
    }
}
