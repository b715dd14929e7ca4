//! Raster held entirely in memory.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use nbs_common::{BoundingBox, CriterionId};

use super::RasterSource;
use crate::error::{RasterError, Result};
use crate::types::{PixelWindow, RasterMetadata};

/// In-memory raster, mainly for tests and small derived layers.
#[derive(Debug)]
pub struct MemoryRaster {
    criterion: CriterionId,
    metadata: RasterMetadata,
    samples: Vec<f32>,
    reads: AtomicUsize,
}

impl MemoryRaster {
    /// `samples` is row-major with row 0 at the northern edge.
    pub fn new(
        criterion: impl Into<CriterionId>,
        bounds: BoundingBox,
        width: usize,
        height: usize,
        samples: Vec<f32>,
    ) -> Result<Self> {
        let metadata = RasterMetadata::new(bounds, width, height);
        metadata.validate()?;
        if samples.len() != metadata.pixel_count() {
            return Err(RasterError::SampleCount {
                expected: metadata.pixel_count(),
                actual: samples.len(),
            });
        }
        Ok(Self {
            criterion: criterion.into(),
            metadata,
            samples,
            reads: AtomicUsize::new(0),
        })
    }

    /// Raster with every pixel set to `value`.
    pub fn filled(
        criterion: impl Into<CriterionId>,
        bounds: BoundingBox,
        width: usize,
        height: usize,
        value: f32,
    ) -> Result<Self> {
        Self::new(criterion, bounds, width, height, vec![value; width * height])
    }

    /// Number of window reads served so far.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RasterSource for MemoryRaster {
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
        self.reads.fetch_add(1, Ordering::Relaxed);

        let mut out = Vec::with_capacity(window.len());
        for row in window.y0..window.y1 {
            let start = row * width;
            out.extend_from_slice(&self.samples[start + window.x0..start + window.x1]);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_read_window_rows() {
        // value = row * 10 + col over 4x3
        let samples = (0..3)
            .flat_map(|row| (0..4).map(move |col| (row * 10 + col) as f32))
            .collect();
        let raster =
            MemoryRaster::new("wet_soil", BoundingBox::new(0.0, 0.0, 4.0, 3.0), 4, 3, samples)
                .unwrap();

        let data = raster.read_window(&PixelWindow::new(1, 1, 3, 3)).await.unwrap();
        assert_eq!(data, vec![11.0, 12.0, 21.0, 22.0]);
        assert_eq!(raster.reads(), 1);
    }

    #[tokio::test]
    async fn test_read_window_out_of_bounds() {
        let raster =
            MemoryRaster::filled("slope", BoundingBox::new(0.0, 0.0, 2.0, 2.0), 2, 2, 1.0).unwrap();
        let result = raster.read_window(&PixelWindow::new(0, 0, 3, 1)).await;
        assert!(matches!(result, Err(RasterError::OutOfBounds { .. })));
        assert_eq!(raster.reads(), 0);
    }

    #[test]
    fn test_sample_count_checked() {
        let result = MemoryRaster::new("x", BoundingBox::new(0.0, 0.0, 1.0, 1.0), 2, 2, vec![0.0]);
        assert!(matches!(result, Err(RasterError::SampleCount { expected: 4, actual: 1 })));
    }
}
