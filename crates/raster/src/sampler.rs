//! Nearest-pixel point sampling against a loaded window.

use crate::types::CriterionRaster;

/// Sample the raster value at `(lat, lng)`.
///
/// Returns 0 when the raster is absent, has no window, the point lies
/// outside the window, the computed pixel is out of range, or the stored
/// value is not finite. Never panics.
pub fn sample(raster: Option<&CriterionRaster>, lat: f64, lng: f64) -> f64 {
    let Some(window) = raster.and_then(CriterionRaster::window) else {
        return 0.0;
    };

    let bounds = window.bounds();
    if !bounds.contains(lng, lat) {
        return 0.0;
    }

    let (span_x, span_y) = (bounds.width(), bounds.height());
    if !(span_x > 0.0 && span_y > 0.0) {
        return 0.0;
    }

    let (width, height) = (window.width(), window.height());
    let x = ((lng - bounds.min_lon) / span_x * width as f64).floor();
    // Row 0 is the northern edge
    let y = ((bounds.max_lat - lat) / span_y * height as f64).floor();

    if !(x >= 0.0 && y >= 0.0 && x < width as f64 && y < height as f64) {
        return 0.0;
    }

    let (col, row) = (x as usize, y as usize);
    match window.samples().get(row * width + col) {
        Some(value) if value.is_finite() => f64::from(*value),
        _ => 0.0,
    }
}

/// Sample clamped to `[0, 1]`, used as a criterion's presence at a point.
pub fn sample_presence(raster: Option<&CriterionRaster>, lat: f64, lng: f64) -> f64 {
    sample(raster, lat, lng).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LoadedWindow, PixelWindow, RasterMetadata};
    use nbs_common::{BoundingBox, CriterionId};

    /// 4x2 window over lon 0..4, lat 0..2; value = row * 10 + col.
    fn raster() -> CriterionRaster {
        let bounds = BoundingBox::new(0.0, 0.0, 4.0, 2.0);
        let mut raster = CriterionRaster::new(
            CriterionId::new("wet_soil"),
            RasterMetadata::new(bounds, 4, 2),
        );
        let samples = (0..2)
            .flat_map(|row| (0..4).map(move |col| (row * 10 + col) as f32))
            .collect();
        raster.replace_window(Some(
            LoadedWindow::new(PixelWindow::new(0, 0, 4, 2), bounds, samples).unwrap(),
        ));
        raster
    }

    #[test]
    fn test_absent_raster_or_window() {
        assert_eq!(sample(None, 1.0, 1.0), 0.0);
        let empty = CriterionRaster::new(
            CriterionId::new("slope"),
            RasterMetadata::new(BoundingBox::new(0.0, 0.0, 1.0, 1.0), 1, 1),
        );
        assert_eq!(sample(Some(&empty), 0.5, 0.5), 0.0);
    }

    #[test]
    fn test_nearest_pixel_with_inverted_rows() {
        let r = raster();
        // North-west pixel
        assert_eq!(sample(Some(&r), 1.5, 0.5), 0.0);
        // North row, third column
        assert_eq!(sample(Some(&r), 1.9, 2.1), 2.0);
        // South row, last column
        assert_eq!(sample(Some(&r), 0.1, 3.9), 13.0);
    }

    #[test]
    fn test_outside_window_is_zero() {
        let r = raster();
        for (lat, lng) in [(-0.1, 1.0), (2.1, 1.0), (1.0, -0.1), (1.0, 4.1), (50.0, 50.0)] {
            assert_eq!(sample(Some(&r), lat, lng), 0.0);
        }
    }

    #[test]
    fn test_boundary_index_is_zero() {
        let r = raster();
        // East and south edges map to index == size
        assert_eq!(sample(Some(&r), 1.0, 4.0), 0.0);
        assert_eq!(sample(Some(&r), 0.0, 1.0), 0.0);
        // West and north edges are inside
        assert_eq!(sample(Some(&r), 2.0, 0.0), 0.0);
        assert_eq!(sample(Some(&r), 2.0, 1.0), 1.0);
    }

    #[test]
    fn test_non_finite_samples_are_zero() {
        let bounds = BoundingBox::new(0.0, 0.0, 2.0, 1.0);
        let mut r = CriterionRaster::new(CriterionId::new("x"), RasterMetadata::new(bounds, 2, 1));
        r.replace_window(Some(
            LoadedWindow::new(PixelWindow::new(0, 0, 2, 1), bounds, vec![f32::NAN, 7.0]).unwrap(),
        ));
        assert_eq!(sample(Some(&r), 0.5, 0.5), 0.0);
        assert_eq!(sample(Some(&r), 0.5, 1.5), 7.0);
        assert_eq!(sample_presence(Some(&r), 0.5, 1.5), 1.0);
        assert_eq!(sample(Some(&r), f64::NAN, 0.5), 0.0);
    }
}
