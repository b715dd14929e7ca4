//! Mapping between geographic extents and raster pixel windows.
//!
//! Pixel x grows eastward from the raster's west edge; pixel y grows
//! southward from its north edge.

use nbs_common::BoundingBox;

use crate::types::{PixelWindow, RasterMetadata};

/// Compute the smallest pixel window that fully covers `extent`.
///
/// Returns `None` when the extent does not intersect the raster or the
/// raster metadata is degenerate. Lower edges are floored and upper edges
/// ceiled, then clamped to the raster. The window is never empty.
pub fn pixel_window_for(extent: &BoundingBox, meta: &RasterMetadata) -> Option<PixelWindow> {
    if meta.validate().is_err() || !extent.is_valid() {
        return None;
    }
    if !meta.bounds.intersects(extent) {
        return None;
    }

    let (res_x, res_y) = meta.resolution();
    let src = &meta.bounds;

    let (x0, x1) = span(
        (extent.min_lon - src.min_lon) / res_x,
        (extent.max_lon - src.min_lon) / res_x,
        meta.width,
    );
    let (y0, y1) = span(
        (src.max_lat - extent.max_lat) / res_y,
        (src.max_lat - extent.min_lat) / res_y,
        meta.height,
    );

    Some(PixelWindow::new(x0, y0, x1, y1))
}

/// Floor/ceil a fractional pixel range and clamp it to `[0, size]`,
/// widening to one pixel if it collapsed.
fn span(lower: f64, upper: f64, size: usize) -> (usize, usize) {
    let max = size as f64;
    let mut start = lower.floor().clamp(0.0, max) as usize;
    let mut end = upper.ceil().clamp(0.0, max) as usize;

    if end <= start {
        if start >= size {
            start = size - 1;
        }
        end = start + 1;
    }
    (start, end)
}

/// Geographic extent of a pixel window, the inverse of [`pixel_window_for`].
pub fn window_bounds(window: &PixelWindow, meta: &RasterMetadata) -> BoundingBox {
    let (res_x, res_y) = meta.resolution();
    let src = &meta.bounds;

    BoundingBox::new(
        src.min_lon + window.x0 as f64 * res_x,
        src.max_lat - window.y1 as f64 * res_y,
        src.min_lon + window.x1 as f64 * res_x,
        src.max_lat - window.y0 as f64 * res_y,
    )
}
