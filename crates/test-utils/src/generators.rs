//! Test data generators for synthetic criterion rasters.
//!
//! All grids are row-major with row 0 at the northern edge.

/// Creates a test grid with predictable values.
///
/// Each cell value is calculated as: `col * 1000 + row`
///
/// # Example
///
/// ```
/// use test_utils::create_test_grid;
///
/// let grid = create_test_grid(10, 5);
/// assert_eq!(grid.len(), 50);
/// assert_eq!(grid[1], 1000.0); // col=1, row=0
/// assert_eq!(grid[10], 1.0);   // col=0, row=1
/// ```
pub fn create_test_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for row in 0..height {
        for col in 0..width {
            data.push((col * 1000 + row) as f32);
        }
    }
    data
}

/// Creates a presence grid: 1.0 in the western half, 0.0 in the eastern half.
///
/// ```
/// use test_utils::create_west_half_grid;
///
/// let grid = create_west_half_grid(4, 1);
/// assert_eq!(grid, vec![1.0, 1.0, 0.0, 0.0]);
/// ```
pub fn create_west_half_grid(width: usize, height: usize) -> Vec<f32> {
    let mut data = Vec::with_capacity(width * height);
    for _ in 0..height {
        for col in 0..width {
            data.push(if col < width / 2 { 1.0 } else { 0.0 });
        }
    }
    data
}

/// Creates a grid with NaN values at the given (col, row) positions and
/// `value` elsewhere.
pub fn create_grid_with_nans(
    width: usize,
    height: usize,
    value: f32,
    nan_positions: &[(usize, usize)],
) -> Vec<f32> {
    let mut data = vec![value; width * height];
    for &(col, row) in nan_positions {
        if col < width && row < height {
            data[row * width + col] = f32::NAN;
        }
    }
    data
}
