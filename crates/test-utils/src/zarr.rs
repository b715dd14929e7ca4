//! Writes criterion rasters as Zarr V3 stores.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use zarrs::array::{ArrayBuilder, DataType, FillValue};
use zarrs::array_subset::ArraySubset;
use zarrs_filesystem::FilesystemStore;

/// Write a 2-D Zarr array (no sharding, no compression) at `path`.
///
/// `data` is row-major with row 0 at the northern edge; `bbox` is
/// (min_lon, min_lat, max_lon, max_lat) and is stored as the `bbox`
/// attribute.
pub fn write_zarr_raster(
    path: &Path,
    data: &[f32],
    width: usize,
    height: usize,
    chunk_size: usize,
    bbox: (f64, f64, f64, f64),
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(path)?;
    let store = Arc::new(FilesystemStore::new(path)?);

    let array = ArrayBuilder::new(
        vec![height as u64, width as u64], // shape [rows, cols]
        DataType::Float32,
        vec![chunk_size as u64, chunk_size as u64].try_into()?,
        FillValue::from(f32::NAN),
    )
    .attributes({
        let mut attrs = serde_json::Map::new();
        attrs.insert(
            "bbox".to_string(),
            serde_json::json!([bbox.0, bbox.1, bbox.2, bbox.3]),
        );
        attrs
    })
    .build(store.clone(), "/")?;

    array.store_metadata()?;

    let subset = ArraySubset::new_with_start_shape(vec![0, 0], vec![height as u64, width as u64])?;
    array.store_array_subset_elements(&subset, data)?;

    Ok(())
}

/// Write `{dir}/{criterion}.zarr` and return its path.
pub fn write_criterion_raster(
    dir: &Path,
    criterion: &str,
    data: &[f32],
    width: usize,
    height: usize,
    bbox: (f64, f64, f64, f64),
) -> Result<PathBuf, Box<dyn std::error::Error>> {
    let path = dir.join(format!("{}.zarr", criterion));
    write_zarr_raster(&path, data, width, height, width.clamp(1, 64), bbox)?;
    Ok(path)
}
