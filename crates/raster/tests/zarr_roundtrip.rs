//! Integration test: write criterion rasters to Zarr and read windows back
//! through `ZarrRasterSource`, the catalog and the window loader.

use std::collections::BTreeSet;
use std::sync::Arc;

use nbs_common::{BoundingBox, CriterionId};
use raster::{
    pixel_window_for, sample, PixelWindow, RasterCatalog, RasterLoaderConfig, RasterSet,
    RasterSource, RasterWindowLoader, WindowOutcome, ZarrRasterSource,
};
use storage::MemoryStore;
use test_utils::{
    create_grid_with_nans, create_test_grid, create_west_half_grid, temp_test_dir, write_criterion_raster,
    write_zarr_raster,
};

#[tokio::test]
async fn test_zarr_metadata_and_full_read() {
    let width = 100;
    let height = 80;
    let bbox = (0.0, -40.0, 100.0, 40.0);

    let temp_dir = temp_test_dir();
    let zarr_path = temp_dir.path().join("grid.zarr");
    let original = create_test_grid(width, height);
    write_zarr_raster(&zarr_path, &original, width, height, 32, bbox).expect("Failed to write Zarr");

    let source = ZarrRasterSource::open_dir(&zarr_path, "grid").expect("Failed to open raster");
    let meta = source.metadata();
    assert_eq!(meta.width, width);
    assert_eq!(meta.height, height);
    assert_eq!(meta.bounds, BoundingBox::new(0.0, -40.0, 100.0, 40.0));

    let data = source
        .read_window(&PixelWindow::new(0, 0, width, height))
        .await
        .expect("Failed to read window");
    assert_eq!(data, original);
}

#[tokio::test]
async fn test_zarr_partial_window() {
    let width = 200;
    let height = 150;
    let bbox = (-180.0, -90.0, 180.0, 90.0);

    let temp_dir = temp_test_dir();
    let zarr_path = temp_dir.path().join("partial.zarr");
    write_zarr_raster(&zarr_path, &create_test_grid(width, height), width, height, 64, bbox)
        .expect("Failed to write Zarr");

    let source = ZarrRasterSource::open_dir(&zarr_path, "partial").unwrap();
    let extent = BoundingBox::new(-50.0, 20.0, -30.0, 40.0);
    let window = pixel_window_for(&extent, source.metadata()).unwrap();

    assert!(window.width() < width);
    assert!(window.height() < height);

    let data = source.read_window(&window).await.unwrap();
    assert_eq!(data.len(), window.len());

    for local_row in 0..window.height() {
        for local_col in 0..window.width() {
            let col = window.x0 + local_col;
            let row = window.y0 + local_row;
            let expected = (col * 1000 + row) as f32;
            assert_eq!(data[local_row * window.width() + local_col], expected);
        }
    }
}

#[tokio::test]
async fn test_zarr_window_out_of_bounds() {
    let temp_dir = temp_test_dir();
    let zarr_path = temp_dir.path().join("small.zarr");
    write_zarr_raster(&zarr_path, &create_test_grid(4, 4), 4, 4, 4, (0.0, 0.0, 4.0, 4.0)).unwrap();

    let source = ZarrRasterSource::open_dir(&zarr_path, "small").unwrap();
    assert!(source.read_window(&PixelWindow::new(2, 2, 6, 3)).await.is_err());
}

#[tokio::test]
async fn test_catalog_skips_missing_and_malformed() {
    let temp_dir = temp_test_dir();
    let dir = temp_dir.path();

    write_criterion_raster(dir, "wet_soil", &create_west_half_grid(10, 10), 10, 10, (0.0, 0.0, 10.0, 10.0))
        .unwrap();
    // Not a Zarr store
    std::fs::create_dir_all(dir.join("slope.zarr")).unwrap();

    let criteria: BTreeSet<CriterionId> = ["wet_soil", "slope", "missing"]
        .into_iter()
        .map(CriterionId::new)
        .collect();
    let catalog = RasterCatalog::open_zarr_directory(dir, &criteria);

    assert_eq!(catalog.len(), 1);
    assert!(catalog.get(&CriterionId::new("wet_soil")).is_some());
}

#[tokio::test]
async fn test_loader_windows_sample_from_zarr() {
    let temp_dir = temp_test_dir();
    let dir = temp_dir.path();
    write_criterion_raster(dir, "wet_soil", &create_west_half_grid(10, 10), 10, 10, (0.0, 0.0, 10.0, 10.0))
        .unwrap();

    let criteria: BTreeSet<CriterionId> = [CriterionId::new("wet_soil")].into_iter().collect();
    let catalog = Arc::new(RasterCatalog::open_zarr_directory(dir, &criteria));
    let mut rasters = RasterSet::from_catalog(&catalog);
    let loader = RasterWindowLoader::new(
        catalog,
        Arc::new(MemoryStore::new(8)),
        RasterLoaderConfig::default(),
    );

    let extent = BoundingBox::new(3.0, 3.0, 7.0, 7.0);
    let load = loader.load_windows(&criteria, &extent).await;
    assert!(matches!(
        load.outcomes[&CriterionId::new("wet_soil")],
        WindowOutcome::Loaded(_)
    ));
    rasters.apply(load);

    let raster = rasters.get(&CriterionId::new("wet_soil"));
    // West half present, east half absent
    assert_eq!(sample(raster, 5.5, 4.5), 1.0);
    assert_eq!(sample(raster, 5.5, 5.5), 0.0);
    // Outside the loaded window
    assert_eq!(sample(raster, 5.5, 1.5), 0.0);
}

#[tokio::test]
async fn test_nan_pixels_sample_as_absent() {
    let temp_dir = temp_test_dir();
    let dir = temp_dir.path();
    // Fully present except the pixel at col 1 of the northern row
    let grid = create_grid_with_nans(4, 4, 1.0, &[(1, 0)]);
    write_criterion_raster(dir, "wet_soil", &grid, 4, 4, (0.0, 0.0, 4.0, 4.0)).unwrap();

    let criteria: BTreeSet<CriterionId> = [CriterionId::new("wet_soil")].into_iter().collect();
    let catalog = Arc::new(RasterCatalog::open_zarr_directory(dir, &criteria));
    let mut rasters = RasterSet::from_catalog(&catalog);
    let loader = RasterWindowLoader::new(
        catalog,
        Arc::new(MemoryStore::new(8)),
        RasterLoaderConfig::default(),
    );

    let load = loader.load_windows(&criteria, &BoundingBox::new(0.0, 0.0, 4.0, 4.0)).await;
    rasters.apply(load);

    let raster = rasters.get(&CriterionId::new("wet_soil"));
    assert_eq!(sample(raster, 3.5, 1.5), 0.0);
    assert_eq!(sample(raster, 3.5, 0.5), 1.0);
    assert_eq!(sample(raster, 0.5, 1.5), 1.0);
}
