//! Windowed access to per-criterion rasters.
//!
//! Each scoring criterion is backed by one gridded geographic raster. The
//! engine never holds a full raster in memory; it loads only the pixel
//! window covering the current extent of interest and samples it by
//! nearest pixel.
//!
//! # Architecture
//!
//! ```text
//! viewport extent
//!      │
//!      ▼
//! RasterWindowLoader::load_windows(criteria, extent)
//!      │
//!      ├─► reject sources whose extent is disjoint
//!      │
//!      ├─► map extent → PixelWindow (floor lower, ceil upper, clamp)
//!      │
//!      ├─► check "raster-window" cache
//!      │         │
//!      │         ├─► hit: decode cached samples
//!      │         │
//!      │         └─► miss: RasterSource::read_window, then cache
//!      │
//!      └─► WindowLoad (per-criterion outcome)
//!               │
//!               ▼
//!          RasterSet::apply → sampler::sample(raster, lat, lng)
//! ```

pub mod catalog;
pub mod codec;
pub mod config;
pub mod error;
pub mod loader;
pub mod sampler;
pub mod source;
pub mod types;
pub mod window;

pub use catalog::RasterCatalog;
pub use config::RasterLoaderConfig;
pub use error::{RasterError, Result};
pub use loader::{RasterWindowLoader, WindowLoad, WindowOutcome};
pub use sampler::{sample, sample_presence};
pub use source::{MemoryRaster, RasterSource, ZarrRasterSource};
pub use types::{CriterionRaster, LoadStats, LoadedWindow, PixelWindow, RasterMetadata, RasterSet};
pub use window::{pixel_window_for, window_bounds};
