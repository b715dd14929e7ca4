//! Partitions a viewport into fixed-size cells.

use std::collections::BTreeMap;

use metrics::gauge;
use nbs_common::{BoundingBox, Cell, CellKey, CellSize};
use serde::Serialize;
use tracing::{debug, warn};

use crate::selection::Selection;

/// Keys truncate corners to micro-degrees, so a representative point may
/// sit just outside its cell; the extent is padded by this much.
const KEY_PADDING_DEG: f64 = 2e-6;

/// Counts from one grid refresh.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridRefresh {
    /// Cells covering the viewport.
    pub generated: usize,
    /// Viewport cells that kept their previous object (and scores).
    pub reused: usize,
    /// Selected cells kept from outside the viewport.
    pub preserved: usize,
    /// Previously known cells that were dropped.
    pub evicted: usize,
}

/// Owns the set of known cells.
///
/// After a refresh the known cells are exactly the viewport's cells plus
/// any selected cells that were already known.
#[derive(Debug, Clone)]
pub struct GridManager {
    edge_meters: f64,
    max_cells: usize,
    cells: BTreeMap<CellKey, Cell>,
    cell_size: Option<CellSize>,
    extent: Option<BoundingBox>,
}

impl GridManager {
    pub fn new(edge_meters: f64, max_cells: usize) -> Self {
        Self {
            edge_meters,
            max_cells,
            cells: BTreeMap::new(),
            cell_size: None,
            extent: None,
        }
    }

    pub fn edge_meters(&self) -> f64 {
        self.edge_meters
    }

    /// Cell size used by the last refresh.
    pub fn cell_size(&self) -> Option<CellSize> {
        self.cell_size
    }

    /// Union of the bounds of the viewport cells from the last refresh,
    /// slightly padded.
    ///
    /// Covers every generated cell's representative point, so it is the
    /// extent raster windows are loaded for.
    pub fn extent(&self) -> Option<BoundingBox> {
        self.extent
    }

    pub fn cells(&self) -> &BTreeMap<CellKey, Cell> {
        &self.cells
    }

    pub fn cells_mut(&mut self) -> &mut BTreeMap<CellKey, Cell> {
        &mut self.cells
    }

    pub fn get(&self, key: &CellKey) -> Option<&Cell> {
        self.cells.get(key)
    }

    pub fn get_mut(&mut self, key: &CellKey) -> Option<&mut Cell> {
        self.cells.get_mut(key)
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Regenerate the cell set for `viewport`.
    ///
    /// Existing cells are reused so their scores survive. Selected cells
    /// outside the viewport are kept if already known; everything else is
    /// discarded. An invalid viewport, or one needing more than `max_cells`
    /// cells, generates no viewport cells.
    pub fn refresh(&mut self, viewport: &BoundingBox, selection: &Selection) -> GridRefresh {
        let mut previous = std::mem::take(&mut self.cells);
        let mut stats = GridRefresh::default();

        self.cell_size = None;
        self.extent = None;

        if let Some((size, rows, cols)) = self.layout(viewport) {
            for row in rows.clone() {
                for col in cols.clone() {
                    let (lat, lng) = size.corner(row, col);
                    let key = CellKey::from_degrees(lat, lng);
                    let cell = match previous.remove(&key) {
                        Some(cell) => {
                            stats.reused += 1;
                            cell
                        }
                        None => Cell::new(
                            key,
                            BoundingBox::new(lng, lat, lng + size.lng_deg, lat + size.lat_deg),
                        ),
                    };
                    self.cells.insert(key, cell);
                    stats.generated += 1;
                }
            }

            let (south, west) = size.corner(rows.start, cols.start);
            let (north, east) = size.corner(rows.end, cols.end);
            self.cell_size = Some(size);
            self.extent = Some(BoundingBox::new(
                west - KEY_PADDING_DEG,
                south - KEY_PADDING_DEG,
                east + KEY_PADDING_DEG,
                north + KEY_PADDING_DEG,
            ));
        }

        for key in selection.iter() {
            if self.cells.contains_key(key) {
                continue;
            }
            if let Some(cell) = previous.remove(key) {
                self.cells.insert(*key, cell);
                stats.preserved += 1;
            }
        }

        stats.evicted = previous.len();
        gauge!("grid_cells_known").set(self.cells.len() as f64);
        debug!(
            generated = stats.generated,
            reused = stats.reused,
            preserved = stats.preserved,
            evicted = stats.evicted,
            "Grid refreshed"
        );

        stats
    }

    /// Cell size and index ranges covering the viewport.
    fn layout(
        &self,
        viewport: &BoundingBox,
    ) -> Option<(CellSize, std::ops::Range<i64>, std::ops::Range<i64>)> {
        if !viewport.is_valid() {
            warn!(viewport = %viewport, "Invalid viewport, no cells generated");
            return None;
        }

        let (_, center_lat) = viewport.center();
        let size = CellSize::at_latitude(self.edge_meters, center_lat);
        if !size.is_valid() {
            warn!(edge_meters = self.edge_meters, "Invalid cell size, no cells generated");
            return None;
        }

        let rows = (viewport.min_lat / size.lat_deg).floor() as i64
            ..(viewport.max_lat / size.lat_deg).ceil() as i64;
        let cols = (viewport.min_lon / size.lng_deg).floor() as i64
            ..(viewport.max_lon / size.lng_deg).ceil() as i64;

        let count = (rows.end - rows.start).max(0) as u128 * (cols.end - cols.start).max(0) as u128;
        if count > self.max_cells as u128 {
            warn!(
                viewport = %viewport,
                cells = %count,
                max_cells = self.max_cells,
                "Viewport needs too many cells, no cells generated"
            );
            return None;
        }

        Some((size, rows, cols))
    }

    /// Key of the known cell containing a point, falling back to the key
    /// computed at the point's own latitude.
    pub fn key_for_point(&self, lat: f64, lng: f64) -> CellKey {
        if let Some(size) = self.cell_size {
            let key = size.key_for(lat, lng);
            if self.cells.contains_key(&key) {
                return key;
            }
        }
        CellKey::for_point(lat, lng, self.edge_meters)
    }
}
