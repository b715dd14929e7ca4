//! Per-cell, per-solution suitability scores.

use std::collections::{BTreeMap, BTreeSet};

use metrics::counter;
use nbs_common::{
    BoundingBox, Cell, CellKey, ChallengeCategory, ConfigSnapshot, CriterionId, Score, ScoreMap, Solution,
};
use raster::{sample, sample_presence, RasterSet};
use rayon::prelude::*;
use tracing::debug;

/// Mean presence of a solution's criteria at a point.
///
/// Only criteria with a registered raster count toward the mean; a failed
/// or unloaded raster counts as zero. With no counted criteria the area
/// is zero.
pub fn overlap_area(solution: &Solution, rasters: &RasterSet, lat: f64, lng: f64) -> f64 {
    let mut total = 0.0;
    let mut counted = 0usize;

    for criterion in solution.criteria() {
        if let Some(raster) = rasters.get(criterion) {
            total += sample_presence(Some(raster), lat, lng);
            counted += 1;
        }
    }

    if counted == 0 {
        0.0
    } else {
        total / counted as f64
    }
}

/// Scores for every scorable solution at one cell key.
///
/// Solutions with no criteria are left out. Filtering by the user's
/// solution selection happens later, in ranking.
pub fn score_cell(
    key: &CellKey,
    config: &ConfigSnapshot,
    category: &ChallengeCategory,
    rasters: &RasterSet,
) -> ScoreMap {
    let (lat, lng) = (key.lat(), key.lng());

    config
        .solutions()
        .filter(|solution| solution.is_scorable())
        .map(|solution| {
            let area = overlap_area(solution, rasters, lat, lng);
            let score = Score::from_area(area, category.weight(solution.id()), solution.unit_cost());
            (solution.id().clone(), score)
        })
        .collect()
}

/// Criteria whose loaded raster has a positive sample at a point.
pub fn present_criteria(rasters: &RasterSet, lat: f64, lng: f64) -> BTreeSet<CriterionId> {
    rasters
        .iter()
        .filter(|raster| sample(Some(*raster), lat, lng) > 0.0)
        .map(|raster| raster.criterion().clone())
        .collect()
}

/// Everything scoring records on a cell.
#[derive(Debug, Clone, PartialEq)]
pub struct CellScoring {
    pub scores: ScoreMap,
    pub present: BTreeSet<CriterionId>,
}

impl CellScoring {
    pub fn compute(
        key: &CellKey,
        config: &ConfigSnapshot,
        category: &ChallengeCategory,
        rasters: &RasterSet,
    ) -> Self {
        Self {
            scores: score_cell(key, config, category, rasters),
            present: present_criteria(rasters, key.lat(), key.lng()),
        }
    }

    fn apply(self, cell: &mut Cell) {
        cell.set_scores(self.scores);
        cell.set_present_criteria(self.present);
    }
}

/// Score a batch of cell keys in parallel.
pub fn score_keys(
    keys: &[CellKey],
    config: &ConfigSnapshot,
    category: &ChallengeCategory,
    rasters: &RasterSet,
) -> Vec<(CellKey, CellScoring)> {
    keys.par_iter()
        .map(|key| (*key, CellScoring::compute(key, config, category, rasters)))
        .collect()
}

/// Whether a cell's representative point lies in `extent`.
///
/// Raster windows are loaded for the grid extent, so only these cells can
/// be sampled; selected cells kept from an earlier viewport keep their
/// scores.
fn samples_within(cell: &Cell, extent: &BoundingBox) -> bool {
    let (lat, lng) = cell.representative_point();
    extent.contains(lng, lat)
}

/// Keys of the cells whose representative point lies in `extent`.
pub fn cells_in_extent(cells: &BTreeMap<CellKey, Cell>, extent: &BoundingBox) -> Vec<CellKey> {
    cells
        .values()
        .filter(|cell| samples_within(cell, extent))
        .map(Cell::key)
        .collect()
}

/// Score, in place, every cell whose representative point lies in
/// `extent`. Returns the number of cells scored.
pub fn score_cells(
    cells: &mut BTreeMap<CellKey, Cell>,
    config: &ConfigSnapshot,
    category: &ChallengeCategory,
    rasters: &RasterSet,
    extent: &BoundingBox,
) -> usize {
    let scored = cells
        .par_iter_mut()
        .filter(|(_, cell)| samples_within(cell, extent))
        .map(|(key, cell)| {
            CellScoring::compute(key, config, category, rasters).apply(cell);
        })
        .count();

    counter!("cells_scored_total").increment(scored as u64);
    debug!(cells = scored, category = category.name(), "Scored cells");
    scored
}

/// Write computed scores back into the cells that still exist.
pub fn merge_scores(cells: &mut BTreeMap<CellKey, Cell>, results: Vec<(CellKey, CellScoring)>) -> usize {
    let mut merged = 0;
    for (key, scoring) in results {
        if let Some(cell) = cells.get_mut(&key) {
            scoring.apply(cell);
            merged += 1;
        }
    }
    merged
}
