//! Application state passed explicitly to each component.

use std::sync::Arc;

use nbs_common::{ChallengeCategory, ConfigSnapshot, NbsResult, RankingMode};
use raster::RasterSet;
use serde::{Deserialize, Serialize};

use crate::aggregate::{
    aggregate_selection, criteria_presence, score_ranges, solution_totals, CriteriaPresence,
    ScoreRanges, SelectionAggregate, SolutionTotals,
};
use crate::grid::GridManager;
use crate::ranking::{clamp_rank, max_valid_rank, RankingFilter};
use crate::selection::Selection;

/// Caller-controlled view settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewState {
    /// Active challenge category name.
    pub category: String,
    pub mode: RankingMode,
    /// 1-based rank shown and aggregated.
    pub rank: usize,
    pub filter: RankingFilter,
}

impl ViewState {
    pub fn new(category: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            mode: RankingMode::default(),
            rank: 1,
            filter: RankingFilter::default(),
        }
    }
}

/// Everything the engine's components read and write.
///
/// The grid is written only by the grid manager and the rasters only by
/// window loads; scoring writes cell scores.
#[derive(Debug, Clone)]
pub struct AppContext {
    pub config: Arc<ConfigSnapshot>,
    pub grid: GridManager,
    pub rasters: RasterSet,
    pub selection: Selection,
    pub view: ViewState,
}

impl AppContext {
    pub fn new(
        config: Arc<ConfigSnapshot>,
        grid: GridManager,
        rasters: RasterSet,
        view: ViewState,
    ) -> Self {
        Self {
            config,
            grid,
            rasters,
            selection: Selection::new(),
            view,
        }
    }

    /// The active challenge category.
    pub fn category(&self) -> NbsResult<&ChallengeCategory> {
        self.config.category(&self.view.category)
    }

    /// Upper bound for the rank across all known cells.
    pub fn max_valid_rank(&self) -> usize {
        max_valid_rank(self.grid.cells().values(), self.view.mode, &self.view.filter)
    }

    /// Clamp the active rank to the current maximum and return it.
    pub fn clamp_rank(&mut self) -> usize {
        self.view.rank = clamp_rank(self.view.rank, self.max_valid_rank());
        self.view.rank
    }

    pub fn aggregate(&self) -> SelectionAggregate {
        aggregate_selection(
            self.grid.cells(),
            &self.selection,
            self.view.mode,
            self.view.rank,
            &self.view.filter,
        )
    }

    pub fn solution_totals(&self) -> SolutionTotals {
        solution_totals(self.grid.cells(), &self.selection, self.config.solution_ids())
    }

    pub fn score_ranges(&self) -> ScoreRanges {
        score_ranges(self.grid.cells(), &self.selection, &self.solution_totals())
    }

    pub fn criteria_presence(&self) -> CriteriaPresence {
        criteria_presence(
            self.grid.cells(),
            &self.selection,
            self.view.mode,
            self.view.rank,
            &self.view.filter,
            &self.config,
            &self.rasters,
        )
    }
}
