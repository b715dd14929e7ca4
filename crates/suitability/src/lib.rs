//! Suitability scoring of nature-based solutions over a viewport grid.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐   ┌────────────────┐   ┌────────────────────┐
//! │ ConfigSource   │──►│ ConfigSnapshot │   │ RasterWindowLoader │
//! │ (http/file)    │   └───────┬────────┘   └─────────┬──────────┘
//! └────────────────┘           │                      │
//!                              ▼                      ▼
//!  viewport ──► GridManager ──► Scorer (rayon / worker) ──► cells
//!                                                    │
//!                          Ranking & aggregation ◄───┘
//! ```
//!
//! [`SuitabilityEngine`] owns an [`AppContext`] and runs the pipeline;
//! each stage is also usable on its own.

pub mod aggregate;
pub mod config;
pub mod config_loader;
pub mod context;
pub mod engine;
pub mod grid;
pub mod ranking;
pub mod scheduler;
pub mod scorer;
pub mod selection;
pub mod worker;

pub use aggregate::{
    aggregate_selection, criteria_presence, score_ranges, solution_totals, CriteriaPresence,
    ScoreRanges, SelectionAggregate, SolutionAggregate, SolutionTotal, SolutionTotals,
    TotalsColumn,
};
pub use config::EngineConfig;
pub use config_loader::{
    load_configuration, ConfigSource, FileConfigSource, HttpConfigSource, InlineConfigSource,
};
pub use context::{AppContext, ViewState};
pub use engine::{
    CellView, EngineSnapshot, RankedSolution, RefreshOutcome, RefreshReport, SuitabilityEngine,
};
pub use grid::{GridManager, GridRefresh};
pub use ranking::{clamp_rank, max_valid_rank, nth_ranked, ranked_solutions, RankingFilter};
pub use scheduler::{RefreshScheduler, DEFAULT_QUIET_INTERVAL};
pub use scorer::{
    cells_in_extent, overlap_area, present_criteria, score_cell, score_cells, score_keys, CellScoring,
};
pub use selection::Selection;
pub use worker::{ScoringJob, ScoringResult, ScoringWorker};
