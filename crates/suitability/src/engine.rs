//! The suitability engine: one owner for the application context.
//!
//! Refreshes follow a fixed pipeline:
//!
//! ```text
//! viewport ──► grid refresh ──► window load (async I/O) ──► score ──► apply
//!                   │                                                  │
//!                   └──────────── generation taken ───── generation checked
//! ```
//!
//! Only the refresh holding the latest generation applies its windows and
//! scores; older ones are dropped without touching the cells or rasters.

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use metrics::counter;
use nbs_common::{
    BoundingBox, CellKey, ConfigSnapshot, NbsError, NbsResult, RankingMode, Score, ScoreMap,
    SolutionId,
};
use raster::{LoadStats, RasterCatalog, RasterSet, RasterWindowLoader};
use serde::Serialize;
use storage::KeyValueStore;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{CriteriaPresence, ScoreRanges, SelectionAggregate, SolutionTotals};
use crate::config::EngineConfig;
use crate::config_loader::{load_configuration, ConfigSource};
use crate::context::{AppContext, ViewState};
use crate::grid::{GridManager, GridRefresh};
use crate::ranking::{nth_ranked, RankingFilter};
use crate::scheduler::RefreshScheduler;
use crate::scorer::{cells_in_extent, merge_scores, score_cells, score_keys};
use crate::selection::Selection;
use crate::worker::{ScoringJob, ScoringWorker};

/// What a refresh did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RefreshOutcome {
    Applied(RefreshReport),
    /// A newer refresh started first; nothing was applied.
    Superseded { generation: u64 },
}

impl RefreshOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub generation: u64,
    pub grid: GridRefresh,
    pub windows: LoadStats,
    pub scored: usize,
}

/// The ranked solution shown for a cell.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedSolution {
    pub solution: SolutionId,
    pub score: Score,
}

/// One known cell as presented to a caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellView {
    pub key: CellKey,
    pub bounds: BoundingBox,
    pub selected: bool,
    /// Solution at the active rank, if the cell has one.
    pub ranked: Option<RankedSolution>,
    pub scores: Option<ScoreMap>,
}

/// Read-only view of the engine state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSnapshot {
    pub generation: u64,
    pub category: String,
    pub mode: RankingMode,
    pub rank: usize,
    pub max_rank: usize,
    pub filter: RankingFilter,
    pub cells: Vec<CellView>,
    pub selection: Selection,
    pub aggregate: SelectionAggregate,
    pub totals: SolutionTotals,
    pub ranges: ScoreRanges,
    pub presence: CriteriaPresence,
}

struct EngineInner {
    state: RwLock<AppContext>,
    generation: AtomicU64,
    loader: RasterWindowLoader,
    worker: Option<ScoringWorker>,
    config: EngineConfig,
}

/// Drives grid, raster and scoring state for one session.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct SuitabilityEngine {
    inner: Arc<EngineInner>,
}

impl SuitabilityEngine {
    /// Load configuration and open rasters.
    ///
    /// Configuration failures are fatal. Rasters from `config.raster_dir`
    /// are added to `catalog`; a criterion whose raster is missing or
    /// unreadable is skipped and samples as zero.
    #[instrument(skip_all)]
    pub async fn initialize(
        source: &dyn ConfigSource,
        catalog: RasterCatalog,
        cache: Arc<dyn KeyValueStore>,
        config: EngineConfig,
    ) -> NbsResult<Self> {
        config.validate().map_err(NbsError::InvalidConfig)?;

        let snapshot = load_configuration(source, cache.as_ref()).await?;

        let mut catalog = catalog;
        if let Some(dir) = config.raster_dir.clone() {
            for raster in open_raster_dir(dir, &snapshot).await?.sources() {
                if catalog.get(raster.criterion()).is_none() {
                    catalog.insert(raster.clone());
                }
            }
        }

        Self::new(snapshot, catalog, cache, config)
    }

    /// Build an engine from an already-loaded configuration.
    ///
    /// With `worker_enabled` the scoring worker is started here, which
    /// needs a running tokio runtime; without one this returns
    /// `WorkerUnavailable`.
    pub fn new(
        snapshot: ConfigSnapshot,
        catalog: RasterCatalog,
        cache: Arc<dyn KeyValueStore>,
        config: EngineConfig,
    ) -> NbsResult<Self> {
        config.validate().map_err(NbsError::InvalidConfig)?;

        let category = match &config.default_category {
            Some(name) => snapshot.category(name)?.name().to_string(),
            None => snapshot
                .category_names()
                .next()
                .map(str::to_string)
                .ok_or_else(|| NbsError::InvalidConfig("no challenge categories".to_string()))?,
        };

        for criterion in snapshot.criteria() {
            if catalog.get(&criterion).is_none() {
                warn!(criterion = %criterion, "No raster for criterion, it will not be counted");
            }
        }

        let rasters = RasterSet::from_catalog(&catalog);
        let grid = GridManager::new(config.cell_size_meters, config.max_cells);
        let context = AppContext::new(Arc::new(snapshot), grid, rasters, ViewState::new(category));

        let worker = if config.worker_enabled {
            tokio::runtime::Handle::try_current().map_err(|e| {
                NbsError::WorkerUnavailable(format!("scoring worker needs a tokio runtime: {}", e))
            })?;
            Some(ScoringWorker::spawn(4).0)
        } else {
            None
        };
        let loader = RasterWindowLoader::new(Arc::new(catalog), cache, config.raster.clone());

        info!(
            category = %context.view.category,
            rasters = context.rasters.len(),
            worker = worker.is_some(),
            "Suitability engine initialized"
        );

        Ok(Self {
            inner: Arc::new(EngineInner {
                state: RwLock::new(context),
                generation: AtomicU64::new(0),
                loader,
                worker,
                config,
            }),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Latest refresh generation handed out.
    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    fn is_current(&self, generation: u64) -> bool {
        self.generation() == generation
    }

    fn superseded(&self, generation: u64) -> RefreshOutcome {
        counter!("refresh_superseded_total").increment(1);
        debug!(generation, latest = self.generation(), "Refresh superseded");
        RefreshOutcome::Superseded { generation }
    }

    /// Regenerate the grid for `viewport`, load windows and score.
    #[instrument(skip(self), fields(viewport = %viewport))]
    pub async fn refresh(&self, viewport: BoundingBox) -> NbsResult<RefreshOutcome> {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let (grid, extent, criteria) = {
            let mut ctx = self.inner.state.write().await;
            if !self.is_current(generation) {
                return Ok(self.superseded(generation));
            }
            let selection = ctx.selection.clone();
            let grid = ctx.grid.refresh(&viewport, &selection);
            let criteria = ctx.rasters.loadable_criteria(&ctx.config.criteria());
            (grid, ctx.grid.extent(), criteria)
        };

        let load = match &extent {
            Some(extent) if !criteria.is_empty() => {
                Some(self.inner.loader.load_windows(&criteria, extent).await)
            }
            _ => None,
        };
        let windows = load.as_ref().map(|l| l.stats()).unwrap_or_default();

        let scores = match (&self.inner.worker, &extent) {
            (Some(worker), Some(extent)) => {
                let job = {
                    let ctx = self.inner.state.read().await;
                    let mut rasters = ctx.rasters.detached();
                    if let Some(load) = &load {
                        rasters.apply(load.clone());
                    }
                    ScoringJob {
                        generation,
                        config: ctx.config.clone(),
                        category: ctx.category()?.clone(),
                        rasters,
                        keys: cells_in_extent(ctx.grid.cells(), extent),
                    }
                };
                let category = job.category.name().to_string();
                Some((category, worker.score(job).await?))
            }
            _ => None,
        };

        let mut ctx = self.inner.state.write().await;
        if !self.is_current(generation) {
            return Ok(self.superseded(generation));
        }

        if let Some(load) = load {
            ctx.rasters.apply(load);
        }

        let scored = match (extent, scores) {
            (None, _) => 0,
            (Some(_), Some((category, result))) if category == ctx.view.category => {
                merge_scores(ctx.grid.cells_mut(), result.scores)
            }
            (Some(extent), _) => rescore_extent(&mut ctx, &extent)?,
        };
        ctx.clamp_rank();

        info!(
            generation,
            cells = ctx.grid.len(),
            scored,
            loaded = windows.loaded,
            "Refresh applied"
        );

        Ok(RefreshOutcome::Applied(RefreshReport {
            generation,
            grid,
            windows,
            scored,
        }))
    }

    /// Switch the challenge category and re-score the cells in view.
    ///
    /// Selected cells kept from an earlier viewport lie outside the loaded
    /// raster windows and keep the scores they already have.
    #[instrument(skip(self))]
    pub async fn set_category(&self, name: &str) -> NbsResult<usize> {
        let mut ctx = self.inner.state.write().await;
        let category = ctx.config.category(name)?.clone();
        ctx.view.category = category.name().to_string();

        let keys = match ctx.grid.extent() {
            Some(extent) => cells_in_extent(ctx.grid.cells(), &extent),
            None => Vec::new(),
        };
        let results = score_keys(&keys, &ctx.config, &category, &ctx.rasters);
        let scored = merge_scores(ctx.grid.cells_mut(), results);
        ctx.clamp_rank();

        info!(category = name, scored, "Category changed");
        Ok(scored)
    }

    /// Flip between impact and cost ranking. Returns the new mode.
    pub async fn toggle_ranking(&self) -> RankingMode {
        let mut ctx = self.inner.state.write().await;
        ctx.view.mode = ctx.view.mode.toggled();
        ctx.clamp_rank();
        ctx.view.mode
    }

    /// Set the active rank. Returns the rank after clamping.
    pub async fn set_rank(&self, rank: usize) -> usize {
        let mut ctx = self.inner.state.write().await;
        ctx.view.rank = rank;
        ctx.clamp_rank()
    }

    /// Replace the ranking filter. Returns the rank after clamping.
    pub async fn set_filter(&self, filter: RankingFilter) -> usize {
        let mut ctx = self.inner.state.write().await;
        ctx.view.filter = filter;
        ctx.clamp_rank()
    }

    /// Flip a known cell's selection. Returns whether it is now selected.
    ///
    /// Selected cells can always be deselected; unknown cells cannot be
    /// selected.
    pub async fn toggle_cell(&self, key: CellKey) -> NbsResult<bool> {
        let mut ctx = self.inner.state.write().await;
        toggle_known(&mut ctx, key)
    }

    /// Flip the selection of the cell containing a point.
    pub async fn select_point(&self, lat: f64, lng: f64) -> NbsResult<(CellKey, bool)> {
        let mut ctx = self.inner.state.write().await;
        let key = ctx.grid.key_for_point(lat, lng);
        toggle_known(&mut ctx, key).map(|selected| (key, selected))
    }

    pub async fn clear_selection(&self) {
        self.inner.state.write().await.selection.clear();
    }

    pub async fn snapshot(&self) -> EngineSnapshot {
        let ctx = self.inner.state.read().await;
        let view = &ctx.view;

        let cells = ctx
            .grid
            .cells()
            .values()
            .map(|cell| CellView {
                key: cell.key(),
                bounds: *cell.bounds(),
                selected: ctx.selection.contains(&cell.key()),
                ranked: cell
                    .scores()
                    .and_then(|scores| nth_ranked(scores, view.mode, view.rank, &view.filter))
                    .map(|(solution, score)| RankedSolution {
                        solution: solution.clone(),
                        score: *score,
                    }),
                scores: cell.scores().cloned(),
            })
            .collect();

        EngineSnapshot {
            generation: self.generation(),
            category: view.category.clone(),
            mode: view.mode,
            rank: view.rank,
            max_rank: ctx.max_valid_rank(),
            filter: view.filter.clone(),
            cells,
            selection: ctx.selection.clone(),
            aggregate: ctx.aggregate(),
            totals: ctx.solution_totals(),
            ranges: ctx.score_ranges(),
            presence: ctx.criteria_presence(),
        }
    }

    /// A scheduler that debounces refresh requests for this engine.
    pub fn refresh_scheduler(&self) -> RefreshScheduler<BoundingBox> {
        let engine = self.clone();
        RefreshScheduler::spawn(self.inner.config.quiet_interval(), move |viewport| {
            let engine = engine.clone();
            async move {
                if let Err(e) = engine.refresh(viewport).await {
                    warn!(viewport = %viewport, error = %e, "Scheduled refresh failed");
                }
            }
        })
    }
}

fn toggle_known(ctx: &mut AppContext, key: CellKey) -> NbsResult<bool> {
    if ctx.selection.remove(&key) {
        return Ok(false);
    }
    if ctx.grid.get(&key).is_none() {
        return Err(NbsError::invalid_parameter("cell", format!("unknown cell {}", key)));
    }
    ctx.selection.insert(key);
    Ok(true)
}

fn rescore_extent(ctx: &mut AppContext, extent: &BoundingBox) -> NbsResult<usize> {
    let config = ctx.config.clone();
    let category = ctx.category()?.clone();
    let AppContext { grid, rasters, .. } = ctx;
    Ok(score_cells(grid.cells_mut(), &config, &category, rasters, extent))
}

async fn open_raster_dir(dir: PathBuf, snapshot: &ConfigSnapshot) -> NbsResult<RasterCatalog> {
    let criteria = snapshot.criteria();
    tokio::task::spawn_blocking(move || RasterCatalog::open_zarr_directory(&dir, &criteria))
        .await
        .map_err(|e| NbsError::InternalError(format!("Raster open task failed: {}", e)))
}
