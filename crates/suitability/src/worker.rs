//! Background scoring worker.
//!
//! Scoring jobs are self-contained: they carry the configuration, the
//! category and detached copies of the loaded raster windows, so the worker
//! shares no mutable state with the engine. Results carry the generation of
//! the request that produced them.

use std::sync::Arc;

use metrics::counter;
use nbs_common::{CellKey, ChallengeCategory, ConfigSnapshot, NbsError, NbsResult};
use raster::RasterSet;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::scorer::{score_keys, CellScoring};

/// A batch of cells to score.
#[derive(Debug, Clone)]
pub struct ScoringJob {
    pub generation: u64,
    pub config: Arc<ConfigSnapshot>,
    pub category: ChallengeCategory,
    pub rasters: RasterSet,
    pub keys: Vec<CellKey>,
}

impl ScoringJob {
    /// Score the job on the current thread.
    pub fn run(&self) -> ScoringResult {
        ScoringResult {
            generation: self.generation,
            scores: score_keys(&self.keys, &self.config, &self.category, &self.rasters),
        }
    }
}

/// Scores produced for one job.
#[derive(Debug, Clone)]
pub struct ScoringResult {
    pub generation: u64,
    pub scores: Vec<(CellKey, CellScoring)>,
}

struct Request {
    job: ScoringJob,
    respond_to: oneshot::Sender<ScoringResult>,
}

/// Handle to a running scoring worker.
///
/// Dropping every handle closes the queue and the worker task exits.
#[derive(Clone)]
pub struct ScoringWorker {
    sender: mpsc::Sender<Request>,
}

impl ScoringWorker {
    /// Start a worker task. Requires a running tokio runtime.
    pub fn spawn(queue_depth: usize) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(queue_depth.max(1));
        let handle = tokio::spawn(Self::run(receiver));
        (Self { sender }, handle)
    }

    async fn run(mut receiver: mpsc::Receiver<Request>) {
        info!("Scoring worker started");

        while let Some(Request { job, respond_to }) = receiver.recv().await {
            let generation = job.generation;
            let cells = job.keys.len();

            match tokio::task::spawn_blocking(move || job.run()).await {
                Ok(result) => {
                    counter!("worker_jobs_total").increment(1);
                    debug!(generation, cells, "Scoring job complete");
                    // The requester may have given up; nothing to do then
                    let _ = respond_to.send(result);
                }
                Err(e) => {
                    counter!("worker_job_failures_total").increment(1);
                    warn!(generation, error = %e, "Scoring job panicked");
                }
            }
        }

        info!("Scoring worker stopped");
    }

    /// Submit a job and wait for its scores.
    pub async fn score(&self, job: ScoringJob) -> NbsResult<ScoringResult> {
        let (respond_to, response) = oneshot::channel();

        self.sender
            .send(Request { job, respond_to })
            .await
            .map_err(|_| NbsError::WorkerUnavailable("worker queue closed".to_string()))?;

        response
            .await
            .map_err(|_| NbsError::WorkerUnavailable("worker dropped the job".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nbs_common::{BoundingBox, ConfigDocument, ConfigDocuments, CriterionId, SolutionId};
    use raster::{CriterionRaster, LoadedWindow, PixelWindow, RasterMetadata};
    use test_utils::config as fixture;

    fn job(generation: u64, keys: Vec<CellKey>) -> ScoringJob {
        let mut docs = ConfigDocuments::default();
        docs.set_document(ConfigDocument::SolutionCriteria, fixture::WETLAND_CRITERIA.as_bytes()).unwrap();
        docs.set_document(ConfigDocument::ChallengeCategories, fixture::WETLAND_CATEGORIES.as_bytes()).unwrap();
        docs.set_document(ConfigDocument::SolutionCosts, fixture::WETLAND_COSTS.as_bytes()).unwrap();
        let config = Arc::new(ConfigSnapshot::from_documents(docs).unwrap());

        let bounds = BoundingBox::new(0.0, 0.0, 1.0, 1.0);
        let mut raster = CriterionRaster::new(CriterionId::new("wet_soil"), RasterMetadata::new(bounds, 1, 1));
        raster.replace_window(Some(
            LoadedWindow::new(PixelWindow::new(0, 0, 1, 1), bounds, vec![1.0]).unwrap(),
        ));
        let mut rasters = RasterSet::new();
        rasters.insert(raster);

        ScoringJob {
            generation,
            category: config.category("Flooding").unwrap().clone(),
            config,
            rasters,
            keys,
        }
    }

    #[tokio::test]
    async fn test_worker_matches_inline_scoring() {
        let (worker, _handle) = ScoringWorker::spawn(4);
        let job = job(7, vec![CellKey::from_degrees(0.5, 0.5), CellKey::from_degrees(4.0, 4.0)]);

        let expected = job.run();
        let result = worker.score(job).await.unwrap();

        assert_eq!(result.generation, 7);
        assert_eq!(result.scores, expected.scores);
        assert_eq!(result.scores[0].1.scores[&SolutionId::new("Wetland")].impact(), 50.0);
        assert_eq!(result.scores[1].1.scores[&SolutionId::new("Wetland")].impact(), 0.0);
        assert!(result.scores[0].1.present.contains(&CriterionId::new("wet_soil")));
    }

    #[tokio::test]
    async fn test_concurrent_jobs_keep_their_generation() {
        let (worker, _handle) = ScoringWorker::spawn(4);
        let key = CellKey::from_degrees(0.5, 0.5);

        let (a, b) = tokio::join!(worker.score(job(1, vec![key])), worker.score(job(2, vec![key])));
        assert_eq!(a.unwrap().generation, 1);
        assert_eq!(b.unwrap().generation, 2);
    }

    #[tokio::test]
    async fn test_stopped_worker_is_unavailable() {
        let (worker, handle) = ScoringWorker::spawn(1);
        handle.abort();
        let _ = handle.await;

        let err = worker.score(job(1, vec![])).await.unwrap_err();
        assert!(matches!(err, NbsError::WorkerUnavailable(_)));
    }
}
