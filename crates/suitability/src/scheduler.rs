//! Debounced recomputation.
//!
//! Requests coalesce into the latest pending value. The action runs once
//! the quiet interval has passed with no newer request; a request made
//! while waiting restarts the wait and replaces the pending value.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Default quiet interval before a pending request runs.
pub const DEFAULT_QUIET_INTERVAL: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
struct Pending<T> {
    seq: u64,
    /// `None` after a cancel.
    value: Option<T>,
}

/// Coalesces bursts of requests into one run of an async action.
pub struct RefreshScheduler<T> {
    pending: watch::Sender<Pending<T>>,
    completed: watch::Receiver<u64>,
    next_seq: AtomicU64,
    task: JoinHandle<()>,
}

impl<T> RefreshScheduler<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Start the scheduler task. Requires a running tokio runtime.
    pub fn spawn<F, Fut>(quiet: Duration, action: F) -> Self
    where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (pending, receiver) = watch::channel(Pending { seq: 0, value: None });
        let (done, completed) = watch::channel(0u64);
        let task = tokio::spawn(Self::run(receiver, done, quiet, action));

        Self {
            pending,
            completed,
            next_seq: AtomicU64::new(0),
            task,
        }
    }

    async fn run<F, Fut>(
        mut receiver: watch::Receiver<Pending<T>>,
        done: watch::Sender<u64>,
        quiet: Duration,
        action: F,
    ) where
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        info!(quiet_ms = quiet.as_millis() as u64, "Refresh scheduler started");

        loop {
            if receiver.changed().await.is_err() {
                break;
            }

            // Wait out the quiet interval, restarting on every new request
            loop {
                tokio::select! {
                    changed = receiver.changed() => {
                        if changed.is_err() {
                            return;
                        }
                    }
                    _ = tokio::time::sleep(quiet) => break,
                }
            }

            let Pending { seq, value } = receiver.borrow_and_update().clone();
            match value {
                Some(value) => {
                    debug!(seq, "Running scheduled refresh");
                    action(value).await;
                }
                None => debug!(seq, "Scheduled refresh cancelled"),
            }
            done.send_replace(seq);
        }

        info!("Refresh scheduler stopped");
    }

    /// Replace the pending request. Returns its sequence number.
    pub fn request(&self, value: T) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.send_replace(Pending {
            seq,
            value: Some(value),
        });
        seq
    }

    /// Drop the pending request without running it.
    pub fn cancel(&self) -> u64 {
        let seq = self.next_seq.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.send_replace(Pending { seq, value: None });
        seq
    }

    /// Wait until the request `seq`, or a later one, has been handled.
    pub async fn settled(&self, seq: u64) {
        let mut completed = self.completed.clone();
        let _ = completed.wait_for(|done| *done >= seq).await;
    }
}

impl<T> Drop for RefreshScheduler<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}
