//! Bounded fan-out of download tasks.
//!
//! Every task gets its own tokio task, but only `workers` of them may hold an
//! admission slot at once. The rest wait on the semaphore. [`BoundedDownloadPool::run`]
//! joins every spawned task before returning, and a failing task never
//! cancels its siblings.

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::instrument::WithSubscriber;
use tracing::{debug, error, info};

use crate::chan::sink::TaskSink;
use crate::chan::tasks::DownloadTask;

/// Maximum number of tasks allowed to do network and file I/O at once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WorkerCount(NonZeroUsize);

impl WorkerCount {
    /// Clamps a user supplied count; zero and negative values mean one.
    pub(crate) fn from_requested(requested: i64) -> Self {
        let count = usize::try_from(requested).unwrap_or(1).max(1);
        Self(NonZeroUsize::new(count).unwrap_or(NonZeroUsize::MIN))
    }

    pub(crate) fn get(self) -> usize {
        self.0.get()
    }
}

impl fmt::Display for WorkerCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tally of a finished run, used for the closing log line.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PoolReport {
    pub(crate) dispatched: usize,
    pub(crate) succeeded: usize,
    pub(crate) failed: usize,
    pub(crate) bytes_written: u64,
}

#[derive(Debug, Clone, Copy)]
enum TaskOutcome {
    Saved(u64),
    Failed,
}

/// Runs download tasks with a fixed cap on concurrent I/O.
#[derive(Debug, Clone, Copy)]
pub(crate) struct BoundedDownloadPool {
    workers: WorkerCount,
}

impl BoundedDownloadPool {
    pub(crate) fn new(workers: WorkerCount) -> Self {
        Self { workers }
    }

    /// Executes every task through `sink` and returns once all of them have finished.
    pub(crate) async fn run<S: TaskSink>(&self, tasks: Vec<DownloadTask>, sink: Arc<S>) -> PoolReport {
        let slots = Arc::new(Semaphore::new(self.workers.get()));
        let mut set = JoinSet::new();
        let dispatched = tasks.len();

        for (index, task) in tasks.into_iter().enumerate() {
            let slots = slots.clone();
            let sink = sink.clone();
            set.spawn(
                async move {
                    let _permit = match slots.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(e) => {
                            error!("[{}] No download slot for {}: {}", index, task.remote_url(), e);
                            return TaskOutcome::Failed;
                        }
                    };

                    // the permit is released when this future ends, on every path
                    match sink.deliver(&task).await {
                        Ok(bytes) => {
                            debug!("[{}] Saved file {}", index, task.local_path().display());
                            TaskOutcome::Saved(bytes)
                        }
                        Err(e) => {
                            error!(
                                "[{}] {}. Direct link to content: {}",
                                index,
                                e,
                                task.remote_url()
                            );
                            TaskOutcome::Failed
                        }
                    }
                }
                .with_current_subscriber(),
            );
        }

        let mut report = PoolReport {
            dispatched,
            ..PoolReport::default()
        };
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(TaskOutcome::Saved(bytes)) => {
                    report.succeeded += 1;
                    report.bytes_written += bytes;
                }
                Ok(TaskOutcome::Failed) => report.failed += 1,
                Err(e) => {
                    error!("Download worker aborted: {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Pool finished: {} dispatched, {} saved, {} failed, {} bytes",
            report.dispatched, report.succeeded, report.failed, report.bytes_written
        );
        report
    }
}
