//! Single-flight background indexing.
//!
//! Each store owns one [`IndexWorker`]. At most one indexing job runs per
//! worker; submitting while a job is in flight hands back the existing
//! job's handle and drops the new work.

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use hearth_core::{Error, Result};
use log::{debug, error};
use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Handle;
use tokio::task::AbortHandle;

/// Handle to a background indexing job.
///
/// Cloning is cheap; every clone resolves to the same count. Dropping a
/// handle does not cancel the job.
#[derive(Clone)]
pub struct IndexHandle {
    id: u64,
    task: AbortHandle,
    result: Shared<BoxFuture<'static, usize>>,
}

impl IndexHandle {
    /// Job identifier, unique per worker.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Whether the job has completed (successfully or not).
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the job and return the number of documents it committed.
    ///
    /// A job that panicked reports 0.
    pub async fn wait(&self) -> usize {
        self.result.clone().await
    }
}

impl std::fmt::Debug for IndexHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndexHandle")
            .field("id", &self.id)
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// Owns the in-flight indexing job of one store.
#[derive(Debug, Default)]
pub struct IndexWorker {
    runtime: Option<Handle>,
    current: Mutex<Option<IndexHandle>>,
    next_id: AtomicU64,
}

impl IndexWorker {
    /// A worker that spawns onto the caller's runtime.
    pub fn new() -> Self {
        Self::default()
    }

    /// A worker bound to a specific runtime.
    pub fn with_runtime(runtime: Handle) -> Self {
        Self {
            runtime: Some(runtime),
            ..Self::default()
        }
    }

    /// Whether a job is currently running.
    pub fn is_busy(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    /// Start `job` unless one is already running.
    ///
    /// `job` is only invoked when a new run starts. Fails when no Tokio
    /// runtime is available to spawn onto.
    pub fn submit<F, Fut>(&self, job: F) -> Result<IndexHandle>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = usize> + Send + 'static,
    {
        let mut current = self.current.lock();
        if let Some(handle) = current.as_ref().filter(|h| !h.is_finished()) {
            debug!("Indexing job {} still running; returning its handle", handle.id);
            return Ok(handle.clone());
        }

        let runtime = match &self.runtime {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| {
                Error::operation("No Tokio runtime available for background indexing")
            })?,
        };

        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let join = runtime.spawn(job());
        let task = join.abort_handle();
        let result = async move {
            match join.await {
                Ok(count) => count,
                Err(e) => {
                    error!("Indexing job {id} failed: {e}");
                    0
                }
            }
        }
        .boxed()
        .shared();

        let handle = IndexHandle { id, task, result };
        debug!("Started indexing job {id}");
        *current = Some(handle.clone());
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;
    use tokio::sync::Notify;

    #[tokio::test]
    async fn test_submit_runs_job() {
        let worker = IndexWorker::new();
        let handle = worker.submit(|| async { 7 }).unwrap();
        assert_eq!(handle.wait().await, 7);
        assert!(handle.is_finished());
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn test_single_flight_returns_same_handle() {
        let worker = IndexWorker::new();
        let gate = Arc::new(Notify::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let first = {
            let gate = gate.clone();
            let runs = runs.clone();
            worker
                .submit(move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    gate.notified().await;
                    3
                })
                .unwrap()
        };
        let second = {
            let runs = runs.clone();
            worker
                .submit(move || async move {
                    runs.fetch_add(1, Ordering::SeqCst);
                    99
                })
                .unwrap()
        };

        assert_eq!(first.id(), second.id());
        assert!(worker.is_busy());

        gate.notify_one();
        assert_eq!(second.wait().await, 3);
        assert_eq!(first.wait().await, 3);
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_new_job_after_completion() {
        let worker = IndexWorker::new();
        let first = worker.submit(|| async { 1 }).unwrap();
        first.wait().await;
        let second = worker.submit(|| async { 2 }).unwrap();
        assert_ne!(first.id(), second.id());
        assert_eq!(second.wait().await, 2);
    }

    #[tokio::test]
    async fn test_panicking_job_reports_zero() {
        let worker = IndexWorker::new();
        let handle = worker
            .submit(|| async {
                if true {
                    panic!("boom");
                }
                0
            })
            .unwrap();
        assert_eq!(handle.wait().await, 0);
    }

    #[test]
    fn test_submit_without_runtime_fails() {
        let worker = IndexWorker::new();
        assert!(worker.submit(|| async { 1 }).is_err());
    }

    #[test]
    fn test_with_runtime_spawns_outside_context() {
        let rt = tokio::runtime::Runtime::new().unwrap();
        let worker = IndexWorker::with_runtime(rt.handle().clone());
        let handle = worker.submit(|| async { 5 }).unwrap();
        assert_eq!(rt.block_on(handle.wait()), 5);
    }
}
