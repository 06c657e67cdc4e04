//! Bounded-concurrency executor for extraction tasks
//!
//! Every task holds a semaphore permit for its whole lifetime, including the
//! wait on its external processes, so the slot count caps the number of
//! archivers running at once across all jobs.

use crate::error::ExtractionError;
use crate::types::ExtractionOutcome;
use futures::future::join_all;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info};

/// Shared worker pool
///
/// Resizing swaps in a fresh set of slots: tasks already submitted keep the
/// slots they were submitted against, tasks submitted afterwards use the new
/// count.
pub struct ExtractionPool {
    slots: Mutex<Arc<Semaphore>>,
    size: AtomicUsize,
    tracker: TaskTracker,
}

/// Handle to one submitted task
pub struct ExtractionHandle {
    archive: PathBuf,
    handle: JoinHandle<ExtractionOutcome>,
}

impl ExtractionHandle {
    /// Archive the task is extracting
    pub fn archive(&self) -> &std::path::Path {
        &self.archive
    }

    /// Wait for the task; a panic becomes a failed outcome
    pub async fn join(self) -> ExtractionOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let err = ExtractionError::TaskPanicked {
                    archive: self.archive.clone(),
                    reason: e.to_string(),
                };
                tracing::error!(archive = %self.archive.display(), error = %err, "extraction task aborted");
                ExtractionOutcome {
                    archive: self.archive,
                    placed: Vec::new(),
                    error: Some(err.to_string()),
                }
            }
        }
    }
}

impl ExtractionPool {
    /// Create a pool with `size` slots (at least one)
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            slots: Mutex::new(Arc::new(Semaphore::new(size))),
            size: AtomicUsize::new(size),
            tracker: TaskTracker::new(),
        }
    }

    /// Current slot count for new submissions
    pub fn size(&self) -> usize {
        self.size.load(Ordering::SeqCst)
    }

    /// Free slots for new submissions
    pub fn available(&self) -> usize {
        self.current_slots().available_permits()
    }

    /// Number of submitted tasks that have not finished
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    fn current_slots(&self) -> Arc<Semaphore> {
        let guard = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&guard)
    }

    /// Change the slot count for future submissions
    pub fn resize(&self, size: usize) {
        let size = size.max(1);
        let previous = self.size.swap(size, Ordering::SeqCst);
        if previous == size {
            return;
        }

        let mut guard = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Arc::new(Semaphore::new(size));
        info!(previous, size, "extraction pool resized");
    }

    /// Queue a task; it starts once a slot is free
    pub fn submit<F>(&self, archive: PathBuf, task: F) -> ExtractionHandle
    where
        F: Future<Output = ExtractionOutcome> + Send + 'static,
    {
        let slots = self.current_slots();
        let task_archive = archive.clone();

        let handle = self.tracker.spawn(async move {
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return ExtractionOutcome {
                        archive: task_archive,
                        placed: Vec::new(),
                        error: Some("extraction pool closed".to_string()),
                    };
                }
            };
            debug!(archive = %task_archive.display(), "extraction slot acquired");
            task.await
        });

        ExtractionHandle { archive, handle }
    }

    /// Wait for every handle; one failure never cancels the others
    pub async fn await_all(handles: Vec<ExtractionHandle>) -> Vec<ExtractionOutcome> {
        join_all(handles.into_iter().map(ExtractionHandle::join)).await
    }

    /// Wait for every outstanding task to finish
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::watch;

    /// Tracks concurrently running tasks and the peak
    #[derive(Clone, Default)]
    struct Gauge {
        running: Arc<AtomicUsize>,
        peak: Arc<AtomicUsize>,
    }

    impl Gauge {
        fn enter(&self) {
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
        }

        fn exit(&self) {
            self.running.fetch_sub(1, Ordering::SeqCst);
        }

        fn running(&self) -> usize {
            self.running.load(Ordering::SeqCst)
        }
    }

    fn ok(archive: &str) -> ExtractionOutcome {
        ExtractionOutcome {
            archive: PathBuf::from(archive),
            placed: Vec::new(),
            error: None,
        }
    }

    /// Task that stays running until `release` is set
    fn held_task(
        gauge: Gauge,
        mut release: watch::Receiver<bool>,
        name: &'static str,
    ) -> impl Future<Output = ExtractionOutcome> + Send + 'static {
        async move {
            gauge.enter();
            let _ = release.wait_for(|go| *go).await;
            gauge.exit();
            ok(name)
        }
    }

    async fn wait_until(mut check: impl FnMut() -> bool) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !check() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn pool_never_exceeds_slot_count() {
        let pool = ExtractionPool::new(2);
        let gauge = Gauge::default();

        let handles: Vec<_> = (0..6)
            .map(|i| {
                let gauge = gauge.clone();
                pool.submit(PathBuf::from(format!("{i}.rar")), async move {
                    gauge.enter();
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    gauge.exit();
                    ok("x")
                })
            })
            .collect();

        let outcomes = ExtractionPool::await_all(handles).await;
        assert_eq!(outcomes.len(), 6);
        assert!(gauge.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn failing_task_does_not_cancel_siblings() {
        let pool = ExtractionPool::new(2);

        let handles = vec![
            pool.submit(PathBuf::from("bad.zip"), async {
                ExtractionOutcome {
                    archive: PathBuf::from("bad.zip"),
                    placed: Vec::new(),
                    error: Some("exit 9".to_string()),
                }
            }),
            pool.submit(PathBuf::from("good.zip"), async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                ok("good.zip")
            }),
        ];

        let outcomes = ExtractionPool::await_all(handles).await;
        assert!(!outcomes[0].succeeded());
        assert!(outcomes[1].succeeded());
    }

    #[tokio::test]
    async fn panicking_task_becomes_failed_outcome() {
        let pool = ExtractionPool::new(1);
        let handle = pool.submit(PathBuf::from("boom.7z"), async { panic!("boom") });

        let outcome = handle.join().await;
        assert_eq!(outcome.archive, PathBuf::from("boom.7z"));
        assert!(outcome.error.unwrap().contains("did not complete"));
    }

    #[tokio::test]
    async fn resize_keeps_running_tasks_and_applies_to_new_submissions() {
        let pool = ExtractionPool::new(2);
        let gauge = Gauge::default();
        let (release_tx, release_rx) = watch::channel(false);

        let mut handles = vec![
            pool.submit(PathBuf::from("a"), held_task(gauge.clone(), release_rx.clone(), "a")),
            pool.submit(PathBuf::from("b"), held_task(gauge.clone(), release_rx.clone(), "b")),
        ];
        wait_until(|| gauge.running() == 2).await;

        pool.resize(4);
        assert_eq!(pool.size(), 4);
        assert_eq!(pool.available(), 4, "new slots start empty");

        for name in ["c", "d", "e", "f"] {
            handles.push(pool.submit(
                PathBuf::from(name),
                held_task(gauge.clone(), release_rx.clone(), name),
            ));
        }

        // Old pair still running plus four under the new capacity
        wait_until(|| gauge.running() == 6).await;

        release_tx.send(true).unwrap();
        let outcomes = ExtractionPool::await_all(handles).await;
        assert!(outcomes.iter().all(ExtractionOutcome::succeeded));
    }

    #[tokio::test]
    async fn drain_waits_for_outstanding_tasks() {
        let pool = ExtractionPool::new(1);
        let finished = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let finished = finished.clone();
            let _ = pool.submit(PathBuf::from("x"), async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                finished.fetch_add(1, Ordering::SeqCst);
                ok("x")
            });
        }

        pool.drain().await;
        assert_eq!(finished.load(Ordering::SeqCst), 3);
        assert_eq!(pool.pending(), 0);
    }

    #[test]
    fn zero_size_is_floored_to_one() {
        let pool = ExtractionPool::new(0);
        assert_eq!(pool.size(), 1);
        pool.resize(0);
        assert_eq!(pool.size(), 1);
    }
}
