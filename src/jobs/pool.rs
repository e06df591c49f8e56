//! Bounded worker pool executing crawl work
//!
//! Each submission batch gets its own pool sized to the number of tasks in
//! that batch. Every task runs in its own tokio task (an execution unit); the
//! pool's semaphore bounds how many run at once. Tasks keep running after the
//! `WorkerPool` value itself is dropped.
//!
//! Progress flows back through two channels:
//! - a per-task `watch` channel carrying the task phase, read by `TaskHandle`
//! - a per-pool `mpsc` channel carrying a `StartSignal` when a task begins

use crate::jobs::job::{JobId, JobState};
use crate::GleanError;
use serde::Serialize;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch, Semaphore};

static NEXT_WORKER: AtomicU64 = AtomicU64::new(1);

/// Identifier of the execution unit that ran a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        Self(NEXT_WORKER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "worker-{}", self.0)
    }
}

/// Emitted by a task when it starts executing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StartSignal {
    pub job_id: JobId,
    pub worker: WorkerId,
}

/// Terminal result of a task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(Arc<Vec<String>>),
    Failed(String),
}

#[derive(Debug, Clone)]
enum TaskPhase {
    Queued,
    Running,
    Finished(TaskOutcome),
}

impl TaskPhase {
    fn state(&self) -> JobState {
        match self {
            Self::Queued => JobState::Pending,
            Self::Running => JobState::Running,
            Self::Finished(TaskOutcome::Completed(_)) => JobState::Completed,
            Self::Finished(TaskOutcome::Failed(_)) => JobState::Failed,
        }
    }

    fn outcome(&self) -> Option<TaskOutcome> {
        match self {
            Self::Finished(outcome) => Some(outcome.clone()),
            _ => None,
        }
    }
}

/// Moves a task forward; backwards or repeated transitions are ignored
fn advance(phase: &watch::Sender<TaskPhase>, next: TaskPhase) {
    phase.send_if_modified(|current| {
        if current.state().can_transition_to(next.state()) {
            *current = next;
            true
        } else {
            false
        }
    });
}

/// Live view of a submitted task
///
/// Handles are cheap to clone; every clone observes the same task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    job_id: JobId,
    phase: watch::Receiver<TaskPhase>,
}

impl TaskHandle {
    /// Current state of the task at call time
    pub fn state(&self) -> JobState {
        self.phase.borrow().state()
    }

    pub fn is_running(&self) -> bool {
        self.state() == JobState::Running
    }

    pub fn is_done(&self) -> bool {
        self.state().is_terminal()
    }

    /// Returns the outcome if the task already finished, without waiting
    pub fn outcome(&self) -> Option<TaskOutcome> {
        self.phase.borrow().outcome()
    }

    /// Waits until the task finishes and returns its outcome
    ///
    /// May be called any number of times; every call after completion
    /// returns the same outcome.
    pub async fn result(&self) -> TaskOutcome {
        let mut phase = self.phase.clone();
        let finished = phase
            .wait_for(|p| matches!(p, TaskPhase::Finished(_)))
            .await
            .ok()
            .and_then(|p| p.outcome());

        finished.unwrap_or_else(|| {
            TaskOutcome::Failed(format!("worker for job {} vanished", self.job_id))
        })
    }
}

/// A bounded set of execution slots for one submission batch
pub struct WorkerPool {
    slots: Arc<Semaphore>,
    started: mpsc::Sender<StartSignal>,
}

impl WorkerPool {
    /// Creates a pool with `size` slots and the receiver for its start signals
    ///
    /// A size of zero is treated as one.
    pub fn new(size: usize) -> (Self, mpsc::Receiver<StartSignal>) {
        let size = size.max(1);
        let (started, signals) = mpsc::channel(size);

        let pool = Self {
            slots: Arc::new(Semaphore::new(size)),
            started,
        };

        (pool, signals)
    }

    /// Submits work for `job_id` and returns a handle to it
    ///
    /// The work starts once a slot is free. An error or a panic inside the
    /// work yields a failed handle and does not affect other tasks.
    pub fn submit<F>(&self, job_id: JobId, work: F) -> TaskHandle
    where
        F: Future<Output = Result<Vec<String>, GleanError>> + Send + 'static,
    {
        let (phase_tx, phase_rx) = watch::channel(TaskPhase::Queued);
        let phase_tx = Arc::new(phase_tx);
        let worker = WorkerId::next();

        let slots = Arc::clone(&self.slots);
        let started = self.started.clone();
        let running = Arc::clone(&phase_tx);

        let execution = tokio::spawn(async move {
            let _permit = match slots.acquire_owned().await {
                Ok(permit) => permit,
                Err(e) => return Err(GleanError::WorkerPool(e.to_string())),
            };

            advance(&running, TaskPhase::Running);
            tracing::debug!("Job {} started on {}", job_id, worker);

            if started.try_send(StartSignal { job_id, worker }).is_err() {
                tracing::trace!("Start signal for job {} dropped", job_id);
            }

            work.await
        });

        tokio::spawn(async move {
            let outcome = match execution.await {
                Ok(Ok(images)) => {
                    tracing::info!("Job {} completed with {} images", job_id, images.len());
                    TaskOutcome::Completed(Arc::new(images))
                }
                Ok(Err(e)) => {
                    tracing::warn!("Job {} failed: {}", job_id, e);
                    TaskOutcome::Failed(e.to_string())
                }
                Err(e) => {
                    tracing::error!("Job {} aborted on {}: {}", job_id, worker, e);
                    TaskOutcome::Failed(format!("{} aborted: {}", worker, e))
                }
            };

            advance(&phase_tx, TaskPhase::Finished(outcome));
        });

        TaskHandle {
            job_id,
            phase: phase_rx,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    fn images(urls: &[&str]) -> Vec<String> {
        urls.iter().map(|u| u.to_string()).collect()
    }

    #[tokio::test]
    async fn test_zero_size_pool_gets_one_slot() {
        let (pool, _signals) = WorkerPool::new(0);
        let handle = pool.submit(JobId::new(), async { Ok(Vec::new()) });

        let outcome = timeout(Duration::from_secs(5), handle.result()).await;
        assert!(matches!(outcome, Ok(TaskOutcome::Completed(_))));
    }

    #[tokio::test]
    async fn test_completed_task() {
        let (pool, _signals) = WorkerPool::new(1);
        let id = JobId::new();

        let handle = pool.submit(id, async { Ok(images(&["http://a.test/x.png"])) });
        let outcome = handle.result().await;

        assert_eq!(
            outcome,
            TaskOutcome::Completed(Arc::new(images(&["http://a.test/x.png"])))
        );
        assert!(handle.is_done());
        assert!(!handle.is_running());
        assert_eq!(handle.state(), JobState::Completed);
    }

    #[tokio::test]
    async fn test_failed_task() {
        let (pool, _signals) = WorkerPool::new(1);

        let handle = pool.submit(JobId::new(), async {
            Err(GleanError::Fetch {
                url: "http://a.test/".to_string(),
                message: "Connection failed".to_string(),
            })
        });

        match handle.result().await {
            TaskOutcome::Failed(message) => assert!(message.contains("Connection failed")),
            other => panic!("expected failure, got {:?}", other),
        }
        assert_eq!(handle.state(), JobState::Failed);
    }

    #[tokio::test]
    async fn test_panic_is_isolated() {
        let (pool, _signals) = WorkerPool::new(2);

        let panicking = pool.submit(JobId::new(), async {
            if true {
                panic!("boom");
            }
            Ok(Vec::new())
        });
        let healthy = pool.submit(JobId::new(), async { Ok(images(&["http://b.test/y.png"])) });

        assert!(matches!(panicking.result().await, TaskOutcome::Failed(_)));
        assert!(matches!(healthy.result().await, TaskOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_running_then_done() {
        let (pool, mut signals) = WorkerPool::new(1);
        let (release, gate) = oneshot::channel::<()>();

        let handle = pool.submit(JobId::new(), async move {
            let _ = gate.await;
            Ok(Vec::new())
        });

        signals.recv().await.unwrap();
        assert!(handle.is_running());
        assert!(!handle.is_done());
        assert_eq!(handle.outcome(), None);

        release.send(()).unwrap();
        handle.result().await;
        assert!(handle.is_done());
    }

    #[tokio::test]
    async fn test_queued_task_stays_pending_until_slot_frees() {
        let (pool, mut signals) = WorkerPool::new(1);
        let (release, gate) = oneshot::channel::<()>();

        let first_id = JobId::new();
        let first = pool.submit(first_id, async move {
            let _ = gate.await;
            Ok(Vec::new())
        });
        let second = pool.submit(JobId::new(), async { Ok(images(&["http://c.test/z.png"])) });

        let signal = signals.recv().await.unwrap();
        assert_eq!(signal.job_id, first_id);
        assert_eq!(second.state(), JobState::Pending);

        release.send(()).unwrap();
        first.result().await;
        assert!(matches!(second.result().await, TaskOutcome::Completed(_)));
    }

    #[tokio::test]
    async fn test_result_blocks_until_done_and_repeats() {
        let (pool, _signals) = WorkerPool::new(1);
        let (release, gate) = oneshot::channel::<()>();

        let handle = pool.submit(JobId::new(), async move {
            let _ = gate.await;
            Ok(images(&["http://a.test/x.png", "http://a.test/x.png"]))
        });

        let waiting = timeout(Duration::from_millis(50), handle.result()).await;
        assert!(waiting.is_err(), "result must block while the task runs");

        release.send(()).unwrap();
        let first = handle.result().await;
        let second = handle.clone().result().await;
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_start_signal_per_task() {
        let (pool, mut signals) = WorkerPool::new(3);
        let ids: Vec<JobId> = (0..3).map(|_| JobId::new()).collect();

        for id in &ids {
            pool.submit(*id, async { Ok(Vec::new()) });
        }

        let mut seen = Vec::new();
        for _ in 0..3 {
            let signal = timeout(Duration::from_secs(5), signals.recv())
                .await
                .unwrap()
                .unwrap();
            seen.push(signal.job_id);
        }

        for id in &ids {
            assert!(seen.contains(id));
        }
    }

    #[tokio::test]
    async fn test_tasks_outlive_pool() {
        let (pool, _signals) = WorkerPool::new(1);
        let handle = pool.submit(JobId::new(), async { Ok(images(&["http://a.test/x.png"])) });
        drop(pool);

        assert!(matches!(handle.result().await, TaskOutcome::Completed(_)));
    }

    #[test]
    fn test_worker_ids_increase() {
        let a = WorkerId::next();
        let b = WorkerId::next();
        assert_ne!(a, b);
        assert!(b.to_string().starts_with("worker-"));
    }
}
