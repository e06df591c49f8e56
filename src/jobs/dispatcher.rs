//! Dispatcher - turns a crawl request into registered, running jobs
//!
//! # Partitioning
//!
//! | Parallelism | Jobs created |
//! |-------------|--------------|
//! | 1 | one job holding every URL |
//! | > 1 | one job per URL |
//!
//! Any parallelism above one fans out fully; the exact value is otherwise
//! ignored. Each submission runs on its own worker pool sized to its job
//! count, so no job waits behind another from the same submission.

use crate::config::CrawlerConfig;
use crate::crawler::{CrawlOptions, CrawlTask};
use crate::jobs::job::JobId;
use crate::jobs::pool::{StartSignal, WorkerPool};
use crate::jobs::registry::JobRegistry;
use crate::GleanError;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// One registered job within a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTicket {
    pub job_id: JobId,
    /// 1-based position within the submission
    pub task_number: usize,
    pub urls: Vec<String>,
}

/// Jobs created for a single crawl request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Submission {
    /// Every URL crawled by one job
    Bundled(JobTicket),
    /// One job per URL, in submission order
    FanOut(Vec<JobTicket>),
}

impl Submission {
    pub fn tickets(&self) -> &[JobTicket] {
        match self {
            Self::Bundled(ticket) => std::slice::from_ref(ticket),
            Self::FanOut(tickets) => tickets,
        }
    }

    pub fn job_ids(&self) -> Vec<JobId> {
        self.tickets().iter().map(|t| t.job_id).collect()
    }
}

/// Returns true when `parallelism` splits a request into one job per URL
pub fn fans_out(parallelism: u32) -> bool {
    parallelism > 1
}

/// Splits `urls` into the seed lists of the jobs to create
pub fn partition(urls: &[String], parallelism: u32) -> Vec<Vec<String>> {
    if fans_out(parallelism) {
        urls.iter().map(|url| vec![url.clone()]).collect()
    } else {
        vec![urls.to_vec()]
    }
}

/// Admits crawl requests and hands them to worker pools
pub struct Dispatcher {
    registry: Arc<JobRegistry>,
    client: Client,
    options: CrawlOptions,
    start_ack_timeout: Duration,
}

impl Dispatcher {
    pub fn new(registry: Arc<JobRegistry>, client: Client, config: &CrawlerConfig) -> Self {
        Self {
            registry,
            client,
            options: CrawlOptions::from(config),
            start_ack_timeout: config.start_ack_timeout(),
        }
    }

    pub fn registry(&self) -> &Arc<JobRegistry> {
        &self.registry
    }

    /// Registers and starts the jobs for a crawl request
    ///
    /// For each job: register it as pending, submit its crawl to the pool,
    /// attach the pool handle, then wait briefly for a start signal and
    /// record the reported worker. A missing start signal is not an error.
    ///
    /// Returns as soon as every job has been handed to the pool; it never
    /// waits for a crawl to finish.
    ///
    /// # Errors
    ///
    /// * `BadRequest` - `parallelism` is zero or `urls` is empty
    /// * `Job(DuplicateKey)` - an identifier collision in the registry
    pub async fn submit(&self, urls: Vec<String>, parallelism: u32) -> Result<Submission, GleanError> {
        if parallelism < 1 {
            return Err(GleanError::BadRequest(
                "parallelism must be at least 1".to_string(),
            ));
        }

        if urls.is_empty() {
            return Err(GleanError::BadRequest(
                "at least one URL is required".to_string(),
            ));
        }

        let batches = partition(&urls, parallelism);
        tracing::info!(
            "Submitting {} URLs as {} jobs (parallelism {})",
            urls.len(),
            batches.len(),
            parallelism
        );

        let (pool, mut started) = WorkerPool::new(batches.len());
        let mut tickets = Vec::with_capacity(batches.len());

        for (index, seeds) in batches.into_iter().enumerate() {
            let job_id = JobId::new();
            self.registry.create(job_id, seeds.clone()).await?;

            let task = CrawlTask::new(seeds.clone(), self.options);
            let client = self.client.clone();
            let handle = pool.submit(job_id, async move { task.run(&client).await });
            self.registry.attach_handle(job_id, handle).await?;

            self.await_start_signal(&mut started).await;

            tickets.push(JobTicket {
                job_id,
                task_number: index + 1,
                urls: seeds,
            });
        }

        if fans_out(parallelism) {
            Ok(Submission::FanOut(tickets))
        } else {
            let ticket = tickets.pop().ok_or_else(|| {
                GleanError::WorkerPool("bundled submission produced no job".to_string())
            })?;
            Ok(Submission::Bundled(ticket))
        }
    }

    /// Waits up to the configured timeout for one start signal
    ///
    /// The signal may belong to any job of the batch; its worker is recorded
    /// on whichever job it names.
    async fn await_start_signal(&self, started: &mut mpsc::Receiver<StartSignal>) {
        match tokio::time::timeout(self.start_ack_timeout, started.recv()).await {
            Ok(Some(signal)) => {
                if let Err(e) = self.registry.attach_worker(signal.job_id, signal.worker).await {
                    tracing::warn!("Could not record worker for job {}: {}", signal.job_id, e);
                }
            }
            Ok(None) => tracing::debug!("Start signal channel closed"),
            Err(_) => tracing::debug!(
                "No start signal within {:?}; worker metadata left empty",
                self.start_ack_timeout
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::job::JobState;
    use crate::JobError;

    fn urls(items: &[&str]) -> Vec<String> {
        items.iter().map(|u| u.to_string()).collect()
    }

    // Port 9 (discard) on localhost refuses connections, so jobs fail fast.
    fn unreachable_urls(count: usize) -> Vec<String> {
        (0..count)
            .map(|i| format!("http://127.0.0.1:9/page{}", i))
            .collect()
    }

    fn dispatcher() -> Dispatcher {
        Dispatcher::new(
            Arc::new(JobRegistry::new()),
            Client::new(),
            &CrawlerConfig::default(),
        )
    }

    #[test]
    fn test_partition_bundles_at_one() {
        let input = urls(&["http://a.test/", "http://b.test/", "http://c.test/"]);
        let batches = partition(&input, 1);
        assert_eq!(batches, vec![input.clone()]);

        let batches = partition(&input, 0);
        assert_eq!(batches.len(), 1);
    }

    #[test]
    fn test_partition_fans_out_above_one() {
        let input = urls(&["http://a.test/", "http://b.test/", "http://c.test/"]);

        for parallelism in [2, 3, 7, 1000] {
            let batches = partition(&input, parallelism);
            assert_eq!(batches.len(), input.len());
            for (batch, url) in batches.iter().zip(&input) {
                assert_eq!(batch, &vec![url.clone()]);
            }
        }
    }

    #[test]
    fn test_partition_keeps_duplicates() {
        let input = urls(&["http://a.test/", "http://a.test/"]);
        assert_eq!(partition(&input, 2).len(), 2);
    }

    #[tokio::test]
    async fn test_submit_bundled_creates_one_job() {
        let dispatcher = dispatcher();
        let input = unreachable_urls(3);

        let submission = dispatcher.submit(input.clone(), 1).await.unwrap();

        match &submission {
            Submission::Bundled(ticket) => {
                assert_eq!(ticket.task_number, 1);
                assert_eq!(ticket.urls, input);
            }
            other => panic!("expected bundled submission, got {:?}", other),
        }
        assert_eq!(dispatcher.registry().len().await, 1);
    }

    #[tokio::test]
    async fn test_submit_fan_out_creates_job_per_url() {
        let dispatcher = dispatcher();
        let input = unreachable_urls(3);

        let submission = dispatcher.submit(input.clone(), 5).await.unwrap();

        let Submission::FanOut(tickets) = &submission else {
            panic!("expected fan-out submission");
        };
        assert_eq!(tickets.len(), 3);
        for (i, ticket) in tickets.iter().enumerate() {
            assert_eq!(ticket.task_number, i + 1);
            assert_eq!(ticket.urls, vec![input[i].clone()]);
        }

        let ids = submission.job_ids();
        assert_eq!(ids.len(), 3);
        assert_ne!(ids[0], ids[1]);
        assert_eq!(dispatcher.registry().len().await, 3);
    }

    #[tokio::test]
    async fn test_submit_rejects_zero_parallelism() {
        let dispatcher = dispatcher();
        let result = dispatcher.submit(unreachable_urls(1), 0).await;

        assert!(matches!(result, Err(GleanError::BadRequest(_))));
        assert!(dispatcher.registry().is_empty().await);
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_urls() {
        let dispatcher = dispatcher();
        let result = dispatcher.submit(Vec::new(), 2).await;

        assert!(matches!(result, Err(GleanError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_unreachable_seed_fails_job_with_worker_recorded() {
        let dispatcher = dispatcher();
        let submission = dispatcher.submit(unreachable_urls(1), 1).await.unwrap();
        let id = submission.job_ids()[0];

        let result = dispatcher.registry().result(id).await;
        assert!(matches!(result, Err(JobError::TaskFailed { .. })));

        let status = dispatcher.registry().status(id).await.unwrap();
        assert_eq!(status.state, JobState::Failed);
        assert!(status.worker.is_some());
    }

    #[tokio::test]
    async fn test_short_ack_timeout_still_submits() {
        let config = CrawlerConfig {
            start_ack_timeout_ms: 1,
            ..CrawlerConfig::default()
        };
        let dispatcher = Dispatcher::new(Arc::new(JobRegistry::new()), Client::new(), &config);

        let submission = dispatcher.submit(unreachable_urls(2), 2).await.unwrap();

        for id in submission.job_ids() {
            let result = dispatcher.registry().result(id).await;
            assert!(matches!(result, Err(JobError::TaskFailed { .. })));
        }
    }

    #[tokio::test]
    async fn test_missing_start_signal_leaves_worker_empty() {
        let config = CrawlerConfig {
            start_ack_timeout_ms: 1,
            ..CrawlerConfig::default()
        };
        let dispatcher = Dispatcher::new(Arc::new(JobRegistry::new()), Client::new(), &config);
        let registry = dispatcher.registry();
        let id = JobId::new();
        registry.create(id, Vec::new()).await.unwrap();

        let (pool, _unread) = WorkerPool::new(1);
        let handle = pool.submit(id, async { Ok(urls(&["http://a.test/x.png"])) });
        registry.attach_handle(id, handle).await.unwrap();

        // Nothing is ever sent on this channel
        let (_sender, mut silent) = mpsc::channel(1);
        dispatcher.await_start_signal(&mut silent).await;

        assert_eq!(
            *registry.result(id).await.unwrap(),
            urls(&["http://a.test/x.png"])
        );
        let status = registry.status(id).await.unwrap();
        assert_eq!(status.state, JobState::Completed);
        assert!(status.worker.is_none());
    }

    #[tokio::test]
    async fn test_closed_start_channel_returns_early() {
        let config = CrawlerConfig {
            start_ack_timeout_ms: 60_000,
            ..CrawlerConfig::default()
        };
        let dispatcher = Dispatcher::new(Arc::new(JobRegistry::new()), Client::new(), &config);
        let id = JobId::new();
        dispatcher.registry().create(id, Vec::new()).await.unwrap();

        let (sender, mut closed) = mpsc::channel::<StartSignal>(1);
        drop(sender);

        let waited = tokio::time::timeout(
            Duration::from_secs(5),
            dispatcher.await_start_signal(&mut closed),
        )
        .await;
        assert!(waited.is_ok());
        assert!(dispatcher.registry().status(id).await.unwrap().worker.is_none());
    }

    #[tokio::test]
    async fn test_start_signal_recorded_on_named_job() {
        let dispatcher = dispatcher();
        let registry = dispatcher.registry();
        let idle = JobId::new();
        let started = JobId::new();
        registry.create(idle, Vec::new()).await.unwrap();
        registry.create(started, Vec::new()).await.unwrap();

        let (pool, mut signals) = WorkerPool::new(1);
        let handle = pool.submit(started, async { Ok(Vec::new()) });
        registry.attach_handle(started, handle).await.unwrap();

        dispatcher.await_start_signal(&mut signals).await;

        assert!(registry.status(started).await.unwrap().worker.is_some());
        assert!(registry.status(idle).await.unwrap().worker.is_none());
    }
}
