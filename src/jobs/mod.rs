//! Job subsystem: admission, execution and tracking of crawl work
//!
//! # Components
//!
//! - `Dispatcher`: partitions a request into jobs and starts them
//! - `WorkerPool`: runs crawl work concurrently in isolated tokio tasks
//! - `JobRegistry`: answers status and result queries for every job
//! - `JobId`, `JobState`, `JobStatus`: job identity and lifecycle

mod dispatcher;
mod job;
mod pool;
mod registry;

pub use dispatcher::{fans_out, partition, Dispatcher, JobTicket, Submission};
pub use job::{JobId, JobState, JobStatus};
pub use pool::{StartSignal, TaskHandle, TaskOutcome, WorkerId, WorkerPool};
pub use registry::JobRegistry;
