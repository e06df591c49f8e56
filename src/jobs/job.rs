//! Job identity and lifecycle definitions
//!
//! A job moves through `Pending → Running → {Completed | Failed}` and never
//! moves backwards.

use crate::jobs::pool::WorkerId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque 128-bit job identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(Uuid);

impl JobId {
    /// Allocates a new random identifier
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    /// Accepts hyphenated, simple, braced and URN forms
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s).map(Self)
    }
}

impl From<Uuid> for JobId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Represents the current state of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Registered, waiting for a worker slot
    Pending,

    /// A worker is executing the crawl
    Running,

    /// Finished with a result
    Completed,

    /// Finished with an error
    Failed,
}

impl JobState {
    /// Returns true if this is a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    fn rank(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Running => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    /// Returns true if moving to `next` keeps the lifecycle monotonic
    ///
    /// A pending job may fail without ever running (for example when its
    /// worker could not be started).
    pub fn can_transition_to(&self, next: JobState) -> bool {
        next.rank() > self.rank()
    }

    /// Label reported by the status endpoint
    ///
    /// Every terminal job reports `"completed"`, failed ones included; the
    /// cause of a failure is carried in the status `error` field.
    pub fn as_status_str(&self) -> &'static str {
        if self.is_terminal() {
            "completed"
        } else {
            "inprogress"
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "Pending",
            Self::Running => "Running",
            Self::Completed => "Completed",
            Self::Failed => "Failed",
        };
        write!(f, "{}", s)
    }
}

/// Point-in-time view of a job, as answered by the registry
#[derive(Debug, Clone, Serialize)]
pub struct JobStatus {
    pub job_id: JobId,
    pub state: JobState,
    pub input_urls: Vec<String>,
    pub worker: Option<WorkerId>,
    pub submitted_at: DateTime<Utc>,
    /// Set only when `state` is `Failed`
    pub error: Option<String>,
}
