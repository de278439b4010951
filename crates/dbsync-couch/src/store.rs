use async_trait::async_trait;
use serde::Deserialize;

use dbsync_core::{Endpoint, Job, Result};

use crate::response::TaskState;

/// Result of submitting a task document.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostOutcome {
    Created,
    /// A document with the same ID already exists and must be deleted first.
    Conflict,
}

/// The subset of a stored `_replicator` document needed to delete it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoredTask {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev")]
    pub revision: String,
}

/// Replication-task operations against the target store.
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Scheduler view of the job's task. `not_found` is a state, not an error.
    async fn check_status(&self, job: &Job) -> Result<TaskState>;

    /// Submit a task document. A `conflict` answer is a recoverable outcome.
    async fn post_task(&self, job: &Job, doc: &[u8]) -> Result<PostOutcome>;

    async fn get_task(&self, job: &Job) -> Result<StoredTask>;

    /// Delete the job's task at its current revision.
    async fn delete_task(&self, job: &Job) -> Result<()>;
}

/// Best-effort reachability check used by the startup gate.
#[async_trait]
pub trait Probe: Send + Sync {
    /// `Ok(true)` when the endpoint answered at all; transport failures are
    /// connectivity errors.
    async fn check_reachable(&self, endpoint: &Endpoint) -> Result<bool>;
}
