//! Per-job state machine.
//!
//! ```text
//! CheckStatus ──active──▶ Skipped
//!      │
//!      ▼
//!    Post ──created──▶ Created
//!      │  ▲
//!  conflict │
//!      ▼  │
//!    Delete
//! ```
//!
//! Any error ends the run for that job only.

use tracing::{debug, info, warn};

use dbsync_core::{DbsyncError, Endpoint, Job, Result};
use dbsync_couch::{document, PostOutcome, TaskState, TaskStore};

/// How a single job pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// A task was already active on the target; nothing was posted.
    Skipped(TaskState),
    /// A fresh task document was accepted.
    Created { conflicts_cleared: u32 },
}

enum Step {
    CheckStatus,
    Post,
    Delete,
}

pub struct JobRunner<'a> {
    store: &'a dyn TaskStore,
    source: &'a Endpoint,
    target: &'a Endpoint,
    max_conflict_retries: u32,
}

impl<'a> JobRunner<'a> {
    pub fn new(
        store: &'a dyn TaskStore,
        source: &'a Endpoint,
        target: &'a Endpoint,
        max_conflict_retries: u32,
    ) -> Self {
        Self {
            store,
            source,
            target,
            max_conflict_retries,
        }
    }

    pub async fn run(&self, job: &Job) -> Result<JobOutcome> {
        debug!(database = %job.database, "running replication");

        let mut conflicts = 0u32;
        let mut step = Step::CheckStatus;
        loop {
            step = match step {
                Step::CheckStatus => {
                    let state = self.store.check_status(job).await?;
                    if state.is_active() {
                        info!(database = %job.database, %state, "replication already active, skipping");
                        return Ok(JobOutcome::Skipped(state));
                    }
                    debug!(database = %job.database, %state, "no active replication task");
                    Step::Post
                }

                Step::Post => {
                    let doc = document::build(self.source, self.target, job)?;
                    match self.store.post_task(job, &doc).await? {
                        PostOutcome::Created => {
                            info!(
                                database = %job.database,
                                task_id = %job.task_id(),
                                continuous = job.continuous,
                                "replication task created"
                            );
                            return Ok(JobOutcome::Created {
                                conflicts_cleared: conflicts,
                            });
                        }
                        PostOutcome::Conflict if conflicts >= self.max_conflict_retries => {
                            return Err(DbsyncError::ConflictLimit {
                                database: job.database.clone(),
                                attempts: conflicts,
                            });
                        }
                        PostOutcome::Conflict => {
                            conflicts += 1;
                            Step::Delete
                        }
                    }
                }

                Step::Delete => {
                    warn!(
                        database = %job.database,
                        attempt = conflicts,
                        "stale replication task in the way, deleting"
                    );
                    self.store.delete_task(job).await?;
                    Step::Post
                }
            };
        }
    }
}
