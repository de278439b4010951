use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use dbsync_core::{DbsyncError, Result};

use crate::runner::JobOutcome;

/// Outcome of one job inside a pass.
#[derive(Debug)]
pub struct JobReport {
    pub database: String,
    pub result: Result<JobOutcome>,
}

/// Everything one `run_all` pass did, job by job.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub jobs: Vec<JobReport>,
}

impl RunReport {
    pub fn failed(&self) -> Vec<String> {
        self.jobs
            .iter()
            .filter(|j| j.result.is_err())
            .map(|j| j.database.clone())
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.jobs.iter().all(|j| j.result.is_ok())
    }

    fn count(&self, pred: impl Fn(&JobOutcome) -> bool) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.result.as_ref().is_ok_and(&pred))
            .count()
    }

    pub fn created(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Created { .. }))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, JobOutcome::Skipped(_)))
    }

    /// `JobsFailed` naming every failed database, if any job failed.
    pub fn into_result(self) -> Result<Self> {
        if self.is_success() {
            return Ok(self);
        }
        Err(DbsyncError::JobsFailed {
            failed: self.failed(),
            total: self.jobs.len(),
        })
    }

    pub fn summary(&self) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            started_at: self.started_at,
            finished_at: self.finished_at,
            total: self.jobs.len(),
            created: self.created(),
            skipped: self.skipped(),
            failed: self
                .jobs
                .iter()
                .filter_map(|j| {
                    j.result.as_ref().err().map(|e| FailedJob {
                        database: j.database.clone(),
                        code: e.code(),
                        error: e.to_string(),
                    })
                })
                .collect(),
        }
    }
}

/// Serialisable view of a [`RunReport`] for HTTP responses.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub total: usize,
    pub created: usize,
    pub skipped: usize,
    pub failed: Vec<FailedJob>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedJob {
    pub database: String,
    pub code: &'static str,
    pub error: String,
}
