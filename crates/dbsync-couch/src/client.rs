//! HTTP client for the target store's `_replicator` database and
//! `_scheduler/docs` endpoint.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use tracing::{debug, warn};

use dbsync_core::{DbsyncError, Endpoint, Job, Result};

use crate::response::{classify, task_state, Classified, TaskState, NOT_FOUND};
use crate::store::{PostOutcome, Probe, StoredTask, TaskStore};

const REPLICATOR_DB: &str = "_replicator";

pub struct CouchClient {
    client: Client,
    target: Endpoint,
    timeout: Duration,
}

impl CouchClient {
    /// Build a client bound to `target` with a per-request timeout.
    pub fn new(target: Endpoint, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DbsyncError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            target,
            timeout,
        })
    }

    fn task_url(&self, job: &Job) -> String {
        format!(
            "{}/{REPLICATOR_DB}/{}",
            self.target.base_url(),
            urlencoding::encode(&job.task_id())
        )
    }

    fn scheduler_url(&self, job: &Job) -> String {
        format!(
            "{}/_scheduler/docs/{REPLICATOR_DB}/{}",
            self.target.base_url(),
            urlencoding::encode(&job.task_id())
        )
    }

    fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.basic_auth(&self.target.username, Some(&self.target.password))
    }

    /// Send and return (status, body), mapping transport failures.
    async fn execute(&self, req: RequestBuilder) -> Result<(u16, String)> {
        let resp = self.authed(req).send().await.map_err(|e| self.transport(e))?;
        let status = resp.status().as_u16();
        let body = resp.text().await.map_err(|e| self.transport(e))?;
        Ok((status, body))
    }

    fn transport(&self, e: reqwest::Error) -> DbsyncError {
        if e.is_timeout() {
            DbsyncError::Timeout {
                ms: self.timeout.as_millis() as u64,
            }
        } else {
            DbsyncError::Transport(e.without_url().to_string())
        }
    }
}

#[async_trait]
impl TaskStore for CouchClient {
    async fn check_status(&self, job: &Job) -> Result<TaskState> {
        let (status, body) = self.execute(self.client.get(self.scheduler_url(job))).await?;
        let state = task_state(status, body)?;
        debug!(database = %job.database, %state, "task status");
        Ok(state)
    }

    async fn post_task(&self, job: &Job, doc: &[u8]) -> Result<PostOutcome> {
        let url = format!("{}/{REPLICATOR_DB}", self.target.base_url());
        let req = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(doc.to_vec());

        let (status, body) = self.execute(req).await?;
        let classified = classify(status, body).inspect_err(|e| {
            warn!(database = %job.database, status, error = %e, "task submission rejected");
        })?;
        match classified {
            Classified::Success(_) => Ok(PostOutcome::Created),
            Classified::Conflict => {
                debug!(database = %job.database, "task document already exists");
                Ok(PostOutcome::Conflict)
            }
            Classified::NotFound => Err(DbsyncError::Network {
                status,
                error: NOT_FOUND.to_string(),
                reason: format!("{REPLICATOR_DB} database is missing on the target"),
            }),
        }
    }

    async fn get_task(&self, job: &Job) -> Result<StoredTask> {
        let (status, body) = self.execute(self.client.get(self.task_url(job))).await?;
        let body = classify(status, body)?.expect_success()?;
        Ok(serde_json::from_str(&body)?)
    }

    /// A task that is already gone counts as deleted: an overlapping pass
    /// cleared it first.
    async fn delete_task(&self, job: &Job) -> Result<()> {
        let (status, body) = self.execute(self.client.get(self.task_url(job))).await?;
        let task: StoredTask = match classify(status, body)? {
            Classified::NotFound => {
                debug!(database = %job.database, "task document already removed");
                return Ok(());
            }
            other => serde_json::from_str(&other.expect_success()?)?,
        };

        let req = self
            .client
            .delete(self.task_url(job))
            .query(&[("rev", task.revision.as_str())]);
        let (status, body) = self.execute(req).await?;
        match classify(status, body)? {
            Classified::NotFound => {
                debug!(
                    database = %job.database,
                    rev = %task.revision,
                    "task document removed concurrently"
                );
            }
            other => {
                other.expect_success()?;
                debug!(database = %job.database, rev = %task.revision, "task document deleted");
            }
        }
        Ok(())
    }
}

/// Unauthenticated GET against an endpoint's base address.
pub struct HttpProbe {
    client: Client,
}

impl HttpProbe {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DbsyncError::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Probe for HttpProbe {
    async fn check_reachable(&self, endpoint: &Endpoint) -> Result<bool> {
        // Any HTTP answer counts, including 401.
        self.client
            .get(endpoint.base_url())
            .send()
            .await
            .map(|_| true)
            .map_err(|e| DbsyncError::Connectivity {
                endpoint: endpoint.base_url().to_string(),
                reason: e.without_url().to_string(),
            })
    }
}
