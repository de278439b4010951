//! In-memory stand-ins for the document store, shared by the unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use dbsync_core::{DbsyncError, Endpoint, Job, Result};
use dbsync_couch::{PostOutcome, Probe, StoredTask, TaskState, TaskStore};

#[derive(Debug, Clone, Copy)]
pub enum Reply {
    Created,
    Conflict,
    Fail,
}

fn remote_failure() -> DbsyncError {
    DbsyncError::Network {
        status: 500,
        error: "internal_server_error".into(),
        reason: "scripted failure".into(),
    }
}

/// Behaves like a `_replicator` database: posting an existing ID conflicts,
/// a created task reports `added` until deleted. Scripted replies override
/// the stored-document logic per database.
#[derive(Default)]
pub struct FakeStore {
    status: Mutex<HashMap<String, TaskState>>,
    docs: Mutex<HashMap<String, Vec<u8>>>,
    scripts: Mutex<HashMap<String, VecDeque<Reply>>>,
    failing_status: HashSet<String>,
    failing_deletes: HashSet<String>,
    status_calls: Mutex<HashMap<String, usize>>,
    post_calls: Mutex<HashMap<String, usize>>,
    delete_calls: Mutex<HashMap<String, usize>>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_status(self, db: &str, state: TaskState) -> Self {
        self.status.lock().unwrap().insert(db.to_string(), state);
        self
    }

    pub fn with_posts<const N: usize>(self, db: &str, replies: [Reply; N]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(db.to_string(), replies.into_iter().collect());
        self
    }

    pub fn failing_status(mut self, db: &str) -> Self {
        self.failing_status.insert(db.to_string());
        self
    }

    pub fn failing_deletes(mut self, db: &str) -> Self {
        self.failing_deletes.insert(db.to_string());
        self
    }

    pub fn status_checks(&self, db: &str) -> usize {
        count(&self.status_calls, db)
    }

    pub fn posts(&self, db: &str) -> usize {
        count(&self.post_calls, db)
    }

    pub fn deletes(&self, db: &str) -> usize {
        count(&self.delete_calls, db)
    }

    pub fn stored_doc(&self, db: &str) -> Option<serde_json::Value> {
        self.docs
            .lock()
            .unwrap()
            .get(db)
            .map(|bytes| serde_json::from_slice(bytes).unwrap())
    }
}

fn count(calls: &Mutex<HashMap<String, usize>>, db: &str) -> usize {
    calls.lock().unwrap().get(db).copied().unwrap_or(0)
}

fn bump(calls: &Mutex<HashMap<String, usize>>, db: &str) {
    *calls.lock().unwrap().entry(db.to_string()).or_default() += 1;
}

#[async_trait]
impl TaskStore for FakeStore {
    async fn check_status(&self, job: &Job) -> Result<TaskState> {
        bump(&self.status_calls, &job.database);
        if self.failing_status.contains(&job.database) {
            return Err(remote_failure());
        }
        let state = self
            .status
            .lock()
            .unwrap()
            .get(&job.database)
            .cloned()
            .unwrap_or(TaskState::NotFound);
        // Let overlapping passes observe the same state before either posts.
        tokio::task::yield_now().await;
        Ok(state)
    }

    async fn post_task(&self, job: &Job, doc: &[u8]) -> Result<PostOutcome> {
        bump(&self.post_calls, &job.database);
        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&job.database)
            .and_then(|q| q.pop_front());

        match scripted {
            Some(Reply::Created) => Ok(PostOutcome::Created),
            Some(Reply::Conflict) => Ok(PostOutcome::Conflict),
            Some(Reply::Fail) => Err(remote_failure()),
            None => {
                let mut docs = self.docs.lock().unwrap();
                if docs.contains_key(&job.database) {
                    return Ok(PostOutcome::Conflict);
                }
                docs.insert(job.database.clone(), doc.to_vec());
                self.status
                    .lock()
                    .unwrap()
                    .insert(job.database.clone(), TaskState::Active("added".into()));
                Ok(PostOutcome::Created)
            }
        }
    }

    async fn get_task(&self, job: &Job) -> Result<StoredTask> {
        Ok(StoredTask {
            id: job.task_id(),
            revision: "1-fake".into(),
        })
    }

    async fn delete_task(&self, job: &Job) -> Result<()> {
        bump(&self.delete_calls, &job.database);
        if self.failing_deletes.contains(&job.database) {
            return Err(remote_failure());
        }
        self.docs.lock().unwrap().remove(&job.database);
        self.status.lock().unwrap().remove(&job.database);
        Ok(())
    }
}

/// Probe that refuses a configured number of attempts per address, then
/// answers.
#[derive(Default)]
pub struct FakeProbe {
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl FakeProbe {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn down_for(self, address: &str, failures: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(address.to_string(), failures);
        self
    }

    pub fn calls(&self, address: &str) -> usize {
        count(&self.calls, address)
    }
}

#[async_trait]
impl Probe for FakeProbe {
    async fn check_reachable(&self, endpoint: &Endpoint) -> Result<bool> {
        bump(&self.calls, &endpoint.address);
        let mut failures = self.failures.lock().unwrap();
        match failures.get_mut(&endpoint.address) {
            Some(remaining) if *remaining > 0 => {
                *remaining -= 1;
                Err(DbsyncError::Connectivity {
                    endpoint: endpoint.address.clone(),
                    reason: "connection refused".into(),
                })
            }
            _ => Ok(true),
        }
    }
}
