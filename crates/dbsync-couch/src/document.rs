//! Wire shape of a `_replicator` task document.
//!
//! Building is pure: the same source, target and job always serialise to the
//! same bytes, and the document ID is always `auto_<database>`.

use serde::{Deserialize, Serialize};

use dbsync_core::{Endpoint, Job, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDocument {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
    pub revision: Option<String>,
    pub source: TaskEndpoint,
    pub target: TaskEndpoint,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<IdSelector>,
    pub create_target: bool,
    pub continuous: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskEndpoint {
    pub url: String,
    pub auth: TaskAuth,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAuth {
    pub basic: BasicCredentials,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicCredentials {
    pub username: String,
    pub password: String,
}

/// `{"_id": {"$regex": <pattern>}}`. An empty pattern matches every ID.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdSelector {
    #[serde(rename = "_id")]
    pub id: RegexMatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegexMatch {
    #[serde(rename = "$regex")]
    pub regex: String,
}

impl IdSelector {
    pub fn for_job(job: &Job) -> Self {
        Self {
            id: RegexMatch {
                regex: job.id_selector.clone(),
            },
        }
    }
}

impl TaskEndpoint {
    fn for_database(endpoint: &Endpoint, database: &str) -> Result<Self> {
        Ok(Self {
            url: format!(
                "{}/{}",
                endpoint.authenticated_url()?,
                urlencoding::encode(database)
            ),
            auth: TaskAuth {
                basic: BasicCredentials {
                    username: endpoint.username.clone(),
                    password: endpoint.password.clone(),
                },
            },
        })
    }
}

impl TaskDocument {
    /// Assemble the task document for `job`. Fails with a config error when
    /// either endpoint cannot produce an authenticated URL.
    pub fn new(source: &Endpoint, target: &Endpoint, job: &Job) -> Result<Self> {
        Ok(Self {
            id: job.task_id(),
            revision: None,
            source: TaskEndpoint::for_database(source, &job.database)?,
            target: TaskEndpoint::for_database(target, &job.database)?,
            selector: Some(IdSelector::for_job(job)),
            create_target: true,
            continuous: job.continuous,
        })
    }

    pub fn with_revision(mut self, revision: impl Into<String>) -> Self {
        self.revision = Some(revision.into());
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Serialise the task document for one job.
pub fn build(source: &Endpoint, target: &Endpoint, job: &Job) -> Result<Vec<u8>> {
    TaskDocument::new(source, target, job)?.to_bytes()
}
