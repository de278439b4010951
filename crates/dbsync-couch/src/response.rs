//! Classification of document-store responses.
//!
//! Any 2xx is success. Otherwise the body is read as `{error, reason}` and
//! `error` is matched against the sentinels `not_found` and `conflict` before
//! the response is treated as a failure. Callers tell "expected absence",
//! "expected conflict" and "unexpected failure" apart only through this.

use std::fmt;

use serde::Deserialize;

use dbsync_core::{DbsyncError, Result};

pub const NOT_FOUND: &str = "not_found";
pub const CONFLICT: &str = "conflict";

/// Error body returned by the store on non-2xx responses.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub error: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classified {
    Success(String),
    NotFound,
    Conflict,
}

impl Classified {
    /// For operations where neither sentinel is expected.
    pub fn expect_success(self) -> Result<String> {
        match self {
            Classified::Success(body) => Ok(body),
            Classified::NotFound => Err(network(404, NOT_FOUND, "")),
            Classified::Conflict => Err(network(409, CONFLICT, "")),
        }
    }
}

fn network(status: u16, error: &str, reason: &str) -> DbsyncError {
    DbsyncError::Network {
        status,
        error: error.to_string(),
        reason: reason.to_string(),
    }
}

/// Non-2xx responses without a known sentinel become [`DbsyncError::Network`].
pub fn classify(status: u16, body: String) -> Result<Classified> {
    if status / 100 == 2 {
        return Ok(Classified::Success(body));
    }

    let parsed: ErrorBody = serde_json::from_str(&body).unwrap_or_else(|_| ErrorBody {
        error: String::new(),
        reason: body.trim().to_string(),
    });

    match parsed.error.as_str() {
        NOT_FOUND => Ok(Classified::NotFound),
        CONFLICT => Ok(Classified::Conflict),
        _ => Err(network(status, &parsed.error, &parsed.reason)),
    }
}

/// Observed state of a replication task on the scheduler endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    NotFound,
    Active(String),
    Errored(String),
    Unknown(String),
}

impl TaskState {
    pub fn from_state(state: &str) -> Self {
        match state {
            "running" | "started" | "added" => TaskState::Active(state.to_string()),
            "error" | "crashing" | "failed" => TaskState::Errored(state.to_string()),
            other => TaskState::Unknown(other.to_string()),
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, TaskState::Active(_))
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskState::NotFound => write!(f, "not-found"),
            TaskState::Active(s) | TaskState::Errored(s) | TaskState::Unknown(s) => {
                write!(f, "{s}")
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct SchedulerDoc {
    #[serde(default)]
    state: Option<String>,
}

/// Map a scheduler-docs response to a [`TaskState`].
pub fn task_state(status: u16, body: String) -> Result<TaskState> {
    match classify(status, body)? {
        Classified::Success(body) => {
            let doc: SchedulerDoc = serde_json::from_str(&body)?;
            Ok(doc
                .state
                .as_deref()
                .map(TaskState::from_state)
                .unwrap_or_else(|| TaskState::Unknown(String::new())))
        }
        Classified::NotFound => Ok(TaskState::NotFound),
        Classified::Conflict => Err(network(status, CONFLICT, "")),
    }
}
