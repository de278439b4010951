use thiserror::Error;

#[derive(Debug, Error)]
pub enum DbsyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Endpoint unreachable ({endpoint}): {reason}")]
    Connectivity { endpoint: String, reason: String },

    /// Non-2xx from the document store that matched no known sentinel.
    #[error("Remote error ({status}): {error}: {reason}")]
    Network {
        status: u16,
        error: String,
        reason: String,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Task for {database} still conflicting after {attempts} delete attempts")]
    ConflictLimit { database: String, attempts: u32 },

    #[error("Replication failed for {} of {total} databases: {}", failed.len(), failed.join(", "))]
    JobsFailed { failed: Vec<String>, total: usize },

    #[error("Endpoints still unreachable after {waited_secs}s")]
    GateTimeout { waited_secs: u64 },

    #[error("Shutdown requested")]
    Shutdown,
}

impl DbsyncError {
    /// Short error code string used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            DbsyncError::Config(_) => "CONFIG_ERROR",
            DbsyncError::Connectivity { .. } => "CONNECTIVITY_ERROR",
            DbsyncError::Network { .. } => "NETWORK_ERROR",
            DbsyncError::Transport(_) => "TRANSPORT_ERROR",
            DbsyncError::Timeout { .. } => "TIMEOUT",
            DbsyncError::Serialization(_) => "SERIALIZATION_ERROR",
            DbsyncError::ConflictLimit { .. } => "CONFLICT_LIMIT",
            DbsyncError::JobsFailed { .. } => "JOBS_FAILED",
            DbsyncError::GateTimeout { .. } => "GATE_TIMEOUT",
            DbsyncError::Shutdown => "SHUTDOWN",
        }
    }

    /// True for failures talking to the store during a task operation.
    pub fn is_network(&self) -> bool {
        matches!(
            self,
            DbsyncError::Network { .. } | DbsyncError::Transport(_) | DbsyncError::Timeout { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, DbsyncError>;
