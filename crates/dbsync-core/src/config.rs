use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Json, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{DbsyncError, Result};
use crate::types::{Endpoint, Job};

pub const DEFAULT_PORT: u16 = 7012;
pub const DEFAULT_BIND: &str = "0.0.0.0";
pub const DEFAULT_CONFIG_PATH: &str = "dbsync.toml";
pub const DEFAULT_INTERVAL_MINUTES: u64 = 5;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_CONFLICT_RETRIES: u32 = 10;
/// One year; longer intervals are rejected by `validate`.
pub const MAX_INTERVAL_MINUTES: u64 = 365 * 24 * 60;

/// Top-level config (dbsync.toml or .json + DBSYNC_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbsyncConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    pub source: EndpointConfig,
    pub target: EndpointConfig,
    #[serde(default)]
    pub jobs: Vec<JobConfig>,
    #[serde(
        default = "default_interval_minutes",
        alias = "timeInterval",
        alias = "timeIntervalMinutes"
    )]
    pub time_interval_minutes: u64,
    /// Upper bound on delete-and-repost cycles per job per pass.
    #[serde(default = "default_max_conflict_retries", alias = "maxConflictRetries")]
    pub max_conflict_retries: u32,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub gate: GateConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_port(),
        }
    }
}

/// Credentials block as written in the config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

impl From<&EndpointConfig> for Endpoint {
    fn from(c: &EndpointConfig) -> Self {
        Endpoint::new(c.address.clone(), c.username.clone(), c.password.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobConfig {
    pub database: String,
    #[serde(default)]
    pub continuous: bool,
    #[serde(default, alias = "idSelector")]
    pub id_selector: String,
}

impl From<&JobConfig> for Job {
    fn from(c: &JobConfig) -> Self {
        Job::new(c.database.clone(), c.continuous, c.id_selector.clone())
    }
}

/// Outbound HTTP settings for the document-store client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Backoff for the startup connection gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Give up after this long. Unset means wait until shutdown.
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            max_wait_secs: None,
        }
    }
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_interval_minutes() -> u64 {
    DEFAULT_INTERVAL_MINUTES
}
fn default_max_conflict_retries() -> u32 {
    DEFAULT_MAX_CONFLICT_RETRIES
}
fn default_request_timeout_secs() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_SECS
}
fn default_initial_delay_ms() -> u64 {
    500
}
fn default_max_delay_ms() -> u64 {
    30_000
}

impl DbsyncConfig {
    /// Load config from a TOML or JSON file with DBSYNC_* env var overrides.
    ///
    /// Path resolution: explicit argument, then `DBSYNC_CONFIG`, then
    /// `./dbsync.toml`. An explicitly named file must exist; the default
    /// path may be absent when everything comes from the environment.
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let explicit = config_path
            .map(String::from)
            .or_else(|| std::env::var("DBSYNC_CONFIG").ok());
        let path = explicit
            .clone()
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

        if explicit.is_some() && !Path::new(&path).exists() {
            return Err(DbsyncError::Config(format!("config file {path} not found")));
        }

        let figment = if path.ends_with(".json") {
            Figment::new().merge(Json::file(&path))
        } else {
            Figment::new().merge(Toml::file(&path))
        };

        let config: DbsyncConfig = figment
            .merge(Env::prefixed("DBSYNC_").split("__"))
            .extract()
            .map_err(|e| DbsyncError::Config(e.to_string()))?;

        config.validate()?;
        tracing::debug!(path = %path, jobs = config.jobs.len(), "config loaded");
        Ok(config)
    }

    /// Reject anything that would only fail later inside the remote store.
    pub fn validate(&self) -> Result<()> {
        self.source_endpoint().authenticated_url()?;
        self.target_endpoint().authenticated_url()?;

        if self.time_interval_minutes == 0 {
            return Err(DbsyncError::Config(
                "time_interval_minutes must be greater than zero".into(),
            ));
        }
        if self.time_interval_minutes > MAX_INTERVAL_MINUTES {
            return Err(DbsyncError::Config(format!(
                "time_interval_minutes must be at most {MAX_INTERVAL_MINUTES}"
            )));
        }
        if self.gate.initial_delay_ms == 0 {
            return Err(DbsyncError::Config(
                "gate.initial_delay_ms must be greater than zero".into(),
            ));
        }

        let mut seen = HashSet::new();
        for job in &self.jobs {
            if job.database.trim().is_empty() {
                return Err(DbsyncError::Config("job with empty database name".into()));
            }
            if !seen.insert(job.database.as_str()) {
                return Err(DbsyncError::Config(format!(
                    "database {} is listed more than once",
                    job.database
                )));
            }
            if !job.id_selector.is_empty() {
                regex::Regex::new(&job.id_selector).map_err(|e| {
                    DbsyncError::Config(format!(
                        "id_selector for {} is not a valid regex: {e}",
                        job.database
                    ))
                })?;
            }
        }

        if self.jobs.is_empty() {
            tracing::warn!("no replication jobs configured");
        }
        Ok(())
    }

    pub fn source_endpoint(&self) -> Endpoint {
        Endpoint::from(&self.source)
    }

    pub fn target_endpoint(&self) -> Endpoint {
        Endpoint::from(&self.target)
    }

    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.iter().map(Job::from).collect()
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.time_interval_minutes.saturating_mul(60))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp(suffix: &str, body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(body.as_bytes()).unwrap();
        file
    }

    const TOML_CONFIG: &str = r#"
time_interval_minutes = 2

[source]
address = "http://source:5984"
username = "admin"
password = "secret"

[target]
address = "http://target:5984"
username = "admin"
password = "secret"

[[jobs]]
database = "rooms"
continuous = true

[[jobs]]
database = "devices"
id_selector = "BLDG-ROOM"
"#;

    #[test]
    fn loads_toml_with_defaults() {
        let file = write_temp(".toml", TOML_CONFIG);
        let config = DbsyncConfig::load(Some(file.path().to_str().unwrap())).unwrap();

        assert_eq!(config.interval(), Duration::from_secs(120));
        assert_eq!(config.gateway.port, DEFAULT_PORT);
        assert_eq!(config.max_conflict_retries, DEFAULT_MAX_CONFLICT_RETRIES);
        assert_eq!(config.http.request_timeout(), Duration::from_secs(30));
        assert!(config.gate.max_wait_secs.is_none());

        let jobs = config.jobs();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0], Job::new("rooms", true, ""));
        assert_eq!(jobs[1], Job::new("devices", false, "BLDG-ROOM"));
    }

    #[test]
    fn loads_json_with_camel_case_keys() {
        let file = write_temp(
            ".json",
            r#"{
                "source": {"address": "http://a:5984", "username": "u", "password": "p"},
                "target": {"address": "http://b:5984", "username": "u", "password": "p"},
                "jobs": [{"database": "rooms", "continuous": true, "idSelector": "ITB-.*"}],
                "timeInterval": 10
            }"#,
        );
        let config = DbsyncConfig::load(Some(file.path().to_str().unwrap())).unwrap();

        assert_eq!(config.time_interval_minutes, 10);
        assert_eq!(config.jobs()[0].id_selector, "ITB-.*");
        assert_eq!(config.target_endpoint().base_url(), "http://b:5984");
    }

    #[test]
    fn missing_explicit_file_is_config_error() {
        let err = DbsyncConfig::load(Some("/nonexistent/dbsync.toml")).unwrap_err();
        assert!(matches!(err, DbsyncError::Config(_)));
    }

    #[test]
    fn rejects_bad_selector_and_duplicates() {
        let file = write_temp(
            ".toml",
            &TOML_CONFIG.replace("BLDG-ROOM", "BLDG-(ROOM"),
        );
        let err = DbsyncConfig::load(Some(file.path().to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("devices"));

        let file = write_temp(".toml", &TOML_CONFIG.replace("devices", "rooms"));
        let err = DbsyncConfig::load(Some(file.path().to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }

    #[test]
    fn rejects_endpoint_without_scheme() {
        let file = write_temp(
            ".toml",
            &TOML_CONFIG.replace("http://target:5984", "target:5984"),
        );
        let err = DbsyncConfig::load(Some(file.path().to_str().unwrap())).unwrap_err();
        assert!(matches!(err, DbsyncError::Config(_)));
    }

    #[test]
    fn rejects_zero_interval() {
        let file = write_temp(
            ".toml",
            &TOML_CONFIG.replace("time_interval_minutes = 2", "time_interval_minutes = 0"),
        );
        assert!(DbsyncConfig::load(Some(file.path().to_str().unwrap())).is_err());
    }

    #[test]
    fn rejects_interval_beyond_one_year() {
        let file = write_temp(
            ".toml",
            &TOML_CONFIG.replace(
                "time_interval_minutes = 2",
                "time_interval_minutes = 9223372036854775807",
            ),
        );
        let err = DbsyncConfig::load(Some(file.path().to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("time_interval_minutes"));

        let file = write_temp(
            ".toml",
            &TOML_CONFIG.replace(
                "time_interval_minutes = 2",
                &format!("time_interval_minutes = {MAX_INTERVAL_MINUTES}"),
            ),
        );
        let config = DbsyncConfig::load(Some(file.path().to_str().unwrap())).unwrap();
        assert_eq!(
            config.interval(),
            Duration::from_secs(MAX_INTERVAL_MINUTES * 60)
        );
    }

    #[test]
    fn rejects_zero_gate_delay() {
        let file = write_temp(
            ".toml",
            &format!("{TOML_CONFIG}\n[gate]\ninitial_delay_ms = 0\n"),
        );
        let err = DbsyncConfig::load(Some(file.path().to_str().unwrap())).unwrap_err();
        assert!(err.to_string().contains("initial_delay_ms"));
    }
}
