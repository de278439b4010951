//! Startup barrier: hold the interval loop until both endpoints have
//! answered a probe at least once.

use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use dbsync_core::config::GateConfig;
use dbsync_core::{DbsyncError, Endpoint, Result};
use dbsync_couch::Probe;

/// Shortest pause between probe rounds, whatever the configuration says.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Delay between probe rounds: doubles from `initial` up to `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    pub initial: Duration,
    pub max: Duration,
    /// `None` waits until shutdown.
    pub max_wait: Option<Duration>,
}

impl Default for Backoff {
    fn default() -> Self {
        Backoff::from(&GateConfig::default())
    }
}

impl From<&GateConfig> for Backoff {
    fn from(c: &GateConfig) -> Self {
        Self {
            initial: Duration::from_millis(c.initial_delay_ms).max(MIN_DELAY),
            max: Duration::from_millis(c.max_delay_ms.max(c.initial_delay_ms)).max(MIN_DELAY),
            max_wait: c.max_wait_secs.map(Duration::from_secs),
        }
    }
}

impl Backoff {
    fn first(&self) -> Duration {
        self.initial.max(MIN_DELAY)
    }

    fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max).max(MIN_DELAY)
    }
}

async fn probe_once(probe: &dyn Probe, role: &str, endpoint: &Endpoint) -> bool {
    match probe.check_reachable(endpoint).await {
        Ok(true) => {
            info!(endpoint = role, address = %endpoint.base_url(), "database reachable");
            true
        }
        Ok(false) => {
            warn!(endpoint = role, "waiting for {role} database to start...");
            false
        }
        Err(e) => {
            warn!(endpoint = role, error = %e, "waiting for {role} database to start...");
            false
        }
    }
}

/// Probe `source` and `target` until each has answered once.
///
/// Returns [`DbsyncError::GateTimeout`] once `backoff.max_wait` has elapsed
/// and [`DbsyncError::Shutdown`] when `shutdown` flips to `true` (or its
/// sender goes away) while waiting.
pub async fn wait_until_reachable(
    probe: &dyn Probe,
    source: &Endpoint,
    target: &Endpoint,
    backoff: Backoff,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<()> {
    info!("checking database accessibility...");
    let started = Instant::now();
    let mut delay = backoff.first();
    let mut source_ok = false;
    let mut target_ok = false;

    loop {
        if *shutdown.borrow() {
            return Err(DbsyncError::Shutdown);
        }

        if !source_ok {
            source_ok = probe_once(probe, "source", source).await;
        }
        if !target_ok {
            target_ok = probe_once(probe, "target", target).await;
        }
        if source_ok && target_ok {
            info!(waited_ms = started.elapsed().as_millis() as u64, "source and target reachable");
            return Ok(());
        }

        let waited = started.elapsed();
        if let Some(max_wait) = backoff.max_wait {
            if waited >= max_wait {
                return Err(DbsyncError::GateTimeout {
                    waited_secs: waited.as_secs(),
                });
            }
        }

        debug!(delay_ms = delay.as_millis() as u64, "retrying endpoint probes");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    return Err(DbsyncError::Shutdown);
                }
            }
        }
        delay = backoff.next(delay);
    }
}
