use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, info_span, warn, Instrument, Span};
use uuid::Uuid;

use dbsync_core::config::{DbsyncConfig, DEFAULT_INTERVAL_MINUTES, DEFAULT_MAX_CONFLICT_RETRIES};
use dbsync_core::{DbsyncError, Endpoint, Job, Result};
use dbsync_couch::{Probe, TaskStore};

use crate::gate::{wait_until_reachable, Backoff};
use crate::report::{JobReport, RunReport};
use crate::runner::JobRunner;

/// Tunables for the orchestrator loop.
#[derive(Debug, Clone)]
pub struct Settings {
    pub interval: Duration,
    pub backoff: Backoff,
    pub max_conflict_retries: u32,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(DEFAULT_INTERVAL_MINUTES * 60),
            backoff: Backoff::default(),
            max_conflict_retries: DEFAULT_MAX_CONFLICT_RETRIES,
        }
    }
}

impl From<&DbsyncConfig> for Settings {
    fn from(c: &DbsyncConfig) -> Self {
        Self {
            interval: c.interval(),
            backoff: Backoff::from(&c.gate),
            max_conflict_retries: c.max_conflict_retries,
        }
    }
}

struct Inner {
    source: Endpoint,
    target: Endpoint,
    jobs: Vec<Job>,
    settings: Settings,
    store: Arc<dyn TaskStore>,
    probe: Arc<dyn Probe>,
    ready: AtomicBool,
    /// Parent span for everything this orchestrator logs.
    span: Span,
}

/// Keeps every configured database replicating from source to target.
///
/// Cheap to clone; clones share jobs, endpoints and the task store, so the
/// manual trigger and the interval loop can run passes side by side. Overlap
/// is safe: a second pass that loses the race sees a `conflict` and takes the
/// delete-and-repost path.
#[derive(Clone)]
pub struct Replicator {
    inner: Arc<Inner>,
}

impl Replicator {
    /// Fails with a config error if either endpoint cannot yield an
    /// authenticated URL.
    pub fn new(
        source: Endpoint,
        target: Endpoint,
        jobs: Vec<Job>,
        settings: Settings,
        store: Arc<dyn TaskStore>,
        probe: Arc<dyn Probe>,
    ) -> Result<Self> {
        source.authenticated_url()?;
        target.authenticated_url()?;

        let span = info_span!("replicator", source = %source.base_url(), target = %target.base_url());
        Ok(Self {
            inner: Arc::new(Inner {
                source,
                target,
                jobs,
                settings,
                store,
                probe,
                ready: AtomicBool::new(false),
                span,
            }),
        })
    }

    pub fn from_config(
        config: &DbsyncConfig,
        store: Arc<dyn TaskStore>,
        probe: Arc<dyn Probe>,
    ) -> Result<Self> {
        Self::new(
            config.source_endpoint(),
            config.target_endpoint(),
            config.jobs(),
            Settings::from(config),
            store,
            probe,
        )
    }

    pub fn jobs(&self) -> &[Job] {
        &self.inner.jobs
    }

    pub fn interval(&self) -> Duration {
        self.inner.settings.interval
    }

    /// True once the connection gate has seen both endpoints.
    pub fn is_ready(&self) -> bool {
        self.inner.ready.load(Ordering::Acquire)
    }

    /// Block until source and target have each answered a probe.
    pub async fn connection_gate(&self, shutdown: &mut watch::Receiver<bool>) -> Result<()> {
        let inner = &self.inner;
        wait_until_reachable(
            inner.probe.as_ref(),
            &inner.source,
            &inner.target,
            inner.settings.backoff,
            shutdown,
        )
        .instrument(inner.span.clone())
        .await?;
        inner.ready.store(true, Ordering::Release);
        Ok(())
    }

    /// Run every job once, concurrently. A failing job never stops the others.
    pub async fn run_all(&self) -> RunReport {
        let inner = &self.inner;
        let run_id = Uuid::new_v4();
        let span = info_span!(parent: &inner.span, "run", %run_id);
        let started_at = Utc::now();

        let runner = JobRunner::new(
            inner.store.as_ref(),
            &inner.source,
            &inner.target,
            inner.settings.max_conflict_retries,
        );

        let passes = inner.jobs.iter().map(|job| {
            let runner = &runner;
            let job_span = info_span!(parent: &span, "job", database = %job.database);
            async move {
                let result = runner.run(job).await;
                if let Err(e) = &result {
                    error!(code = e.code(), error = %e, "database replication failed to start");
                }
                JobReport {
                    database: job.database.clone(),
                    result,
                }
            }
            .instrument(job_span)
        });
        let jobs = join_all(passes).await;

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            jobs,
        };
        span.in_scope(|| {
            info!(
                total = report.jobs.len(),
                created = report.created(),
                skipped = report.skipped(),
                failed = report.failed().len(),
                "replication pass finished"
            )
        });
        report
    }

    /// Start one pass in the background. Drop the handle for fire-and-forget.
    pub fn trigger(&self) -> JoinHandle<RunReport> {
        let this = self.clone();
        self.inner.span.in_scope(|| info!("manual replication triggered"));
        tokio::spawn(async move { this.run_all().await })
    }

    /// Gate, then `run_all` every interval until `shutdown` flips to `true`.
    ///
    /// Failed jobs are logged and retried next interval; they never end the
    /// loop. Returns `Err` only when the gate gives up.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let span = self.inner.span.clone();
        async move {
            let interval = self.interval();
            info!(
                interval_min = interval.as_secs() / 60,
                jobs = self.inner.jobs.len(),
                "starting replication cycle"
            );

            match self.connection_gate(&mut shutdown).await {
                Err(DbsyncError::Shutdown) => {
                    info!("shutdown before endpoints became reachable");
                    return Ok(());
                }
                other => other?,
            }

            loop {
                if let Err(e) = self.run_all().await.into_result() {
                    warn!(error = %e, "replication pass incomplete, retrying next interval");
                }

                debug!(interval_min = interval.as_secs() / 60, "waiting");
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() || *shutdown.borrow() {
                            info!("replication loop shutting down");
                            return Ok(());
                        }
                    }
                }
            }
        }
        .instrument(span)
        .await
    }
}
