//! `dbsync-scheduler`: drives replication task lifecycle on an interval.
//!
//! # Overview
//!
//! The [`engine::Replicator`] waits at the connection gate until source and
//! target have both answered, then runs every job once per interval. Each job
//! goes through the [`runner::JobRunner`] state machine: check the task's
//! scheduler state, skip if active, otherwise post a fresh task document and
//! clear any conflicting one first.
//!
//! Task state is never cached locally; the target's `_replicator` database is
//! the only record of what is already replicating.

pub mod engine;
pub mod gate;
pub mod report;
pub mod runner;

#[cfg(test)]
mod fakes;

pub use engine::{Replicator, Settings};
pub use gate::Backoff;
pub use report::{RunReport, RunSummary};
pub use runner::{JobOutcome, JobRunner};
