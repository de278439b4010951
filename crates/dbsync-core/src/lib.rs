//! `dbsync-core`: configuration, error taxonomy and the value types shared
//! by the replication crates.

pub mod config;
pub mod error;
pub mod types;

pub use config::DbsyncConfig;
pub use error::{DbsyncError, Result};
pub use types::{Endpoint, Job};
