//! `dbsync-couch`: the document-store side of replication orchestration.
//!
//! | Module     | Contents                                              |
//! |------------|-------------------------------------------------------|
//! | `document` | `_replicator` task document and its builder           |
//! | `response` | status/sentinel classification, [`TaskState`]         |
//! | `store`    | [`TaskStore`] and [`Probe`] seams                     |
//! | `client`   | reqwest implementations: [`CouchClient`], [`HttpProbe`] |

pub mod client;
pub mod document;
pub mod response;
pub mod store;

pub use client::{CouchClient, HttpProbe};
pub use document::{build, TaskDocument};
pub use response::TaskState;
pub use store::{PostOutcome, Probe, StoredTask, TaskStore};
