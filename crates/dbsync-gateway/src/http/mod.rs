pub mod health;
pub mod replication;
