//! Persistent dedup store (SQLite via sqlx).
//!
//! Maps (sink, canonical video) to the last known outcome so repeated
//! requests can be short-circuited across restarts.

pub mod db;
pub mod records;
pub mod types;

pub use db::DedupDb;
pub use types::*;
