pub mod config;
pub mod logging;

pub mod access;
pub mod command;
pub mod cookies;
pub mod dedup_db;
pub mod error;
pub mod fetcher;
pub mod job;
pub mod orchestrator;
pub mod queue;
pub mod sink;
pub mod source_id;
pub mod splitter;
