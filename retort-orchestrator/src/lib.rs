//! Retort Orchestrator
//!
//! Owns the job queue and everything around it:
//! - `repository`: SQLite job store and environment registry
//! - `service`: the scheduler, startup recovery, event sinks and environment checks
//! - `api`: the HTTP surface served by the `retort-orchestrator` binary

pub mod api;
pub mod config;
pub mod db;
pub mod repository;
pub mod service;
