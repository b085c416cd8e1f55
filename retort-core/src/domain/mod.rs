//! Core domain types
//!
//! This module contains the core domain structures used across Retort crates.
//! The orchestrator persists and mutates them, the runner crate reads the
//! execution-relevant parts, and clients receive them over the API.

pub mod environment;
pub mod job;
pub mod queue;
