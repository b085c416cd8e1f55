//! Retort Core
//!
//! Core types shared by every Retort crate.
//!
//! This crate contains:
//! - Domain types: jobs and their state machine, analysis environments,
//!   queue control state
//! - DTOs: request/response payloads and lifecycle events exchanged between
//!   the orchestrator, its HTTP API and its clients

pub mod domain;
pub mod dto;
