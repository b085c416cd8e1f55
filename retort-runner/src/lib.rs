//! Retort Runner
//!
//! Interpreter backends that execute one job's script or program as a child
//! process, streaming each output line back to the caller as it is produced.
//!
//! - [`backend::python::PythonRunner`]: `python <script> args...`
//! - [`backend::r::RRunner`]: `Rscript <script> args...` with optional `R_LIBS`
//! - [`backend::direct::DirectRunner`]: runs a program directly
//!
//! Runners are grouped in a [`RunnerSet`] and selected by the job command.

pub mod backend;
pub mod config;
pub mod error;
pub mod process;
pub mod registry;

pub use backend::{Invocation, Runner};
pub use config::RunnerConfig;
pub use error::RunnerError;
pub use registry::{RunnerKind, RunnerSet};
