//! Runner selection
//!
//! Maps a job command to the backend that executes it. Any backend may be
//! absent; jobs routed to a missing backend fail instead of running.

use std::sync::Arc;

use crate::backend::Runner;
use crate::backend::direct::DirectRunner;
use crate::backend::python::PythonRunner;
use crate::backend::r::RRunner;
use crate::config::RunnerConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunnerKind {
    Python,
    R,
    Direct,
}

impl RunnerKind {
    /// `r` and `direct` select their backends; every other command runs Python
    pub fn for_command(command: &str) -> Self {
        match command {
            "r" => RunnerKind::R,
            "direct" => RunnerKind::Direct,
            _ => RunnerKind::Python,
        }
    }

    /// Error recorded on a job routed to an absent backend
    pub fn missing_message(&self) -> &'static str {
        match self {
            RunnerKind::Python => "Python runner not initialized",
            RunnerKind::R => "R runner not initialized",
            RunnerKind::Direct => "Direct runner not initialized",
        }
    }
}

/// The backends available to the scheduler
#[derive(Clone, Default)]
pub struct RunnerSet {
    python: Option<Arc<dyn Runner>>,
    r: Option<Arc<dyn Runner>>,
    direct: Option<Arc<dyn Runner>>,
}

impl RunnerSet {
    /// No backends at all
    pub fn empty() -> Self {
        Self::default()
    }

    /// All three process backends
    pub fn from_config(config: &RunnerConfig) -> Self {
        Self::empty()
            .with(RunnerKind::Python, Arc::new(PythonRunner::from_config(config)))
            .with(RunnerKind::R, Arc::new(RRunner::from_config(config)))
            .with(RunnerKind::Direct, Arc::new(DirectRunner::from_config(config)))
    }

    pub fn with(mut self, kind: RunnerKind, runner: Arc<dyn Runner>) -> Self {
        *self.slot(kind) = Some(runner);
        self
    }

    pub fn get(&self, kind: RunnerKind) -> Option<Arc<dyn Runner>> {
        match kind {
            RunnerKind::Python => self.python.clone(),
            RunnerKind::R => self.r.clone(),
            RunnerKind::Direct => self.direct.clone(),
        }
    }

    fn slot(&mut self, kind: RunnerKind) -> &mut Option<Arc<dyn Runner>> {
        match kind {
            RunnerKind::Python => &mut self.python,
            RunnerKind::R => &mut self.r,
            RunnerKind::Direct => &mut self.direct,
        }
    }
}
