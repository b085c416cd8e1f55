//! Runner configuration
//!
//! Interpreter defaults and the directories relative script and program
//! names are resolved against.

use std::path::PathBuf;

/// Runner configuration
///
/// The interpreter paths are only fallbacks: a job pinned to a registered
/// environment runs with that environment's interpreter instead.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Default Python interpreter
    pub python_path: String,

    /// Default `Rscript` executable
    pub rscript_path: String,

    /// Exported as `R_LIBS` to R scripts when set
    pub r_libs: Option<String>,

    /// Directory relative Python script names are resolved against
    pub python_script_dir: PathBuf,

    /// Directory relative R script names are resolved against
    pub r_script_dir: PathBuf,

    /// Fallback directory for programs run by the direct runner
    pub bin_dir: PathBuf,
}

impl RunnerConfig {
    /// Creates a new configuration with defaults
    pub fn new() -> Self {
        Self {
            python_path: "python3".to_string(),
            rscript_path: "Rscript".to_string(),
            r_libs: None,
            python_script_dir: PathBuf::from("scripts/python"),
            r_script_dir: PathBuf::from("scripts/r"),
            bin_dir: PathBuf::from("bin/external"),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - RETORT_PYTHON_PATH (default: python3)
    /// - RETORT_RSCRIPT_PATH (default: Rscript)
    /// - RETORT_R_LIBS
    /// - RETORT_PYTHON_SCRIPTS (default: scripts/python)
    /// - RETORT_R_SCRIPTS (default: scripts/r)
    /// - RETORT_BIN_DIR (default: bin/external)
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::new();

        let config = Self {
            python_path: std::env::var("RETORT_PYTHON_PATH").unwrap_or(defaults.python_path),
            rscript_path: std::env::var("RETORT_RSCRIPT_PATH").unwrap_or(defaults.rscript_path),
            r_libs: std::env::var("RETORT_R_LIBS").ok().filter(|s| !s.is_empty()),
            python_script_dir: std::env::var("RETORT_PYTHON_SCRIPTS")
                .map(PathBuf::from)
                .unwrap_or(defaults.python_script_dir),
            r_script_dir: std::env::var("RETORT_R_SCRIPTS")
                .map(PathBuf::from)
                .unwrap_or(defaults.r_script_dir),
            bin_dir: std::env::var("RETORT_BIN_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.bin_dir),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.python_path.is_empty() {
            anyhow::bail!("python_path cannot be empty");
        }

        if self.rscript_path.is_empty() {
            anyhow::bail!("rscript_path cannot be empty");
        }

        Ok(())
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self::new()
    }
}
