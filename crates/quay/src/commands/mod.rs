//! CLI command handlers.

pub mod config;
pub mod start;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use quay_config::LoadedConfig;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Explicit config file, bypassing discovery.
    pub config_path: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load the effective configuration.
    ///
    /// An explicit `--config` path must exist and parse; discovered files
    /// are optional.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        match &self.config_path {
            Some(path) => LoadedConfig::from_file(path)
                .with_context(|| format!("loading {}", path.display())),
            None => Ok(quay_config::load_config(None)?),
        }
    }
}
