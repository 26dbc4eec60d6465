//! CLI command handlers.

use std::path::PathBuf;

use docent_config::LoadedConfig;

pub mod backend;
pub mod config;
pub mod planning;
pub mod research;

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
    /// User config directory override.
    pub config_dir: Option<PathBuf>,
}

impl Context {
    /// Discover and merge config layers for this invocation.
    pub fn load_config(&self) -> docent_config::Result<LoadedConfig> {
        docent_config::load_config_with_options(None, self.config_dir.as_deref())
    }

    /// The user config directory in effect.
    pub fn user_config_dir(&self) -> Option<PathBuf> {
        self.config_dir
            .clone()
            .or_else(docent_config::user_config_dir)
    }
}
