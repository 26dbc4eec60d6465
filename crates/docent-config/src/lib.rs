//! Configuration system for the Docent research assistant.
//!
//! Provides TOML-based configuration with:
//! - Named LLM configurations (`[llm]`, `[llm.critic]`, `[llm.fast]`, etc.)
//! - Per-role model binding (`research.worker_llm`, `research.critic_llm`)
//!   with fallback to the default `[llm]`
//! - Config file layering (user config dir + project-local `docent.toml`)
//! - API key resolution (env var → config file)
//! - Research loop, search provider and logging settings

pub mod discovery;
pub mod error;
pub mod resolver;
pub mod secrets;
pub mod types;

pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_with_options, save_config,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use resolver::{ResolvedFrom, ResolvedLlm, resolve_all_profiles, resolve_for_role};
pub use secrets::{ResolvedSecret, SecretSource};
pub use types::*;
