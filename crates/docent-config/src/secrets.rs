//! API key resolution for LLM backends and search providers.
//!
//! Resolution order:
//! 1. Environment variable
//! 2. Config file (with a load-time warning)

use crate::{Backend, SearchConfig};

/// Result of API key resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Resolve an API key for an LLM backend.
pub fn resolve_api_key(backend: &Backend, config_value: Option<&str>) -> Option<ResolvedSecret> {
    resolve_secret(Some(backend.env_var()), config_value)
}

/// Resolve the API key for the configured search provider.
pub fn resolve_search_key(search: &SearchConfig) -> Option<ResolvedSecret> {
    resolve_secret(search.provider.env_var(), search.api_key.as_deref())
}

fn resolve_secret(env_var: Option<&str>, config_value: Option<&str>) -> Option<ResolvedSecret> {
    if let Some(var) = env_var
        && let Ok(value) = std::env::var(var)
        && !value.is_empty()
    {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(var.to_string()),
        });
    }

    config_value
        .filter(|v| !v.is_empty())
        .map(|v| ResolvedSecret {
            value: v.to_string(),
            source: SecretSource::ConfigFile,
        })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
