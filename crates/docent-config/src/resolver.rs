//! LLM config resolution: turns role bindings into concrete backend configs.
//!
//! Takes a [`DocentConfig`] and resolves a fully-qualified [`ResolvedLlm`] for
//! a model role, handling the default fallback and API key lookup.

use crate::secrets::{self, SecretSource};
use crate::{Backend, ConfigError, DocentConfig, LlmConfig, ModelRole, Result};

/// A fully resolved LLM configuration ready to construct a backend.
#[derive(Debug, Clone)]
pub struct ResolvedLlm {
    /// The backend provider.
    pub backend: Backend,
    /// Model identifier.
    pub model: String,
    /// API base URL (if custom).
    pub base_url: Option<String>,
    /// Resolved API key.
    pub api_key: Option<String>,
    /// Where the API key was resolved from.
    pub api_key_source: Option<SecretSource>,
    /// How the config was resolved.
    pub resolved_from: ResolvedFrom,
    /// Maximum retry attempts for failed requests.
    pub retry_max: Option<u32>,
    /// Backoff delay between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
}

/// Tracks how the LLM config was resolved for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedFrom {
    /// Resolved from a role binding (`research.<role>_llm`).
    RoleProfile { role: ModelRole, profile: String },
    /// Resolved from global default (`[llm]`).
    GlobalDefault,
}

impl std::fmt::Display for ResolvedFrom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResolvedFrom::RoleProfile { role, profile } => {
                write!(f, "{} -> llm.{}", role.config_key(), profile)
            }
            ResolvedFrom::GlobalDefault => write!(f, "[llm] (global default)"),
        }
    }
}

/// Resolve the LLM config for a model role.
///
/// 1. Resolve which `LlmConfig` applies (role binding → global)
/// 2. Validate required fields (backend, model)
/// 3. Resolve API key (env var → config file)
pub fn resolve_for_role(config: &DocentConfig, role: ModelRole) -> Result<ResolvedLlm> {
    let (llm_config, resolved_from) = resolve_llm_config(config, role)?;

    let backend = llm_config
        .backend
        .ok_or_else(|| ConfigError::MissingField {
            field: "backend".to_string(),
            context: format!("LLM config (resolved via {})", resolved_from),
        })?;

    let model = llm_config
        .model
        .clone()
        .ok_or_else(|| ConfigError::MissingField {
            field: "model".to_string(),
            context: format!("LLM config (resolved via {})", resolved_from),
        })?;

    let (api_key, api_key_source) =
        match secrets::resolve_api_key(&backend, llm_config.api_key.as_deref()) {
            Some(s) => (Some(s.value), Some(s.source)),
            None => (None, None),
        };

    Ok(ResolvedLlm {
        backend,
        model,
        base_url: llm_config.base_url.clone(),
        api_key,
        api_key_source,
        resolved_from,
        retry_max: llm_config.retry_max,
        retry_backoff_ms: llm_config.retry_backoff_ms,
    })
}

/// Resolve all named LLM configs into a summary for diagnostics.
pub fn resolve_all_profiles(config: &DocentConfig) -> Vec<(String, Backend, String)> {
    let mut profiles = Vec::new();

    if let Some(ref llm) = config.llm
        && let (Some(backend), Some(model)) = (llm.backend, &llm.model)
    {
        profiles.push(("default".to_string(), backend, model.clone()));
    }

    for (name, llm) in &config.llm_profiles {
        if let (Some(backend), Some(model)) = (llm.backend, &llm.model) {
            profiles.push((name.clone(), backend, model.clone()));
        }
    }

    profiles.sort_by(|a, b| a.0.cmp(&b.0));
    profiles
}

fn resolve_llm_config(
    config: &DocentConfig,
    role: ModelRole,
) -> Result<(&LlmConfig, ResolvedFrom)> {
    let llm = config.resolve_llm(role)?;
    let resolved_from = match config.research.as_ref().and_then(|r| r.profile_for(role)) {
        Some(profile) => ResolvedFrom::RoleProfile {
            role,
            profile: profile.to_string(),
        },
        None => ResolvedFrom::GlobalDefault,
    };
    Ok((llm, resolved_from))
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
