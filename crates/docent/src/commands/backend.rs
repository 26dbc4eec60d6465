//! Builds model and search backends from resolved configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use docent_config::{Backend, DocentConfig, ModelRole, ResolvedLlm, secrets};
use docent_llm::{OpenAiConfig, SharedBackend, create_shared_backend};
use docent_research::{Models, RoleModel, SharedSearch, WebSearch};

/// Map a resolved profile onto an OpenAI-compatible backend config.
pub fn openai_config(resolved: &ResolvedLlm) -> Result<OpenAiConfig> {
    let key = resolved.api_key.clone();
    let keyed = !matches!(resolved.backend, Backend::Ollama | Backend::Custom);
    if keyed && key.is_none() {
        bail!(
            "No API key for {} (resolved via {}). Set {}.",
            resolved.backend,
            resolved.resolved_from,
            resolved.backend.env_var()
        );
    }

    let mut config = match resolved.backend {
        Backend::Openai => OpenAiConfig::openai(key.unwrap_or_default()),
        Backend::Gemini => OpenAiConfig::gemini(key.unwrap_or_default()),
        Backend::Groq => OpenAiConfig::groq(key.unwrap_or_default()),
        Backend::Ollama => {
            let mut config = OpenAiConfig::ollama();
            config.api_key = key;
            config
        }
        Backend::Custom => {
            let Some(ref base_url) = resolved.base_url else {
                bail!(
                    "Custom backend needs base_url (resolved via {})",
                    resolved.resolved_from
                );
            };
            let mut config = OpenAiConfig::openai(String::new())
                .with_name("custom")
                .with_base_url(base_url.clone());
            config.api_key = key;
            config
        }
    };

    if let Some(ref url) = resolved.base_url {
        config = config.with_base_url(url.clone());
    }
    if let Some(retries) = resolved.retry_max {
        config = config.with_max_retries(retries);
    }
    if let Some(ms) = resolved.retry_backoff_ms {
        config.retry_backoff = Duration::from_millis(ms);
    }

    Ok(config.with_model(resolved.model.clone()))
}

/// Resolve one role and wrap its backend in a [`RoleModel`].
pub fn role_model(config: &DocentConfig, role: ModelRole) -> Result<RoleModel> {
    let resolved = docent_config::resolve_for_role(config, role)
        .with_context(|| format!("Resolving the {} model", role))?;
    tracing::debug!(
        %role,
        backend = %resolved.backend,
        model = %resolved.model,
        from = %resolved.resolved_from,
        "Model resolved"
    );

    let backend: SharedBackend = create_shared_backend(openai_config(&resolved)?)?;
    Ok(RoleModel::new(backend, resolved.model, role)
        .with_thoughts(config.research().include_thoughts))
}

/// Worker and critic models for a run.
pub fn models(config: &DocentConfig) -> Result<Models> {
    Ok(Models::new(
        role_model(config, ModelRole::Worker)?,
        role_model(config, ModelRole::Critic)?,
    ))
}

/// The configured web search provider.
pub fn search(config: &DocentConfig) -> Result<SharedSearch> {
    let search = config.search();
    let key = secrets::resolve_search_key(&search).map(|s| s.value);
    let web: SharedSearch = Arc::new(WebSearch::new(&search, key)?);
    Ok(web)
}
