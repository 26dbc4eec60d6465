//! Configuration types mapping to the TOML schema.
//!
//! Top-level config:
//! ```toml
//! [llm]                    # default LLM
//! [llm.critic]             # named LLM configs
//! [research]               # loop budget, model roles, site scope
//! [search]                 # web search provider
//! [logging]                # log file directory
//! ```

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Documentation site searched when none is configured.
pub const DEFAULT_DOCUMENTATION_SITE: &str =
    "https://google.github.io/adk-docs/api-reference/python/";

/// Phrases that count as explicit approval of a research plan.
pub const DEFAULT_APPROVAL_PHRASES: &[&str] = &[
    "looks good",
    "run it",
    "approved",
    "approve",
    "go ahead",
    "proceed",
    "start the research",
    "execute the plan",
];

// ─────────────────────────────────────────────────────────────────────────────
// Top-level Config
// ─────────────────────────────────────────────────────────────────────────────

/// Root configuration structure.
///
/// Maps to the full TOML config file. All sections are optional so that
/// partial configs (e.g., project-local overrides) can be loaded and merged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DocentConfig {
    /// Default LLM configuration (the bare `[llm]` section).
    pub llm: Option<LlmConfig>,

    /// Named LLM configurations (`[llm.critic]`, `[llm.fast]`, etc.).
    #[serde(default, rename = "llm_profiles")]
    pub llm_profiles: HashMap<String, LlmConfig>,

    /// Research pipeline settings.
    pub research: Option<ResearchConfig>,

    /// Web search settings.
    pub search: Option<SearchConfig>,

    /// Log file settings.
    pub logging: Option<LoggingConfig>,
}

impl DocentConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse from a TOML string.
    pub fn from_toml(toml_str: &str) -> crate::Result<Self> {
        let raw: RawConfig = toml::from_str(toml_str)?;
        Ok(raw.into())
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> crate::Result<String> {
        let raw: RawConfig = self.clone().into();
        Ok(toml::to_string_pretty(&raw)?)
    }

    /// Merge another config on top of this one (other takes priority).
    pub fn merge(&mut self, other: DocentConfig) {
        if other.llm.is_some() {
            self.llm = other.llm;
        }

        for (name, config) in other.llm_profiles {
            self.llm_profiles.insert(name, config);
        }

        if other.research.is_some() {
            self.research = other.research;
        }

        if other.search.is_some() {
            self.search = other.search;
        }

        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Research settings, or the defaults when the section is absent.
    pub fn research(&self) -> ResearchConfig {
        self.research.clone().unwrap_or_default()
    }

    /// Search settings, or the defaults when the section is absent.
    pub fn search(&self) -> SearchConfig {
        self.search.clone().unwrap_or_default()
    }

    /// Check value ranges that TOML typing alone cannot express.
    pub fn validate(&self) -> crate::Result<()> {
        if let Some(ref research) = self.research {
            research.validate()?;
        }
        if let Some(ref search) = self.search
            && search.max_results == 0
        {
            return Err(crate::ConfigError::invalid(
                "search.max_results",
                "must be at least 1",
            ));
        }
        Ok(())
    }

    /// Resolve the LLM config for a model role.
    ///
    /// Resolution order:
    /// 1. `research.<role>_llm` → lookup in `llm_profiles`
    /// 2. `[llm]` (global default)
    pub fn resolve_llm(&self, role: ModelRole) -> crate::Result<&LlmConfig> {
        if let Some(name) = self.research.as_ref().and_then(|r| r.profile_for(role)) {
            return self.lookup_llm(name, role.config_key());
        }

        self.llm.as_ref().ok_or(crate::ConfigError::NoDefaultLlm)
    }

    /// Look up a named LLM config.
    pub(crate) fn lookup_llm<'a>(
        &'a self,
        name: &str,
        context: &str,
    ) -> crate::Result<&'a LlmConfig> {
        self.llm_profiles
            .get(name)
            .ok_or_else(|| crate::ConfigError::LlmNotFound {
                name: name.to_string(),
                context: context.to_string(),
            })
    }

    /// Get all defined LLM config names (including "default" for the bare [llm]).
    pub fn llm_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        if self.llm.is_some() {
            names.push("default".to_string());
        }
        names.extend(self.llm_profiles.keys().cloned());
        names.sort();
        names
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Raw TOML structure (for serde)
// ─────────────────────────────────────────────────────────────────────────────

/// Internal raw config matching the actual TOML layout.
///
/// In TOML, `[llm]` and `[llm.critic]` coexist as a table with both
/// direct keys and sub-tables. This struct handles that mapping.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawConfig {
    llm: Option<RawLlmSection>,
    research: Option<ResearchConfig>,
    search: Option<SearchConfig>,
    logging: Option<LoggingConfig>,
}

/// The `[llm]` section which can contain both direct fields and named sub-tables.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct RawLlmSection {
    backend: Option<Backend>,
    model: Option<String>,
    base_url: Option<String>,
    api_key: Option<String>,
    retry_max: Option<u32>,
    retry_backoff_ms: Option<u64>,

    /// Named profiles are captured via flatten.
    #[serde(flatten)]
    profiles: HashMap<String, LlmConfig>,
}

impl From<RawConfig> for DocentConfig {
    fn from(raw: RawConfig) -> Self {
        let (llm, llm_profiles) = match raw.llm {
            Some(section) => {
                let default = if section.backend.is_some() || section.model.is_some() {
                    Some(LlmConfig {
                        backend: section.backend,
                        model: section.model,
                        base_url: section.base_url,
                        api_key: section.api_key,
                        retry_max: section.retry_max,
                        retry_backoff_ms: section.retry_backoff_ms,
                    })
                } else {
                    None
                };
                (default, section.profiles)
            }
            None => (None, HashMap::new()),
        };

        DocentConfig {
            llm,
            llm_profiles,
            research: raw.research,
            search: raw.search,
            logging: raw.logging,
        }
    }
}

impl From<DocentConfig> for RawConfig {
    fn from(config: DocentConfig) -> Self {
        let llm = if config.llm.is_some() || !config.llm_profiles.is_empty() {
            let default = config.llm.unwrap_or_default();
            Some(RawLlmSection {
                backend: default.backend,
                model: default.model,
                base_url: default.base_url,
                api_key: default.api_key,
                retry_max: default.retry_max,
                retry_backoff_ms: default.retry_backoff_ms,
                profiles: config.llm_profiles,
            })
        } else {
            None
        };

        RawConfig {
            llm,
            research: config.research,
            search: config.search,
            logging: config.logging,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LLM Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Configuration for an LLM backend.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Backend provider.
    pub backend: Option<Backend>,
    /// Model identifier.
    pub model: Option<String>,
    /// Custom API base URL (for proxies, custom endpoints).
    pub base_url: Option<String>,
    /// API key (prefer an env var; warns if set here).
    pub api_key: Option<String>,
    /// Maximum retry attempts for failed requests.
    pub retry_max: Option<u32>,
    /// Backoff delay between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
}

impl LlmConfig {
    /// Returns true if an API key is stored directly in the config file.
    pub fn has_plaintext_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    /// Get the environment variable name for this backend's API key.
    pub fn api_key_env_var(&self) -> Option<&'static str> {
        self.backend.as_ref().map(|b| b.env_var())
    }
}

/// Supported LLM backend providers.
///
/// All of them speak the OpenAI chat-completions protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Openai,
    Gemini,
    Groq,
    Ollama,
    Custom,
}

impl Backend {
    /// Environment variable name for this backend's API key.
    pub fn env_var(&self) -> &'static str {
        match self {
            Backend::Openai => "OPENAI_API_KEY",
            Backend::Gemini => "GEMINI_API_KEY",
            Backend::Groq => "GROQ_API_KEY",
            Backend::Ollama => "OLLAMA_API_KEY",
            Backend::Custom => "LLM_API_KEY",
        }
    }

    /// Human-readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            Backend::Openai => "OpenAI",
            Backend::Gemini => "Gemini",
            Backend::Groq => "Groq",
            Backend::Ollama => "Ollama",
            Backend::Custom => "Custom",
        }
    }

    /// Whether the backend can run without an API key.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Backend::Ollama)
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.display_name())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Research Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Which model a pipeline stage runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelRole {
    /// Planning, searching, summarizing, composing.
    Worker,
    /// Research evaluation.
    Critic,
}

impl ModelRole {
    /// The `[research]` key that binds this role to a profile.
    pub fn config_key(&self) -> &'static str {
        match self {
            ModelRole::Worker => "research.worker_llm",
            ModelRole::Critic => "research.critic_llm",
        }
    }

    /// Short name for logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelRole::Worker => "worker",
            ModelRole::Critic => "critic",
        }
    }
}

impl std::fmt::Display for ModelRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The `[research]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchConfig {
    /// Upper bound on evaluate/search cycles.
    pub max_search_iterations: u32,
    /// LLM profile for the worker role (default `[llm]` if unset).
    pub worker_llm: Option<String>,
    /// LLM profile for the critic role (default `[llm]` if unset).
    pub critic_llm: Option<String>,
    /// Every search is restricted to this site.
    pub documentation_site: String,
    /// Queries generated per research goal.
    pub queries_per_goal: usize,
    /// Follow-up queries executed per refinement pass.
    pub max_follow_up_queries: usize,
    /// Overrides the built-in approval phrase list.
    pub approval_phrases: Option<Vec<String>>,
    /// Ask models for their reasoning trace.
    pub include_thoughts: bool,
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            max_search_iterations: 5,
            worker_llm: None,
            critic_llm: None,
            documentation_site: DEFAULT_DOCUMENTATION_SITE.to_string(),
            queries_per_goal: 5,
            max_follow_up_queries: 7,
            approval_phrases: None,
            include_thoughts: true,
        }
    }
}

impl ResearchConfig {
    /// Profile name bound to a role, if any.
    pub fn profile_for(&self, role: ModelRole) -> Option<&str> {
        match role {
            ModelRole::Worker => self.worker_llm.as_deref(),
            ModelRole::Critic => self.critic_llm.as_deref(),
        }
    }

    /// Approval phrases in effect.
    pub fn approval_phrases(&self) -> Vec<String> {
        match self.approval_phrases {
            Some(ref phrases) => phrases.clone(),
            None => DEFAULT_APPROVAL_PHRASES
                .iter()
                .map(|p| p.to_string())
                .collect(),
        }
    }

    fn validate(&self) -> crate::Result<()> {
        if self.max_search_iterations == 0 {
            return Err(crate::ConfigError::invalid(
                "research.max_search_iterations",
                "must be at least 1",
            ));
        }
        if self.queries_per_goal == 0 {
            return Err(crate::ConfigError::invalid(
                "research.queries_per_goal",
                "must be at least 1",
            ));
        }
        if self.max_follow_up_queries == 0 {
            return Err(crate::ConfigError::invalid(
                "research.max_follow_up_queries",
                "must be at least 1",
            ));
        }
        if self.documentation_site.trim().is_empty() {
            return Err(crate::ConfigError::invalid(
                "research.documentation_site",
                "must not be empty",
            ));
        }
        if let Some(ref phrases) = self.approval_phrases {
            if phrases.iter().all(|p| p.trim().is_empty()) {
                return Err(crate::ConfigError::invalid(
                    "research.approval_phrases",
                    "must contain at least one phrase",
                ));
            }
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Search Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Web search providers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    Brave,
    Serper,
    Tavily,
    #[default]
    Duckduckgo,
}

impl SearchProviderKind {
    /// Environment variable holding the provider's API key.
    pub fn env_var(&self) -> Option<&'static str> {
        match self {
            SearchProviderKind::Brave => Some("BRAVE_API_KEY"),
            SearchProviderKind::Serper => Some("SERPER_API_KEY"),
            SearchProviderKind::Tavily => Some("TAVILY_API_KEY"),
            SearchProviderKind::Duckduckgo => None,
        }
    }
}

/// The `[search]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Which provider to query.
    pub provider: SearchProviderKind,
    /// Provider API key (prefer the env var).
    pub api_key: Option<String>,
    /// Results requested per query.
    pub max_results: usize,
    /// Per-request timeout.
    pub timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::default(),
            api_key: None,
            max_results: 10,
            timeout_secs: 30,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging Configuration
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for the rolling JSON log (default: platform data dir).
    pub directory: Option<PathBuf>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config() {
        let config = DocentConfig::new();
        assert!(config.llm.is_none());
        assert!(config.llm_profiles.is_empty());
        assert!(config.research.is_none());
        assert_eq!(config.research(), ResearchConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_named_profiles() {
        let toml = r#"
[llm]
backend = "gemini"
model = "gemini-2.5-flash"

[llm.critic]
backend = "gemini"
model = "gemini-2.5-pro"

[llm.local]
backend = "ollama"
model = "llama3.2"
base_url = "http://localhost:11434/v1"
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        assert_eq!(config.llm.as_ref().unwrap().backend, Some(Backend::Gemini));
        assert_eq!(config.llm_profiles.len(), 2);
        assert_eq!(
            config.llm_profiles["critic"].model.as_deref(),
            Some("gemini-2.5-pro")
        );
        assert_eq!(config.llm_names(), vec!["critic", "default", "local"]);
    }

    #[test]
    fn test_parse_research_section() {
        let toml = r#"
[research]
max_search_iterations = 3
critic_llm = "critic"
documentation_site = "https://docs.example.com/api/"
approval_phrases = ["ship it"]
include_thoughts = false
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        let research = config.research();
        assert_eq!(research.max_search_iterations, 3);
        assert_eq!(research.critic_llm.as_deref(), Some("critic"));
        assert!(research.worker_llm.is_none());
        assert_eq!(research.documentation_site, "https://docs.example.com/api/");
        assert_eq!(research.queries_per_goal, 5);
        assert_eq!(research.max_follow_up_queries, 7);
        assert_eq!(research.approval_phrases(), vec!["ship it".to_string()]);
        assert!(!research.include_thoughts);
    }

    #[test]
    fn test_research_defaults() {
        let research = ResearchConfig::default();
        assert_eq!(research.max_search_iterations, 5);
        assert_eq!(research.documentation_site, DEFAULT_DOCUMENTATION_SITE);
        assert!(research.include_thoughts);
        assert!(research.approval_phrases().contains(&"looks good".to_string()));
    }

    #[test]
    fn test_parse_search_section() {
        let toml = r#"
[search]
provider = "brave"
max_results = 5
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        let search = config.search();
        assert_eq!(search.provider, SearchProviderKind::Brave);
        assert_eq!(search.max_results, 5);
        assert_eq!(search.timeout_secs, 30);
        assert_eq!(search.provider.env_var(), Some("BRAVE_API_KEY"));
    }

    #[test]
    fn test_search_defaults_to_duckduckgo() {
        let config = DocentConfig::new();
        assert_eq!(config.search().provider, SearchProviderKind::Duckduckgo);
        assert!(config.search().provider.env_var().is_none());
    }

    #[test]
    fn test_validate_rejects_zero_iterations() {
        let toml = r#"
[research]
max_search_iterations = 0
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        let err = config.validate().unwrap_err();
        assert!(matches!(
            err,
            crate::ConfigError::Invalid { ref field, .. } if field == "research.max_search_iterations"
        ));
    }

    #[test]
    fn test_validate_rejects_empty_site() {
        let toml = r#"
[research]
documentation_site = "  "
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_results() {
        let toml = r#"
[search]
max_results = 0
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_resolve_llm_role_profile() {
        let toml = r#"
[llm]
backend = "gemini"
model = "worker-model"

[llm.critic]
backend = "gemini"
model = "critic-model"

[research]
critic_llm = "critic"
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        let critic = config.resolve_llm(ModelRole::Critic).unwrap();
        assert_eq!(critic.model.as_deref(), Some("critic-model"));
        let worker = config.resolve_llm(ModelRole::Worker).unwrap();
        assert_eq!(worker.model.as_deref(), Some("worker-model"));
    }

    #[test]
    fn test_resolve_llm_missing_profile() {
        let toml = r#"
[llm]
backend = "gemini"
model = "m"

[research]
worker_llm = "nonexistent"
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        let err = config.resolve_llm(ModelRole::Worker).unwrap_err();
        assert!(matches!(
            err,
            crate::ConfigError::LlmNotFound { ref context, .. } if context == "research.worker_llm"
        ));
    }

    #[test]
    fn test_resolve_llm_no_default() {
        let config = DocentConfig::new();
        let err = config.resolve_llm(ModelRole::Worker).unwrap_err();
        assert!(matches!(err, crate::ConfigError::NoDefaultLlm));
    }

    #[test]
    fn test_merge_override() {
        let mut base = DocentConfig::from_toml(
            r#"
[llm]
backend = "groq"
model = "base"

[llm.critic]
backend = "gemini"
model = "critic"

[research]
max_search_iterations = 2
"#,
        )
        .unwrap();
        let overlay = DocentConfig::from_toml(
            r#"
[llm]
backend = "openai"
model = "gpt-4o"

[logging]
directory = "/tmp/docent-logs"
"#,
        )
        .unwrap();

        base.merge(overlay);

        assert_eq!(base.llm.as_ref().unwrap().backend, Some(Backend::Openai));
        assert!(base.llm_profiles.contains_key("critic"));
        assert_eq!(base.research().max_search_iterations, 2);
        assert_eq!(
            base.logging.as_ref().unwrap().directory,
            Some(PathBuf::from("/tmp/docent-logs"))
        );
    }

    #[test]
    fn test_toml_roundtrip_keeps_profiles() {
        let toml = r#"
[llm]
backend = "gemini"
model = "flash"

[llm.critic]
backend = "gemini"
model = "pro"
"#;
        let config = DocentConfig::from_toml(toml).unwrap();
        let rendered = config.to_toml().unwrap();
        let reparsed = DocentConfig::from_toml(&rendered).unwrap();
        assert_eq!(reparsed.llm_profiles["critic"].model.as_deref(), Some("pro"));
        assert_eq!(reparsed.llm.unwrap().model.as_deref(), Some("flash"));
    }

    #[test]
    fn test_backend_env_vars() {
        assert_eq!(Backend::Gemini.env_var(), "GEMINI_API_KEY");
        assert_eq!(Backend::Openai.env_var(), "OPENAI_API_KEY");
        assert!(!Backend::Ollama.requires_api_key());
        assert_eq!(Backend::Groq.to_string(), "Groq");
    }
}
