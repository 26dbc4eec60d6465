//! Config file discovery and layered merging.
//!
//! Resolution order (later overrides earlier):
//! 1. `~/.config/docent/config.toml` (user config)
//! 2. `./docent.toml` (project-local)
//! 3. CLI arguments (handled externally)

use std::path::{Path, PathBuf};

use crate::{ConfigError, DocentConfig, Result};

/// Default config filename for project-local config.
const PROJECT_CONFIG_FILE: &str = "docent.toml";

/// Default config filename within the user config directory.
const USER_CONFIG_FILE: &str = "config.toml";

/// Application name for platform directory resolution.
const APP_NAME: &str = "docent";

/// Environment variable to override the user config directory.
const CONFIG_DIR_ENV: &str = "DOCENT_CONFIG_DIR";

/// Tracks where each config layer was loaded from.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    /// Path to the config file.
    pub path: PathBuf,
    /// Whether the file was found and loaded.
    pub loaded: bool,
}

/// Result of config discovery and loading.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// The merged configuration.
    pub config: DocentConfig,
    /// Sources that were checked, in order of precedence (lowest first).
    pub sources: Vec<ConfigSource>,
    /// Warnings generated during loading (e.g., plaintext API keys).
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Get paths of sources that were actually loaded.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter(|s| s.loaded)
            .map(|s| s.path.as_path())
            .collect()
    }
}

/// Load configuration by discovering and merging all config layers.
///
/// Searches for config files in order:
/// 1. User config dir (`DOCENT_CONFIG_DIR` env, or platform default)
/// 2. Project-local (`./docent.toml` or specified project dir)
///
/// Later files override earlier ones. The merged result is validated.
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(project_dir, None)
}

/// Load configuration with explicit control over the user config directory.
///
/// `config_dir` overrides both `DOCENT_CONFIG_DIR` and the platform default.
pub fn load_config_with_options(
    project_dir: Option<&Path>,
    config_dir: Option<&Path>,
) -> Result<LoadedConfig> {
    let mut config = DocentConfig::new();
    let mut sources = Vec::new();
    let mut warnings = Vec::new();

    let user_config_path = match config_dir {
        Some(dir) => Some(dir.join(USER_CONFIG_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_config_path {
        sources.push(load_layer(&mut config, &path, &mut warnings));
    }

    let project_path = project_dir
        .map(|d| d.join(PROJECT_CONFIG_FILE))
        .unwrap_or_else(|| PathBuf::from(PROJECT_CONFIG_FILE));
    sources.push(load_layer(&mut config, &project_path, &mut warnings));

    check_plaintext_keys(&config, &mut warnings);
    config.validate()?;

    Ok(LoadedConfig {
        config,
        sources,
        warnings,
    })
}

/// Load config from a specific file path (no discovery, no validation).
pub fn load_config_file(path: &Path) -> Result<DocentConfig> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.display().to_string(),
        source: e,
    })?;
    DocentConfig::from_toml(&contents)
}

/// Save configuration to a file.
///
/// Creates parent directories if they don't exist.
pub fn save_config(config: &DocentConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::WriteFile {
            path: parent.display().to_string(),
            source: e,
        })?;
    }

    let contents = config.to_toml()?;
    std::fs::write(path, contents).map_err(|e| ConfigError::WriteFile {
        path: path.display().to_string(),
        source: e,
    })?;

    Ok(())
}

/// Path of the user config file.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|d| d.join(USER_CONFIG_FILE))
}

/// User config directory for docent.
///
/// Checks `DOCENT_CONFIG_DIR` first, then falls back to the platform default.
pub fn user_config_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var(CONFIG_DIR_ENV)
        && !dir.is_empty()
    {
        return Some(PathBuf::from(dir));
    }
    dirs::config_dir().map(|d| d.join(APP_NAME))
}

/// Try to load a config file and merge it into the existing config.
///
/// A missing file is skipped; an unreadable or malformed one becomes a warning.
fn load_layer(config: &mut DocentConfig, path: &Path, warnings: &mut Vec<String>) -> ConfigSource {
    if !path.is_file() {
        return ConfigSource {
            path: path.to_path_buf(),
            loaded: false,
        };
    }

    match load_config_file(path) {
        Ok(layer) => {
            tracing::debug!(path = %path.display(), "Loaded config layer");
            config.merge(layer);
            ConfigSource {
                path: path.to_path_buf(),
                loaded: true,
            }
        }
        Err(e) => {
            warnings.push(format!("Failed to load {}: {}", path.display(), e));
            ConfigSource {
                path: path.to_path_buf(),
                loaded: false,
            }
        }
    }
}

/// Check for plaintext API keys in the config and emit warnings.
fn check_plaintext_keys(config: &DocentConfig, warnings: &mut Vec<String>) {
    if let Some(ref llm) = config.llm
        && llm.has_plaintext_api_key()
    {
        warnings.push(
            "Default [llm] config contains a plaintext API key. \
             Consider using an environment variable instead."
                .to_string(),
        );
    }

    let mut names: Vec<&String> = config.llm_profiles.keys().collect();
    names.sort();
    for name in names {
        if config.llm_profiles[name].has_plaintext_api_key() {
            warnings.push(format!(
                "[llm.{}] contains a plaintext API key. \
                 Consider using an environment variable instead.",
                name
            ));
        }
    }

    if let Some(ref search) = config.search
        && search.api_key.is_some()
    {
        warnings.push(
            "[search] contains a plaintext API key. \
             Consider using an environment variable instead."
                .to_string(),
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    use crate::Backend;

    fn load_isolated(project: &Path) -> Result<LoadedConfig> {
        let empty = TempDir::new().unwrap();
        load_config_with_options(Some(project), Some(empty.path()))
    }

    #[test]
    fn test_user_config_path_shape() {
        if let Some(p) = user_config_path() {
            assert!(p.ends_with("config.toml"));
        }
    }

    #[test]
    fn test_load_config_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
[llm]
backend = "groq"
model = "test-model"
"#,
        )
        .unwrap();

        let config = load_config_file(&path).unwrap();
        assert_eq!(config.llm.as_ref().unwrap().backend, Some(Backend::Groq));
    }

    #[test]
    fn test_load_config_file_not_found() {
        let err = load_config_file(Path::new("/nonexistent/config.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_load_config_invalid_toml() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is not valid toml {{{{").unwrap();

        let err = load_config_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_load_config_project_only() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("docent.toml"),
            r#"
[llm]
backend = "gemini"
model = "gemini-2.5-flash"

[research]
max_search_iterations = 3
"#,
        )
        .unwrap();

        let loaded = load_isolated(dir.path()).unwrap();
        assert_eq!(
            loaded.config.llm.as_ref().unwrap().backend,
            Some(Backend::Gemini)
        );
        assert_eq!(loaded.config.research().max_search_iterations, 3);
        assert_eq!(loaded.loaded_from().len(), 1);
    }

    #[test]
    fn test_load_config_no_files() {
        let dir = TempDir::new().unwrap();
        let loaded = load_isolated(dir.path()).unwrap();
        assert!(loaded.config.llm.is_none());
        assert!(loaded.loaded_from().is_empty());
    }

    #[test]
    fn test_load_config_layered_merge() {
        let user_dir = TempDir::new().unwrap();
        let project_dir = TempDir::new().unwrap();

        fs::write(
            user_dir.path().join("config.toml"),
            r#"
[llm]
backend = "groq"
model = "base-model"

[llm.critic]
backend = "gemini"
model = "critic-base"

[research]
max_search_iterations = 4
"#,
        )
        .unwrap();

        fs::write(
            project_dir.path().join("docent.toml"),
            r#"
[llm]
backend = "openai"
model = "project-model"

[research]
max_search_iterations = 2
"#,
        )
        .unwrap();

        let loaded =
            load_config_with_options(Some(project_dir.path()), Some(user_dir.path())).unwrap();
        let config = &loaded.config;

        let llm = config.llm.as_ref().unwrap();
        assert_eq!(llm.backend, Some(Backend::Openai));
        assert_eq!(llm.model.as_deref(), Some("project-model"));
        assert_eq!(config.research().max_search_iterations, 2);
        assert!(config.llm_profiles.contains_key("critic"));
        assert_eq!(loaded.loaded_from().len(), 2);
    }

    #[test]
    fn test_zero_iterations_rejected_at_load() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("docent.toml"),
            r#"
[research]
max_search_iterations = 0
"#,
        )
        .unwrap();

        let err = load_isolated(dir.path()).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { .. }));
    }

    #[test]
    fn test_plaintext_key_warning() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("docent.toml"),
            r#"
[llm]
backend = "groq"
model = "model"
api_key = "gsk_secret"

[llm.critic]
backend = "gemini"
model = "pro"
api_key = "g-secret"

[search]
provider = "brave"
api_key = "brave-secret"
"#,
        )
        .unwrap();

        let loaded = load_isolated(dir.path()).unwrap();
        assert_eq!(loaded.warnings.len(), 3);
        assert!(loaded.warnings[0].contains("plaintext"));
        assert!(loaded.warnings[1].contains("[llm.critic]"));
        assert!(loaded.warnings[2].contains("[search]"));
    }

    #[test]
    fn test_malformed_config_warns_but_continues() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("docent.toml"), "not valid toml {{{{").unwrap();

        let loaded = load_isolated(dir.path()).unwrap();
        assert!(!loaded.warnings.is_empty());
        assert!(loaded.warnings[0].contains("Failed to load"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = DocentConfig::from_toml(
            r#"
[llm]
backend = "gemini"
model = "flash"
"#,
        )
        .unwrap();

        save_config(&config, &path).unwrap();
        let reloaded = load_config_file(&path).unwrap();
        assert_eq!(reloaded.llm.unwrap().model.as_deref(), Some("flash"));
    }
}
