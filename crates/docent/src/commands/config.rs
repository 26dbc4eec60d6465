//! Config command - configuration management.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};
use console::Style;
use docent_config::{Backend, DocentConfig, ModelRole, secrets};

use super::Context;

const ROLES: [ModelRole; 2] = [ModelRole::Worker, ModelRole::Critic];

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration, LLM profiles and role bindings
    Show,

    /// Show which config files are loaded and their precedence
    Which,

    /// Initialize a config file with defaults
    Init {
        /// Create project-local config (./docent.toml) instead of user config
        #[arg(long)]
        local: bool,
    },

    /// Show configuration file path
    Path,
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx).await,
        ConfigCommand::Which => cmd_which(ctx).await,
        ConfigCommand::Init { local } => cmd_init(ctx, local).await,
        ConfigCommand::Path => cmd_path(ctx).await,
    }
}

async fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    if ctx.json_output {
        let roles: serde_json::Map<String, serde_json::Value> = ROLES
            .into_iter()
            .map(|role| {
                let value = match docent_config::resolve_for_role(config, role) {
                    Ok(r) => serde_json::json!({
                        "backend": r.backend,
                        "model": r.model,
                        "resolved_from": r.resolved_from.to_string(),
                        "api_key": r.api_key_source.map(|s| s.to_string()),
                    }),
                    Err(e) => serde_json::json!({ "error": e.to_string() }),
                };
                (role.to_string(), value)
            })
            .collect();
        let value = serde_json::json!({
            "sources": loaded.loaded_from(),
            "warnings": loaded.warnings,
            "roles": roles,
            "research": config.research(),
            "search": {
                "provider": config.search().provider,
                "max_results": config.search().max_results,
                "timeout_secs": config.search().timeout_secs,
            },
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("# Docent Configuration\n");

    // Sources
    let sources = loaded.loaded_from();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    // LLM profiles
    let profiles = docent_config::resolve_all_profiles(config);
    if profiles.is_empty() {
        println!("No LLM profiles configured\n");
    } else {
        println!("LLM Profiles:");
        for (name, backend, model) in &profiles {
            let key_status = key_status_for(backend);
            println!("  {:<12} {} / {}  {}", name, backend, model, key_status);
        }
        println!();
    }

    // Role bindings
    println!("Model Roles:");
    for role in ROLES {
        match docent_config::resolve_for_role(config, role) {
            Ok(resolved) => println!(
                "  {:<12} {} / {}  ({})",
                role.as_str(),
                resolved.backend,
                resolved.model,
                resolved.resolved_from
            ),
            Err(e) => {
                let red = Style::new().red();
                println!("  {:<12} {}", role.as_str(), red.apply_to(e));
            }
        }
    }
    println!();

    // Research settings
    let research = config.research();
    println!("Research:");
    println!("  site:            {}", research.documentation_site);
    println!("  max iterations:  {}", research.max_search_iterations);
    println!("  queries/goal:    {}", research.queries_per_goal);
    println!("  max follow-ups:  {}", research.max_follow_up_queries);
    println!("  thoughts:        {}", research.include_thoughts);
    println!();

    // Search settings
    let search = config.search();
    let search_key = match (search.provider.env_var(), secrets::resolve_search_key(&search)) {
        (None, _) => "(no key needed)".to_string(),
        (Some(_), Some(secret)) => format!("✓ key ({})", secret.source),
        (Some(var), None) => format!("✗ no key (set {})", var),
    };
    println!("Search:");
    println!("  provider: {:?}  {}", search.provider, search_key);
    println!("  max results: {}, timeout: {}s", search.max_results, search.timeout_secs);
    println!();

    // Warnings
    if !loaded.warnings.is_empty() {
        println!("Warnings:");
        for w in &loaded.warnings {
            println!("  ⚠ {}", w);
        }
        println!();
    }

    if ctx.verbose {
        // Show raw TOML
        println!("---\nRaw config:\n");
        if let Ok(toml_str) = config.to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

async fn cmd_which(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;

    println!("Config file search order (later overrides earlier):\n");

    for source in &loaded.sources {
        let status = if source.loaded {
            "✓ loaded"
        } else {
            "· not found"
        };
        println!("  {} {}", status, source.path.display());
    }

    println!();
    let loaded_count = loaded.loaded_from().len();
    if loaded_count == 0 {
        println!("No config files found. Run 'docent config init' to create one.");
    } else {
        println!("{} config file(s) loaded.", loaded_count);
    }

    Ok(())
}

async fn cmd_init(ctx: &Context, local: bool) -> Result<()> {
    let path = if local {
        PathBuf::from("docent.toml")
    } else {
        let dir = ctx
            .user_config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?;
        std::fs::create_dir_all(&dir)?;
        dir.join("config.toml")
    };

    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }

    std::fs::write(&path, CONFIG_TEMPLATE)?;
    println!("Created config file: {}", path.display());
    println!("Set GEMINI_API_KEY (or edit [llm]) before running 'docent research'.");

    Ok(())
}

async fn cmd_path(ctx: &Context) -> Result<()> {
    match ctx.user_config_dir() {
        Some(dir) => println!("{}", dir.join("config.toml").display()),
        None => println!("Could not determine config directory"),
    }
    Ok(())
}

fn key_status_for(backend: &Backend) -> String {
    if !backend.requires_api_key() {
        return "(no key needed)".to_string();
    }
    match secrets::resolve_api_key(backend, None) {
        Some(secret) => format!("✓ key ({})", secret.source),
        None => format!("✗ no key (set {})", backend.env_var()),
    }
}

const CONFIG_TEMPLATE: &str = r#"# Docent Configuration

# Default LLM (used by every role without a binding)
[llm]
backend = "gemini"
model = "gemini-2.5-flash"

# Stronger model for research evaluation
[llm.critic]
backend = "gemini"
model = "gemini-2.5-pro"

# [llm.local]
# backend = "ollama"
# model = "llama3.2"
# base_url = "http://localhost:11434/v1"

[research]
critic_llm = "critic"
documentation_site = "https://google.github.io/adk-docs/api-reference/python/"
max_search_iterations = 5
# approval_phrases = ["looks good", "approved", "run it"]

[search]
provider = "duckduckgo"
# provider = "brave"   # reads BRAVE_API_KEY
max_results = 10
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_template_parses() {
        let config = DocentConfig::from_toml(CONFIG_TEMPLATE).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.research().critic_llm.as_deref(), Some("critic"));
        assert!(config.llm_profiles.contains_key("critic"));
    }

    #[test]
    fn test_key_status_for_local_backend() {
        assert_eq!(key_status_for(&Backend::Ollama), "(no key needed)");
    }
}
