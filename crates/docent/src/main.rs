//! Docent - documentation research assistant
//!
//! Main entry point for the Docent CLI.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use console::style;

mod commands;

use commands::{config, research};

// ─────────────────────────────────────────────────────────────────────────────
// CLI Structure
// ─────────────────────────────────────────────────────────────────────────────

/// Docent - documentation research assistant
#[derive(Parser)]
#[command(name = "docent")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,

    /// Directory holding config.toml (overrides DOCENT_CONFIG_DIR)
    #[arg(long, global = true, value_name = "DIR")]
    pub config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Plan and run a documentation research task
    Research(research::ResearchArgs),

    /// Configuration management
    Config(config::ConfigArgs),
}

// ─────────────────────────────────────────────────────────────────────────────
// Main
// ─────────────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let ctx = commands::Context {
        json_output: cli.json,
        verbose: cli.verbose,
        config_dir: cli.config_dir,
    };

    // Initialize tracing: console (human-readable) + rotating JSON file
    let filter = if ctx.verbose {
        "docent=debug,docent_research=debug,docent_llm=debug,docent_config=debug,info"
    } else {
        "docent=info,docent_research=info,docent_llm=warn,docent_config=warn,warn"
    };

    let log_dir = log_dir(&ctx);
    let file_appender = tracing_appender::rolling::daily(&log_dir, "docent.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    use tracing_subscriber::prelude::*;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(true)
                .with_writer(std::io::stderr)
                .with_filter(tracing_subscriber::EnvFilter::new(filter)),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(non_blocking)
                .with_filter(tracing_subscriber::EnvFilter::new(
                    "docent=trace,docent_research=trace,docent_llm=trace,docent_config=trace,info",
                )),
        )
        .init();

    let result = match cli.command {
        Commands::Research(args) => research::run(args, &ctx).await,
        Commands::Config(args) => config::run(args, &ctx).await,
    };

    if let Err(e) = result {
        eprintln!("{} {:#}", style("Error:").red().bold(), e);
        // flush the file log before exiting
        drop(_guard);
        std::process::exit(1);
    }
}

/// Log directory: `[logging] directory`, else the platform data dir.
fn log_dir(ctx: &commands::Context) -> PathBuf {
    ctx.load_config()
        .ok()
        .and_then(|loaded| loaded.config.logging)
        .and_then(|logging| logging.directory)
        .or_else(|| dirs::data_local_dir().map(|d| d.join("docent").join("logs")))
        .unwrap_or_else(|| PathBuf::from("logs"))
}
