//! Research command - plan with the user, then run the research pipeline.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context as _, Result};
use clap::Args;
use console::{Style, style};
use docent_config::{DocentConfig, ModelRole, ResearchConfig};
use docent_research::{
    ExitReason, Planner, ProgressCallback, ResearchPipeline, ResearchPlan, ResearchProgress,
    RunReport, ScopedSearch, SiteScope,
};
use indicatif::{ProgressBar, ProgressStyle};

use super::Context;
use super::backend;
use super::planning::PlanningSession;

/// Arguments for the research command.
#[derive(Args, Debug)]
pub struct ResearchArgs {
    /// The research question (prompted for when omitted)
    pub question: Option<String>,

    /// Documentation site to restrict searches to
    #[arg(long, value_name = "URL")]
    pub site: Option<String>,

    /// Override research.max_search_iterations
    #[arg(long, value_name = "N")]
    pub max_iterations: Option<u32>,

    /// Run a pre-approved plan file instead of drafting one
    #[arg(long, value_name = "FILE", conflicts_with = "question")]
    pub plan: Option<PathBuf>,

    /// Accept the first drafted plan without asking
    #[arg(short, long)]
    pub yes: bool,

    /// Write the final report to a file instead of stdout
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Run the research command.
pub async fn run(args: ResearchArgs, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    for warning in &loaded.warnings {
        tracing::warn!("{}", warning);
    }
    let config = loaded.config;
    let research = research_config(&config, &args)?;
    let search = backend::search(&config)?;

    let plan = match args.plan {
        Some(ref path) => read_plan(path)?,
        None => {
            let worker = backend::role_model(&config, ModelRole::Worker)?;
            let lookup = ScopedSearch::new(
                search.clone(),
                SiteScope::new(&research.documentation_site),
            );
            let planner = Planner::from_config(worker, &research).with_search(lookup);
            let mut session = PlanningSession::new(planner, &research.documentation_site)?;
            match session.run(args.question.clone(), args.yes).await? {
                Some(plan) => plan,
                None => return Ok(()),
            }
        }
    };

    let pipeline = ResearchPipeline::new(backend::models(&config)?, search, research);

    let spinner = spinner(ctx);
    let callback = progress_callback(spinner.clone());
    let result = pipeline.run(plan, Some(&callback)).await;
    spinner.finish_and_clear();
    let report = result?;

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match args.output {
        Some(ref path) => {
            std::fs::write(path, &report.report)
                .with_context(|| format!("Writing report to {}", path.display()))?;
            let green = Style::new().green();
            println!(
                "{} Report written to {}",
                green.apply_to("✓"),
                path.display()
            );
        }
        None => {
            println!();
            println!("{}", report.report);
        }
    }

    print_summary(&report, ctx.verbose);
    Ok(())
}

/// `[research]` settings with command-line overrides applied.
fn research_config(config: &DocentConfig, args: &ResearchArgs) -> Result<ResearchConfig> {
    let mut research = config.research();
    if let Some(ref site) = args.site {
        research.documentation_site = site.clone();
    }
    if let Some(max) = args.max_iterations {
        anyhow::ensure!(max > 0, "--max-iterations must be at least 1");
        research.max_search_iterations = max;
    }
    Ok(research)
}

fn read_plan(path: &Path) -> Result<ResearchPlan> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Reading plan file {}", path.display()))?;
    let plan = ResearchPlan::parse(&text)
        .with_context(|| format!("Parsing plan file {}", path.display()))?;
    tracing::info!(goals = plan.len(), path = %path.display(), "Loaded approved plan");
    Ok(plan)
}

fn spinner(ctx: &Context) -> ProgressBar {
    if ctx.json_output {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    bar.set_message("Starting research");
    bar
}

fn progress_callback(bar: ProgressBar) -> ProgressCallback {
    Box::new(move |event| match event {
        ResearchProgress::StageStarted { stage, iteration } => {
            let label = stage.replace('_', " ");
            match iteration {
                Some(n) => bar.set_message(format!("{} (iteration {})", label, n)),
                None => bar.set_message(label),
            }
        }
        ResearchProgress::Evaluated {
            iteration,
            grade,
            comment,
        } => {
            let dim = Style::new().dim();
            bar.println(format!(
                "  iteration {}: {} {}",
                iteration,
                style(grade).bold(),
                dim.apply_to(comment)
            ));
        }
        ResearchProgress::LoopFinished { iterations, reason } => {
            bar.println(format!(
                "  refinement finished after {} iteration(s): {}",
                iterations, reason
            ));
        }
    })
}

fn print_summary(report: &RunReport, verbose: bool) {
    let dim = Style::new().dim();
    let exit = match report.exit {
        ExitReason::Passed => style(report.exit.to_string()).green(),
        ExitReason::BudgetExhausted => style(report.exit.to_string()).yellow(),
    };

    println!();
    println!("{}", dim.apply_to("─".repeat(40)));
    println!("Iterations: {} ({})", report.iterations, exit);
    println!("Sources:    {}", report.sources.len());
    println!(
        "Citations:  {} resolved, {} stripped",
        report.citations_resolved,
        report.citations_stripped.len()
    );

    if verbose {
        for source in &report.sources {
            println!(
                "  {} {} {}",
                dim.apply_to(&source.id),
                source.display_title(),
                dim.apply_to(&source.url)
            );
        }
        if !report.citations_stripped.is_empty() {
            println!(
                "  {}",
                dim.apply_to(format!("unresolved: {}", report.citations_stripped.join(", ")))
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args() -> ResearchArgs {
        ResearchArgs {
            question: None,
            site: None,
            max_iterations: None,
            plan: None,
            yes: false,
            output: None,
        }
    }

    #[test]
    fn test_overrides_applied() {
        let config = DocentConfig::from_toml("[research]\nmax_search_iterations = 4\n").unwrap();
        let research = research_config(&config, &args()).unwrap();
        assert_eq!(research.max_search_iterations, 4);

        let overridden = ResearchArgs {
            site: Some("https://docs.rs/tokio/".to_string()),
            max_iterations: Some(2),
            ..args()
        };
        let research = research_config(&config, &overridden).unwrap();
        assert_eq!(research.max_search_iterations, 2);
        assert_eq!(research.documentation_site, "https://docs.rs/tokio/");
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let zero = ResearchArgs {
            max_iterations: Some(0),
            ..args()
        };
        assert!(research_config(&DocentConfig::new(), &zero).is_err());
    }

    #[test]
    fn test_read_plan_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("plan.md");
        std::fs::write(
            &path,
            "- [RESEARCH] Analyze runners\n- [DELIVERABLE][IMPLIED] Summary table\n",
        )
        .unwrap();

        let plan = read_plan(&path).unwrap();
        assert_eq!(plan.research_goals().count(), 1);
        assert_eq!(plan.deliverable_goals().count(), 1);
    }
}
