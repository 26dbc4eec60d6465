//! Research pipeline: a small interpreter over composable stages.
//!
//! ```text
//! Sequential
//! ├── section_planner        research_plan → report_sections
//! ├── section_researcher     research_plan → section_research_findings, sources
//! ├── Loop (max_search_iterations)
//! │   ├── research_evaluator     findings → research_evaluation
//! │   ├── escalation_checker     evaluation → Escalate on pass
//! │   └── refinement_searcher    follow-ups → findings, sources
//! └── report_composer        everything → final_cited_report
//! ```
//!
//! A leaf returning [`StepOutcome::Escalate`] skips the rest of the enclosing
//! loop body and ends the loop.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use docent_config::ResearchConfig;
use serde::Serialize;

use crate::composer::ReportComposer;
use crate::error::{ResearchError, Result};
use crate::escalation::{EscalationChecker, ExitReason};
use crate::evaluator::{DEFAULT_MIN_FOLLOW_UPS, Grade, ResearchEvaluator};
use crate::model::Models;
use crate::outline::SectionPlanner;
use crate::plan::ResearchPlan;
use crate::refine::RefinementSearcher;
use crate::researcher::Researcher;
use crate::search::{ScopedSearch, SharedSearch, SiteScope};
use crate::sources::SourceRecord;
use crate::state::{Producer, StateStore};

/// Name of the refinement loop stage.
pub const REFINEMENT_LOOP: &str = "iterative_refinement_loop";

// ─────────────────────────────────────────────────────────────────────────────
// Progress reporting
// ─────────────────────────────────────────────────────────────────────────────

/// Progress events emitted during a run.
#[derive(Debug, Clone, PartialEq)]
pub enum ResearchProgress {
    /// A leaf stage is about to run.
    StageStarted {
        stage: String,
        iteration: Option<u32>,
    },
    /// The evaluator produced a verdict.
    Evaluated {
        iteration: u32,
        grade: Grade,
        comment: String,
    },
    /// The refinement loop ended.
    LoopFinished { iterations: u32, reason: ExitReason },
}

/// Callback for progress updates.
pub type ProgressCallback = Box<dyn Fn(ResearchProgress) + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Steps and stages
// ─────────────────────────────────────────────────────────────────────────────

/// Result of running one leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    /// Leave the enclosing loop.
    Escalate(ExitReason),
}

/// A unit of pipeline work.
#[async_trait]
pub trait Step: Send + Sync {
    fn name(&self) -> &str;

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutcome>;
}

/// One entry in the execution trace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceEvent {
    pub stage: String,
    /// 1-based loop iteration, if the stage ran inside a loop.
    pub iteration: Option<u32>,
}

/// How a loop stage ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoopExit {
    pub name: String,
    pub iterations: u32,
    pub reason: ExitReason,
}

/// Run-scoped context passed by `&mut` to every stage.
pub struct RunContext<'a> {
    pub state: StateStore,
    /// Iterations of the innermost loop completed before the current one.
    pub loop_iteration: u32,
    in_loop: bool,
    pub trace: Vec<TraceEvent>,
    pub loop_exit: Option<LoopExit>,
    pub citations_resolved: usize,
    pub citations_stripped: Vec<String>,
    progress: Option<&'a ProgressCallback>,
}

impl<'a> RunContext<'a> {
    pub fn new(state: StateStore, progress: Option<&'a ProgressCallback>) -> Self {
        Self {
            state,
            loop_iteration: 0,
            in_loop: false,
            trace: Vec::new(),
            loop_exit: None,
            citations_resolved: 0,
            citations_stripped: Vec::new(),
            progress,
        }
    }

    /// 1-based number of the iteration in progress, 0 outside any loop.
    pub fn current_iteration(&self) -> u32 {
        if self.in_loop {
            self.loop_iteration + 1
        } else {
            0
        }
    }

    pub fn emit(&self, event: ResearchProgress) {
        if let Some(cb) = self.progress {
            cb(event);
        }
    }

    /// Names of stages run so far, in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.trace.iter().map(|e| e.stage.as_str()).collect()
    }
}

type StageFuture<'a> = Pin<Box<dyn Future<Output = Result<StepOutcome>> + Send + 'a>>;

/// Pipeline description.
#[derive(Clone)]
pub enum Stage {
    /// Run children in order; an escalation stops the sequence and propagates.
    Sequential(Vec<Stage>),
    /// Repeat `body` up to `max_iterations` times or until a child escalates.
    Loop {
        name: String,
        max_iterations: u32,
        body: Vec<Stage>,
    },
    Leaf(Arc<dyn Step>),
}

impl Stage {
    pub fn leaf(step: impl Step + 'static) -> Self {
        Stage::Leaf(Arc::new(step))
    }

    pub fn run<'a, 'p: 'a>(&'a self, ctx: &'a mut RunContext<'p>) -> StageFuture<'a> {
        Box::pin(async move {
            match self {
                Stage::Leaf(step) => {
                    let iteration = ctx.in_loop.then(|| ctx.loop_iteration + 1);
                    tracing::info!(stage = step.name(), ?iteration, "Running stage");
                    ctx.trace.push(TraceEvent {
                        stage: step.name().to_string(),
                        iteration,
                    });
                    ctx.emit(ResearchProgress::StageStarted {
                        stage: step.name().to_string(),
                        iteration,
                    });
                    step.run(ctx).await
                }
                Stage::Sequential(children) => run_sequence(children, ctx).await,
                Stage::Loop {
                    name,
                    max_iterations,
                    body,
                } => {
                    let saved = (ctx.loop_iteration, ctx.in_loop);
                    ctx.in_loop = true;
                    ctx.loop_iteration = 0;

                    let mut reason = ExitReason::BudgetExhausted;
                    while ctx.loop_iteration < *max_iterations {
                        let outcome = run_sequence(body, ctx).await?;
                        ctx.loop_iteration += 1;
                        if let StepOutcome::Escalate(r) = outcome {
                            reason = r;
                            break;
                        }
                    }

                    let iterations = ctx.loop_iteration;
                    tracing::info!(loop_name = %name, iterations, reason = %reason, "Loop finished");
                    ctx.emit(ResearchProgress::LoopFinished { iterations, reason });
                    ctx.loop_exit = Some(LoopExit {
                        name: name.clone(),
                        iterations,
                        reason,
                    });

                    (ctx.loop_iteration, ctx.in_loop) = saved;
                    Ok(StepOutcome::Continue)
                }
            }
        })
    }
}

async fn run_sequence(children: &[Stage], ctx: &mut RunContext<'_>) -> Result<StepOutcome> {
    for child in children {
        if let StepOutcome::Escalate(reason) = child.run(ctx).await? {
            return Ok(StepOutcome::Escalate(reason));
        }
    }
    Ok(StepOutcome::Continue)
}

// ─────────────────────────────────────────────────────────────────────────────
// Research pipeline
// ─────────────────────────────────────────────────────────────────────────────

/// Outcome of a completed run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    /// Final report with citations resolved.
    pub report: String,
    /// Completed refinement iterations.
    pub iterations: u32,
    pub exit: ExitReason,
    pub final_grade: Option<Grade>,
    pub sources: Vec<SourceRecord>,
    pub citations_resolved: usize,
    pub citations_stripped: Vec<String>,
    pub trace: Vec<TraceEvent>,
}

/// Executes an approved plan end to end.
pub struct ResearchPipeline {
    models: Models,
    search: ScopedSearch,
    config: ResearchConfig,
}

impl ResearchPipeline {
    pub fn new(models: Models, search: SharedSearch, config: ResearchConfig) -> Self {
        let scope = SiteScope::new(&config.documentation_site);
        Self {
            models,
            search: ScopedSearch::new(search, scope),
            config,
        }
    }

    /// The stage tree for this configuration.
    pub fn build(&self) -> Stage {
        let worker = self.models.worker.clone();
        let critic = self.models.critic.clone();
        let max_follow_ups = self.config.max_follow_up_queries;

        Stage::Sequential(vec![
            Stage::leaf(SectionPlanner::new(worker.clone())),
            Stage::leaf(Researcher::new(
                worker.clone(),
                self.search.clone(),
                self.config.queries_per_goal,
            )),
            Stage::Loop {
                name: REFINEMENT_LOOP.to_string(),
                max_iterations: self.config.max_search_iterations,
                body: vec![
                    Stage::leaf(ResearchEvaluator::new(critic.clone()).with_follow_up_range(
                        DEFAULT_MIN_FOLLOW_UPS.min(max_follow_ups),
                        max_follow_ups,
                    )),
                    Stage::leaf(EscalationChecker::new(self.config.max_search_iterations)),
                    Stage::leaf(RefinementSearcher::new(
                        worker.clone(),
                        self.search.clone(),
                        max_follow_ups,
                    )),
                ],
            },
            Stage::leaf(ReportComposer::new(critic)),
        ])
    }

    /// Run the pipeline on an approved plan.
    pub async fn run(
        &self,
        plan: ResearchPlan,
        progress: Option<&ProgressCallback>,
    ) -> Result<RunReport> {
        if self.config.max_search_iterations == 0 {
            return Err(ResearchError::config("max_search_iterations must be at least 1"));
        }

        tracing::info!(
            goals = plan.len(),
            site = %self.search.scope().site(),
            max_iterations = self.config.max_search_iterations,
            "Starting research run"
        );

        let mut state = StateStore::new();
        state.set_plan(Producer::Planner, plan)?;
        let mut ctx = RunContext::new(state, progress);

        self.build().run(&mut ctx).await?;

        let report = ctx
            .state
            .final_report()
            .map(str::to_string)
            .ok_or_else(|| ResearchError::config("pipeline finished without a report"))?;
        let (iterations, exit) = ctx
            .loop_exit
            .as_ref()
            .map(|e| (e.iterations, e.reason))
            .unwrap_or((0, ExitReason::BudgetExhausted));

        tracing::info!(
            iterations,
            exit = %exit,
            sources = ctx.state.sources().len(),
            "Research run complete"
        );

        Ok(RunReport {
            report,
            iterations,
            exit,
            final_grade: ctx.state.evaluation().map(|f| f.grade),
            sources: ctx.state.sources().records().to_vec(),
            citations_resolved: ctx.citations_resolved,
            citations_stripped: ctx.citations_stripped,
            trace: ctx.trace,
        })
    }
}
