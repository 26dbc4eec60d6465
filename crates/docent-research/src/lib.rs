//! Research core for Docent.
//!
//! Turns an approved research plan into a cited report restricted to one
//! documentation site.
//!
//! # Architecture
//!
//! ```text
//! Planner ──approved plan──▶ ResearchPipeline
//!                            ├── SectionPlanner
//!                            ├── Researcher ──▶ ScopedSearch ──▶ SourceCollector
//!                            ├── Loop (max_search_iterations)
//!                            │   ├── ResearchEvaluator      (critic model)
//!                            │   ├── EscalationChecker      (pass → exit)
//!                            │   └── RefinementSearcher ──▶ SourceCollector
//!                            └── ReportComposer ──▶ citations::resolve
//! ```
//!
//! All model calls go through [`RoleModel`] (worker or critic) and all
//! searches through [`ScopedSearch`], so both collaborators can be replaced
//! by [`docent_llm::MockBackend`] and [`MockSearch`] in tests.

pub mod citations;
pub mod composer;
pub mod error;
pub mod escalation;
pub mod evaluator;
pub mod model;
pub mod outline;
pub mod pipeline;
pub mod plan;
pub mod planner;
pub mod prompts;
pub mod refine;
pub mod researcher;
pub mod search;
pub mod sources;
pub mod state;
pub mod web;

pub use citations::{Resolution, render_citation, resolve};
pub use error::{PlanError, ResearchError, Result, SchemaError, SearchError, StateError};
pub use escalation::{Decision, EscalationChecker, ExitReason};
pub use evaluator::{Feedback, FollowUpQuery, Grade, ResearchEvaluator};
pub use model::{Models, RoleModel};
pub use pipeline::{
    ProgressCallback, ResearchPipeline, ResearchProgress, RunContext, RunReport, Stage, Step,
    StepOutcome, TraceEvent,
};
pub use plan::{Goal, GoalKind, ResearchPlan, StatusTag};
pub use planner::{ApprovalDetector, Planner, PlannerReply, PlannerState};
pub use search::{MockSearch, ScopedSearch, SearchBackend, SearchResult, SharedSearch, SiteScope};
pub use sources::{SourceCollector, SourceRecord, SourceRegistry};
pub use state::{Producer, StateKey, StateStore};
pub use web::WebSearch;
