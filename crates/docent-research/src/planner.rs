//! Interactive planner with an explicit approval gate.
//!
//! ```text
//! Drafting ──draft──▶ AwaitingApproval ──approval──▶ Executing
//!     ▲                     │
//!     └─────feedback────────┘
//! ```
//!
//! The planner never researches. An optional site-scoped lookup may show it
//! how the documentation names things. Approval freezes the current plan and
//! hands it to the caller, who runs the pipeline.

use std::sync::LazyLock;

use docent_config::ResearchConfig;
use regex::Regex;

use crate::error::{PlanError, Result};
use crate::model::RoleModel;
use crate::plan::ResearchPlan;
use crate::prompts;
use crate::search::{ScopedSearch, SearchResult};

/// Words that veto an otherwise approving turn.
pub const NEGATION_CUES: &[&str] = &[
    "don't", "dont", "do not", "not", "never", "no", "nope", "wait", "hold on", "but",
    "however", "change", "changes", "instead", "reject", "rejected",
];

static NEGATION: LazyLock<Regex> = LazyLock::new(|| {
    let cues = NEGATION_CUES
        .iter()
        .map(|cue| regex::escape(cue))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&format!(r"(?:\b(?:{})\b|n't\b)", cues)).expect("valid regex")
});

/// Most lookup results shown to the planner per turn.
pub const MAX_LOOKUP_RESULTS: usize = 5;

/// Words of the user's turn used as the lookup query.
const MAX_LOOKUP_WORDS: usize = 12;

/// Where the planner is in the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlannerState {
    Drafting,
    AwaitingApproval,
    Executing,
}

/// Detects explicit, unambiguous approval.
///
/// A phrase only counts as a whole word run, so "disapprove" never matches
/// "approve". Questions and turns with a negation cue are never approval.
#[derive(Debug, Clone)]
pub struct ApprovalDetector {
    phrases: Vec<Regex>,
}

impl ApprovalDetector {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            phrases: phrases
                .into_iter()
                .map(Into::into)
                .filter_map(|p: String| phrase_pattern(&p))
                .collect(),
        }
    }

    pub fn from_config(config: &ResearchConfig) -> Self {
        Self::new(config.approval_phrases())
    }

    /// True when the turn contains an approval phrase, no negation cue, and
    /// is not a question.
    pub fn is_approval(&self, turn: &str) -> bool {
        let turn = turn.trim().to_lowercase().replace('\u{2019}', "'");
        if turn.ends_with('?') {
            return false;
        }
        let approves = self.phrases.iter().any(|p| p.is_match(&turn));
        approves && !NEGATION.is_match(&turn)
    }
}

/// Whole-word, whitespace-tolerant pattern for one approval phrase.
fn phrase_pattern(phrase: &str) -> Option<Regex> {
    let words: Vec<String> = phrase
        .to_lowercase()
        .split_whitespace()
        .map(regex::escape)
        .collect();
    if words.is_empty() {
        return None;
    }
    let pattern = format!(r"(?:^|[^\w'-]){}(?:$|[^\w'-])", words.join(r"\s+"));
    match Regex::new(&pattern) {
        Ok(re) => Some(re),
        Err(e) => {
            tracing::warn!(phrase, error = %e, "Skipping approval phrase");
            None
        }
    }
}

/// What the planner produced for one user turn.
#[derive(Debug, Clone, PartialEq)]
pub enum PlannerReply {
    /// A new or revised plan awaiting approval.
    Draft {
        plan: ResearchPlan,
        /// Full model reply, including any question to the user.
        message: String,
    },
    /// The user approved; research may start with this frozen plan.
    Approved(ResearchPlan),
}

/// Conversation driver for plan drafting and approval.
pub struct Planner {
    model: RoleModel,
    detector: ApprovalDetector,
    site: String,
    state: PlannerState,
    plan: Option<ResearchPlan>,
    turns: Vec<String>,
    search: Option<ScopedSearch>,
}

impl Planner {
    pub fn new(model: RoleModel, detector: ApprovalDetector, site: impl Into<String>) -> Self {
        Self {
            model,
            detector,
            site: site.into(),
            state: PlannerState::Drafting,
            plan: None,
            turns: Vec::new(),
            search: None,
        }
    }

    /// Enable one site-scoped terminology lookup per drafted turn.
    ///
    /// Results only reach the planner prompt. They are never recorded as
    /// sources or findings.
    pub fn with_search(mut self, search: ScopedSearch) -> Self {
        self.search = Some(search);
        self
    }

    pub fn from_config(model: RoleModel, config: &ResearchConfig) -> Self {
        Self::new(
            model,
            ApprovalDetector::from_config(config),
            config.documentation_site.clone(),
        )
    }

    pub fn state(&self) -> PlannerState {
        self.state
    }

    pub fn plan(&self) -> Option<&ResearchPlan> {
        self.plan.as_ref()
    }

    /// Handle one user turn.
    pub async fn handle(&mut self, turn: &str) -> Result<PlannerReply> {
        if self.state == PlannerState::Executing {
            return Err(PlanError::Frozen.into());
        }

        if self.state == PlannerState::AwaitingApproval
            && self.detector.is_approval(turn)
            && let Some(plan) = self.plan.clone()
        {
            tracing::info!(goals = plan.len(), "Plan approved");
            self.state = PlannerState::Executing;
            return Ok(PlannerReply::Approved(plan));
        }

        self.state = PlannerState::Drafting;
        self.turns.push(turn.trim().to_string());

        let current = self.plan.as_ref().map(ResearchPlan::render);
        let instruction = prompts::planner(&self.site, &prompts::today(), current.as_deref());
        let mut input = self.transcript();
        if let Some(context) = self.lookup(turn).await {
            input.push_str("\n\n");
            input.push_str(&context);
        }
        let message = self.model.invoke(&instruction, &input).await?;

        let mut plan = match ResearchPlan::parse(&message) {
            Ok(plan) => plan,
            Err(e) => {
                self.state = if self.plan.is_some() {
                    PlannerState::AwaitingApproval
                } else {
                    PlannerState::Drafting
                };
                return Err(e.into());
            }
        };

        if let Some(ref previous) = self.plan {
            let tagged = plan.reconcile_tags(previous);
            if tagged > 0 {
                tracing::debug!(tagged, "Tagged untagged new goals");
            }
        }

        tracing::info!(
            goals = plan.len(),
            revision = self.plan.is_some(),
            "Plan drafted"
        );
        self.plan = Some(plan.clone());
        self.state = PlannerState::AwaitingApproval;
        Ok(PlannerReply::Draft { plan, message })
    }

    /// Terminology context for the latest turn, if a lookup is configured
    /// and returned anything.
    async fn lookup(&self, turn: &str) -> Option<String> {
        let search = self.search.as_ref()?;
        let query = turn
            .split_whitespace()
            .take(MAX_LOOKUP_WORDS)
            .collect::<Vec<_>>()
            .join(" ");
        if query.is_empty() {
            return None;
        }

        match search.search(&query).await {
            Ok(results) if !results.is_empty() => {
                tracing::debug!(results = results.len(), "Planner terminology lookup");
                Some(format_lookup(&results))
            }
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Planner lookup failed, drafting without it");
                None
            }
        }
    }

    fn transcript(&self) -> String {
        match self.turns.split_first() {
            Some((first, rest)) if !rest.is_empty() => {
                let feedback = rest
                    .iter()
                    .map(|t| format!("- {}", t))
                    .collect::<Vec<_>>()
                    .join("\n");
                format!("User question:\n{}\n\nUser feedback on the plan:\n{}", first, feedback)
            }
            Some((first, _)) => format!("User question:\n{}", first),
            None => String::new(),
        }
    }
}

fn format_lookup(results: &[SearchResult]) -> String {
    let lines = results
        .iter()
        .take(MAX_LOOKUP_RESULTS)
        .map(|r| format!("- {} - {}\n  {}", r.title.trim(), r.url, r.snippet.trim()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("Documentation lookup (terminology only):\n{}", lines)
}
