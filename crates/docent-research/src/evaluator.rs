//! Research evaluator: grades the findings and asks for follow-up queries.
//!
//! The critic model answers under a strict JSON schema. Its output is then
//! validated here in three steps (JSON, shape, grade/queries invariant) so an
//! invalid verdict never reaches the escalation checker.

use async_trait::async_trait;
use docent_llm::ResponseFormat;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SchemaError};
use crate::model::RoleModel;
use crate::pipeline::{ResearchProgress, RunContext, Step, StepOutcome};
use crate::prompts;
use crate::state::{Producer, StateKey};

/// Name of the schema sent to the model.
pub const FEEDBACK_SCHEMA_NAME: &str = "Feedback";

/// Evaluation result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Grade {
    Pass,
    Fail,
}

impl std::fmt::Display for Grade {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Grade::Pass => write!(f, "pass"),
            Grade::Fail => write!(f, "fail"),
        }
    }
}

/// A specific, targeted follow-up search query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct FollowUpQuery {
    /// A narrow query that deepens coverage of the existing topic.
    pub search_query: String,
}

/// Evaluation feedback on research quality.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Feedback {
    /// "pass" if the research is sufficient, "fail" if it needs another pass.
    pub grade: Grade,
    /// What is strong or missing in the findings.
    pub comment: String,
    /// Queries that fill the gaps. Null or empty when the grade is "pass".
    #[serde(default)]
    pub follow_up_queries: Option<Vec<FollowUpQuery>>,
}

impl Feedback {
    /// A passing verdict.
    pub fn pass(comment: impl Into<String>) -> Self {
        Self {
            grade: Grade::Pass,
            comment: comment.into(),
            follow_up_queries: None,
        }
    }

    /// A failing verdict with follow-up queries.
    pub fn fail<I, S>(comment: impl Into<String>, queries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            grade: Grade::Fail,
            comment: comment.into(),
            follow_up_queries: Some(
                queries
                    .into_iter()
                    .map(|q| FollowUpQuery {
                        search_query: q.into(),
                    })
                    .collect(),
            ),
        }
    }

    /// JSON schema for strict structured output.
    pub fn schema() -> serde_json::Value {
        let mut schema = serde_json::to_value(schemars::schema_for!(Feedback))
            .unwrap_or_else(|_| serde_json::json!({ "type": "object" }));
        if let Some(obj) = schema.as_object_mut() {
            obj.remove("$schema");
        }
        schema
    }

    /// Response format requesting this schema.
    pub fn response_format() -> ResponseFormat {
        ResponseFormat::json_schema(FEEDBACK_SCHEMA_NAME, Self::schema())
    }

    /// Validate raw model output. Only surrounding whitespace is tolerated.
    pub fn parse(raw: &str) -> std::result::Result<Self, SchemaError> {
        let value: serde_json::Value = serde_json::from_str(raw.trim())
            .map_err(|e| SchemaError::InvalidJson(e.to_string()))?;
        let feedback: Feedback = serde_json::from_value(value)
            .map_err(|e| SchemaError::ShapeMismatch(e.to_string()))?;
        feedback.validate()?;
        Ok(feedback)
    }

    /// Check the grade/queries invariant.
    pub fn validate(&self) -> std::result::Result<(), SchemaError> {
        let queries = self.follow_up_queries.as_deref().unwrap_or_default();
        if queries.iter().any(|q| q.search_query.trim().is_empty()) {
            return Err(SchemaError::ShapeMismatch(
                "follow_up_queries contains an empty search_query".to_string(),
            ));
        }
        match self.grade {
            Grade::Fail if queries.is_empty() => Err(SchemaError::MissingFollowUps),
            Grade::Pass if !queries.is_empty() => {
                Err(SchemaError::UnexpectedFollowUps(queries.len()))
            }
            _ => Ok(()),
        }
    }

    pub fn is_pass(&self) -> bool {
        self.grade == Grade::Pass
    }

    /// Follow-up query strings in order.
    pub fn queries(&self) -> Vec<String> {
        self.follow_up_queries
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|q| q.search_query.trim().to_string())
            .collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Pipeline step
// ─────────────────────────────────────────────────────────────────────────────

/// Follow-up range asked for when no query budget is configured.
pub const DEFAULT_MIN_FOLLOW_UPS: usize = 5;
pub const DEFAULT_MAX_FOLLOW_UPS: usize = 7;

/// Grades `section_research_findings` with the critic model.
pub struct ResearchEvaluator {
    model: RoleModel,
    min_follow_ups: usize,
    max_follow_ups: usize,
}

impl ResearchEvaluator {
    pub fn new(model: RoleModel) -> Self {
        Self {
            model,
            min_follow_ups: DEFAULT_MIN_FOLLOW_UPS,
            max_follow_ups: DEFAULT_MAX_FOLLOW_UPS,
        }
    }

    /// Bounds asked of the model for the follow-up list.
    pub fn with_follow_up_range(mut self, min: usize, max: usize) -> Self {
        self.min_follow_ups = min.min(max);
        self.max_follow_ups = max;
        self
    }
}

#[async_trait]
impl Step for ResearchEvaluator {
    fn name(&self) -> &str {
        "research_evaluator"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutcome> {
        ctx.state.require_findings()?;
        let input = ctx
            .state
            .snapshot(&[StateKey::ResearchPlan, StateKey::SectionResearchFindings])
            .to_string();

        let instruction =
            prompts::evaluator(&prompts::today(), self.min_follow_ups, self.max_follow_ups);
        let raw = self
            .model
            .invoke_structured(&instruction, &input, Feedback::response_format())
            .await?;

        let feedback = Feedback::parse(&raw).inspect_err(|e| {
            tracing::error!(error = %e, raw = %raw, "Evaluator output failed validation");
        })?;

        let iteration = ctx.current_iteration();
        tracing::info!(
            iteration,
            grade = %feedback.grade,
            follow_ups = feedback.queries().len(),
            "Research evaluated"
        );
        ctx.emit(ResearchProgress::Evaluated {
            iteration,
            grade: feedback.grade,
            comment: feedback.comment.clone(),
        });

        ctx.state.set_evaluation(Producer::Evaluator, feedback)?;
        Ok(StepOutcome::Continue)
    }
}
