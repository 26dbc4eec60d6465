//! Per-run shared state.
//!
//! Each stage reads the keys it needs and writes only the keys it owns.
//! Ownership is enforced at write time: a write by a producer that is not
//! listed for the key fails with [`StateError::UnauthorizedWriter`].

use std::fmt;

use serde_json::{Map, Value};

use crate::error::StateError;
use crate::evaluator::Feedback;
use crate::plan::ResearchPlan;
use crate::sources::SourceRegistry;

/// Named slots of the run state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKey {
    ResearchPlan,
    ReportSections,
    SectionResearchFindings,
    ResearchEvaluation,
    Sources,
    FinalCitedReport,
}

impl StateKey {
    /// Key name as it appears in prompts.
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKey::ResearchPlan => "research_plan",
            StateKey::ReportSections => "report_sections",
            StateKey::SectionResearchFindings => "section_research_findings",
            StateKey::ResearchEvaluation => "research_evaluation",
            StateKey::Sources => "sources",
            StateKey::FinalCitedReport => "final_cited_report",
        }
    }

    /// Producers allowed to write this key.
    pub fn writers(&self) -> &'static [Producer] {
        match self {
            StateKey::ResearchPlan => &[Producer::Planner],
            StateKey::ReportSections => &[Producer::SectionPlanner],
            StateKey::SectionResearchFindings => {
                &[Producer::Researcher, Producer::RefinementSearcher]
            }
            StateKey::ResearchEvaluation => &[Producer::Evaluator],
            StateKey::Sources => &[Producer::SourceCollector],
            StateKey::FinalCitedReport => &[Producer::Composer],
        }
    }
}

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity of a state writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Producer {
    Planner,
    SectionPlanner,
    Researcher,
    Evaluator,
    RefinementSearcher,
    SourceCollector,
    Composer,
}

impl Producer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Producer::Planner => "planner",
            Producer::SectionPlanner => "section_planner",
            Producer::Researcher => "researcher",
            Producer::Evaluator => "evaluator",
            Producer::RefinementSearcher => "refinement_searcher",
            Producer::SourceCollector => "source_collector",
            Producer::Composer => "composer",
        }
    }
}

impl fmt::Display for Producer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn authorize(key: StateKey, producer: Producer) -> Result<(), StateError> {
    if key.writers().contains(&producer) {
        Ok(())
    } else {
        Err(StateError::UnauthorizedWriter {
            key: key.as_str().to_string(),
            writer: producer.as_str().to_string(),
        })
    }
}

/// Typed key-value store scoped to one research run.
#[derive(Debug, Default)]
pub struct StateStore {
    plan: Option<ResearchPlan>,
    report_sections: Option<String>,
    findings: Option<String>,
    evaluation: Option<Feedback>,
    sources: SourceRegistry,
    final_report: Option<String>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Writes ──────────────────────────────────────────────────────────

    pub fn set_plan(&mut self, producer: Producer, plan: ResearchPlan) -> Result<(), StateError> {
        authorize(StateKey::ResearchPlan, producer)?;
        self.plan = Some(plan);
        Ok(())
    }

    pub fn set_report_sections(
        &mut self,
        producer: Producer,
        outline: String,
    ) -> Result<(), StateError> {
        authorize(StateKey::ReportSections, producer)?;
        self.report_sections = Some(outline);
        Ok(())
    }

    pub fn set_findings(&mut self, producer: Producer, findings: String) -> Result<(), StateError> {
        authorize(StateKey::SectionResearchFindings, producer)?;
        self.findings = Some(findings);
        Ok(())
    }

    pub fn set_evaluation(
        &mut self,
        producer: Producer,
        feedback: Feedback,
    ) -> Result<(), StateError> {
        authorize(StateKey::ResearchEvaluation, producer)?;
        self.evaluation = Some(feedback);
        Ok(())
    }

    /// Mutable access to the source registry.
    pub fn sources_mut(&mut self, producer: Producer) -> Result<&mut SourceRegistry, StateError> {
        authorize(StateKey::Sources, producer)?;
        Ok(&mut self.sources)
    }

    pub fn set_final_report(
        &mut self,
        producer: Producer,
        report: String,
    ) -> Result<(), StateError> {
        authorize(StateKey::FinalCitedReport, producer)?;
        self.final_report = Some(report);
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────────────

    pub fn plan(&self) -> Option<&ResearchPlan> {
        self.plan.as_ref()
    }

    pub fn report_sections(&self) -> Option<&str> {
        self.report_sections.as_deref()
    }

    pub fn findings(&self) -> Option<&str> {
        self.findings.as_deref()
    }

    pub fn evaluation(&self) -> Option<&Feedback> {
        self.evaluation.as_ref()
    }

    pub fn sources(&self) -> &SourceRegistry {
        &self.sources
    }

    pub fn final_report(&self) -> Option<&str> {
        self.final_report.as_deref()
    }

    /// Read a required key, failing if it has not been written.
    pub fn require_plan(&self) -> Result<&ResearchPlan, StateError> {
        self.plan
            .as_ref()
            .ok_or_else(|| StateError::Missing(StateKey::ResearchPlan.to_string()))
    }

    pub fn require_findings(&self) -> Result<&str, StateError> {
        self.findings
            .as_deref()
            .ok_or_else(|| StateError::Missing(StateKey::SectionResearchFindings.to_string()))
    }

    pub fn require_evaluation(&self) -> Result<&Feedback, StateError> {
        self.evaluation
            .as_ref()
            .ok_or_else(|| StateError::Missing(StateKey::ResearchEvaluation.to_string()))
    }

    /// JSON view of the requested keys for prompt context. Absent keys are skipped.
    pub fn snapshot(&self, keys: &[StateKey]) -> Value {
        let mut map = Map::new();
        for key in keys {
            let value = match key {
                StateKey::ResearchPlan => self.plan.as_ref().map(|p| Value::String(p.render())),
                StateKey::ReportSections => self.report_sections.clone().map(Value::String),
                StateKey::SectionResearchFindings => self.findings.clone().map(Value::String),
                StateKey::ResearchEvaluation => self
                    .evaluation
                    .as_ref()
                    .and_then(|f| serde_json::to_value(f).ok()),
                StateKey::Sources => Some(self.sources.to_context()),
                StateKey::FinalCitedReport => self.final_report.clone().map(Value::String),
            };
            if let Some(value) = value {
                map.insert(key.as_str().to_string(), value);
            }
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Grade;
    use crate::plan::Goal;

    #[test]
    fn test_owner_can_write() {
        let mut state = StateStore::new();
        state
            .set_findings(Producer::Researcher, "## Research summaries".to_string())
            .unwrap();
        state
            .set_findings(Producer::RefinementSearcher, "updated".to_string())
            .unwrap();
        assert_eq!(state.findings(), Some("updated"));
    }

    #[test]
    fn test_non_owner_write_rejected() {
        let mut state = StateStore::new();
        let err = state
            .set_findings(Producer::Evaluator, "nope".to_string())
            .unwrap_err();
        assert_eq!(
            err,
            StateError::UnauthorizedWriter {
                key: "section_research_findings".to_string(),
                writer: "evaluator".to_string(),
            }
        );
        assert!(state.findings().is_none());

        assert!(state.sources_mut(Producer::Researcher).is_err());
        assert!(state.set_final_report(Producer::Researcher, String::new()).is_err());
        assert!(
            state
                .set_plan(Producer::Composer, ResearchPlan::default())
                .is_err()
        );
    }

    #[test]
    fn test_require_missing() {
        let state = StateStore::new();
        assert_eq!(
            state.require_plan().unwrap_err(),
            StateError::Missing("research_plan".to_string())
        );
        assert!(state.require_findings().is_err());
    }

    #[test]
    fn test_snapshot_renders_present_keys() {
        let mut state = StateStore::new();
        state
            .set_plan(
                Producer::Planner,
                ResearchPlan::new(vec![Goal::research("Analyze runners")]),
            )
            .unwrap();
        state
            .set_evaluation(
                Producer::Evaluator,
                Feedback {
                    grade: Grade::Pass,
                    comment: "ok".to_string(),
                    follow_up_queries: None,
                },
            )
            .unwrap();

        let snap = state.snapshot(&[
            StateKey::ResearchPlan,
            StateKey::ReportSections,
            StateKey::ResearchEvaluation,
        ]);
        assert_eq!(snap["research_plan"], "- [RESEARCH] Analyze runners");
        assert!(snap.get("report_sections").is_none());
        assert_eq!(snap["research_evaluation"]["grade"], "pass");
        assert!(state.evaluation().is_some());
        assert!(state.report_sections().is_none());
        assert!(state.sources().is_empty());
    }
}
