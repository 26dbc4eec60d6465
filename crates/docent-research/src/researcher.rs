//! Initial two-phase researcher.
//!
//! Phase one searches and summarizes every RESEARCH goal in plan order.
//! Phase two builds every DELIVERABLE goal from those summaries alone; it is
//! a separate function with no search handle, so it cannot retrieve.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::RoleModel;
use crate::pipeline::{RunContext, Step, StepOutcome};
use crate::plan::{Goal, ResearchPlan};
use crate::prompts;
use crate::search::{ScopedSearch, SearchResult};
use crate::sources::{SourceCollector, SourceRegistry};
use crate::state::Producer;

/// Source iteration stamp for material found before the refinement loop.
pub const INITIAL_ITERATION: u32 = 0;

/// Summary retained for one RESEARCH goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalSummary {
    pub goal: Goal,
    pub summary: String,
}

/// Artifact produced for one DELIVERABLE goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deliverable {
    pub goal: Goal,
    pub artifact: String,
}

/// Runs the plan's research and deliverable phases.
pub struct Researcher {
    model: RoleModel,
    search: ScopedSearch,
    queries_per_goal: usize,
}

impl Researcher {
    pub fn new(model: RoleModel, search: ScopedSearch, queries_per_goal: usize) -> Self {
        Self {
            model,
            search,
            queries_per_goal: queries_per_goal.max(1),
        }
    }

    /// Generate the queries for one goal, falling back to the goal text.
    async fn generate_queries(&self, goal: &Goal) -> Result<Vec<String>> {
        let instruction = prompts::query_generation(self.search.scope().site(), self.queries_per_goal);
        let raw = self.model.invoke(&instruction, &goal.text).await?;

        match parse_query_list(&raw) {
            Some(mut queries) => {
                if queries.len() > self.queries_per_goal {
                    tracing::debug!(
                        generated = queries.len(),
                        kept = self.queries_per_goal,
                        "Truncating generated queries"
                    );
                    queries.truncate(self.queries_per_goal);
                }
                Ok(queries)
            }
            None => {
                tracing::warn!(goal = %goal.text, "Query generation unusable, searching the goal text");
                Ok(vec![goal.text.clone()])
            }
        }
    }

    async fn research_goal(&self, goal: &Goal, ctx: &mut RunContext<'_>) -> Result<GoalSummary> {
        let queries = self.generate_queries(goal).await?;
        let batch = self.search.search_all(&queries).await;
        if batch.results.is_empty() {
            tracing::warn!(goal = %goal.text, failed = batch.failed, "No search results for goal");
        }

        SourceCollector::record(&mut ctx.state, INITIAL_ITERATION, &batch.results)?;
        let labeled = label_results(ctx.state.sources(), &batch.results);

        let input = format!("Research goal: {}\n\nSearch results:\n{}", goal.text, labeled);
        let summary = self
            .model
            .invoke(&prompts::goal_summary(self.search.scope().site()), &input)
            .await?;

        Ok(GoalSummary {
            goal: goal.clone(),
            summary: summary.trim().to_string(),
        })
    }
}

#[async_trait]
impl Step for Researcher {
    fn name(&self) -> &str {
        "section_researcher"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutcome> {
        let plan = ctx.state.require_plan()?.clone();

        let mut summaries = Vec::new();
        for goal in plan.research_goals() {
            tracing::info!(goal = %goal.text, "Researching goal");
            summaries.push(self.research_goal(goal, ctx).await?);
        }

        let deliverables = produce_deliverables(&self.model, &plan, &summaries).await?;

        let findings = render_findings(&summaries, &deliverables);
        ctx.state.set_findings(Producer::Researcher, findings)?;
        Ok(StepOutcome::Continue)
    }
}

/// Build every DELIVERABLE goal from the phase-one summaries.
pub async fn produce_deliverables(
    model: &RoleModel,
    plan: &ResearchPlan,
    summaries: &[GoalSummary],
) -> Result<Vec<Deliverable>> {
    let context = render_summaries(summaries);
    let mut out = Vec::new();

    for goal in plan.deliverable_goals() {
        tracing::info!(goal = %goal.text, "Producing deliverable");
        let input = format!(
            "Deliverable goal: {}\n\nResearch summaries:\n{}",
            goal.text, context
        );
        let artifact = model.invoke(&prompts::deliverable(), &input).await?;
        out.push(Deliverable {
            goal: goal.clone(),
            artifact: artifact.trim().to_string(),
        });
    }

    Ok(out)
}

/// Parse a JSON array of query strings, tolerating code fences and prose.
pub fn parse_query_list(raw: &str) -> Option<Vec<String>> {
    let start = raw.find('[')?;
    let end = raw.rfind(']')?;
    if end <= start {
        return None;
    }

    let parsed: Vec<String> = serde_json::from_str(&raw[start..=end]).ok()?;
    let mut queries: Vec<String> = Vec::new();
    for q in parsed {
        let q = q.trim().to_string();
        if !q.is_empty() && !queries.contains(&q) {
            queries.push(q);
        }
    }

    if queries.is_empty() { None } else { Some(queries) }
}

/// Results labeled with their registry IDs, one block per result.
pub(crate) fn label_results(registry: &SourceRegistry, results: &[SearchResult]) -> String {
    let mut seen = Vec::new();
    let mut lines = Vec::new();

    for result in results {
        let Some(record) = registry.find_by_url(&result.url) else {
            continue;
        };
        if seen.contains(&record.id) {
            continue;
        }
        seen.push(record.id.clone());
        lines.push(format!(
            "[{}] {} - {}\n{}",
            record.id,
            record.display_title(),
            record.url,
            result.snippet.trim()
        ));
    }

    if lines.is_empty() {
        "(no search results)".to_string()
    } else {
        lines.join("\n\n")
    }
}

fn render_summaries(summaries: &[GoalSummary]) -> String {
    if summaries.is_empty() {
        return "(no research summaries)".to_string();
    }
    summaries
        .iter()
        .map(|s| format!("### {}\n{}", s.goal.text, s.summary))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// The findings document: all summaries, then all deliverables.
pub fn render_findings(summaries: &[GoalSummary], deliverables: &[Deliverable]) -> String {
    let mut out = String::from("## Research summaries\n");
    for s in summaries {
        out.push_str(&format!("\n### {}\n\n{}\n", s.goal, s.summary));
    }

    if !deliverables.is_empty() {
        out.push_str("\n## Deliverables\n");
        for d in deliverables {
            out.push_str(&format!("\n### {}\n\n{}\n", d.goal, d.artifact));
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::{MockSearch, SiteScope};
    use crate::state::StateStore;
    use docent_config::ModelRole;
    use docent_llm::MockBackend;
    use std::sync::Arc;

    #[test]
    fn test_parse_query_list() {
        assert_eq!(
            parse_query_list(r#"["a", "b", "a", "  "]"#),
            Some(vec!["a".to_string(), "b".to_string()])
        );
        assert_eq!(
            parse_query_list("```json\n[\"runner lifecycle\"]\n```"),
            Some(vec!["runner lifecycle".to_string()])
        );
        assert_eq!(parse_query_list("no array here"), None);
        assert_eq!(parse_query_list("[]"), None);
        assert_eq!(parse_query_list("[1, 2]"), None);
    }

    #[test]
    fn test_render_findings_order() {
        let summaries = vec![GoalSummary {
            goal: Goal::research("Analyze runners"),
            summary: "Runners drive agents.".to_string(),
        }];
        let deliverables = vec![Deliverable {
            goal: Goal::deliverable("Create a table"),
            artifact: "| a | b |".to_string(),
        }];
        let findings = render_findings(&summaries, &deliverables);

        let research_at = findings.find("Runners drive agents.").unwrap();
        let deliverable_at = findings.find("| a | b |").unwrap();
        assert!(findings.starts_with("## Research summaries"));
        assert!(research_at < deliverable_at);
        assert!(findings.contains("### [DELIVERABLE] Create a table"));

        let no_deliverables = render_findings(&summaries, &[]);
        assert!(!no_deliverables.contains("## Deliverables"));
    }

    #[tokio::test]
    async fn test_query_fallback_uses_goal_text() {
        let llm = Arc::new(MockBackend::with_texts(["not json at all", "summary"]));
        let search = Arc::new(MockSearch::echo());
        let researcher = Researcher::new(
            RoleModel::new(llm, "flash", ModelRole::Worker),
            ScopedSearch::new(search.clone(), SiteScope::new("docs.x")),
            5,
        );

        let mut ctx = RunContext::new(StateStore::new(), None);
        let summary = researcher
            .research_goal(&Goal::research("Identify tools"), &mut ctx)
            .await
            .unwrap();

        assert_eq!(summary.summary, "summary");
        assert_eq!(search.queries(), vec!["site:docs.x Identify tools"]);
        assert_eq!(ctx.state.sources().len(), 1);
    }

    #[tokio::test]
    async fn test_queries_truncated() {
        let llm = Arc::new(MockBackend::with_texts([r#"["q1", "q2", "q3"]"#, "summary"]));
        let search = Arc::new(MockSearch::new());
        let researcher = Researcher::new(
            RoleModel::new(llm.clone(), "flash", ModelRole::Worker),
            ScopedSearch::new(search.clone(), SiteScope::new("docs.x")),
            2,
        );

        let mut ctx = RunContext::new(StateStore::new(), None);
        researcher
            .research_goal(&Goal::research("Goal"), &mut ctx)
            .await
            .unwrap();

        assert_eq!(search.query_count(), 2);
        let summary_request = &llm.requests()[1];
        assert!(summary_request.messages[0].content.contains("(no search results)"));
    }

    #[test]
    fn test_label_results_uses_registry_ids() {
        let mut registry = SourceRegistry::new();
        let results = vec![
            SearchResult::new("A", "https://a.dev", "alpha"),
            SearchResult::new("A again", "https://a.dev", "alpha"),
            SearchResult::new("", "", "no url"),
        ];
        registry.record(0, &results);

        let labeled = label_results(&registry, &results);
        assert_eq!(labeled, "[src-1] A - https://a.dev\nalpha");
    }
}
