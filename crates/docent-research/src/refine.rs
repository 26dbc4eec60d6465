//! Refinement searcher: runs the evaluator's follow-up queries.
//!
//! New material is synthesized separately and appended under a
//! `### Refinement pass N` heading, so earlier findings are never rewritten.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::RoleModel;
use crate::pipeline::{RunContext, Step, StepOutcome};
use crate::prompts;
use crate::researcher::label_results;
use crate::search::ScopedSearch;
use crate::sources::SourceCollector;
use crate::state::Producer;

/// Executes follow-up queries and extends the findings.
pub struct RefinementSearcher {
    model: RoleModel,
    search: ScopedSearch,
    max_queries: usize,
}

impl RefinementSearcher {
    pub fn new(model: RoleModel, search: ScopedSearch, max_queries: usize) -> Self {
        Self {
            model,
            search,
            max_queries: max_queries.max(1),
        }
    }
}

/// Append one refinement pass to prior findings. `prior` is kept byte for byte.
pub fn append_pass(prior: &str, iteration: u32, material: &str) -> String {
    let separator = if prior.is_empty() || prior.ends_with("\n\n") {
        ""
    } else if prior.ends_with('\n') {
        "\n"
    } else {
        "\n\n"
    };
    format!(
        "{}{}### Refinement pass {}\n\n{}",
        prior,
        separator,
        iteration,
        material.trim()
    )
}

#[async_trait]
impl Step for RefinementSearcher {
    fn name(&self) -> &str {
        "refinement_searcher"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutcome> {
        let feedback = ctx.state.require_evaluation()?.clone();
        let prior = ctx.state.require_findings()?.to_string();
        let iteration = ctx.current_iteration();

        let mut queries = feedback.queries();
        if queries.len() > self.max_queries {
            tracing::warn!(
                requested = queries.len(),
                limit = self.max_queries,
                dropped = ?&queries[self.max_queries..],
                "Dropping follow-up queries over the limit"
            );
            queries.truncate(self.max_queries);
        }

        let batch = self.search.search_all(&queries).await;
        tracing::info!(
            iteration,
            queries = queries.len(),
            results = batch.results.len(),
            failed = batch.failed,
            "Refinement searches complete"
        );

        SourceCollector::record(&mut ctx.state, iteration, &batch.results)?;
        let labeled = label_results(ctx.state.sources(), &batch.results);

        let query_list = queries
            .iter()
            .map(|q| format!("- {}", q))
            .collect::<Vec<_>>()
            .join("\n");
        let input = format!(
            "Evaluator feedback:\n{}\n\nFollow-up queries:\n{}\n\nExisting findings:\n{}\n\nNew search results:\n{}",
            feedback.comment, query_list, prior, labeled
        );

        let material = self
            .model
            .invoke(&prompts::refinement(self.search.scope().site()), &input)
            .await?;

        ctx.state.set_findings(
            Producer::RefinementSearcher,
            append_pass(&prior, iteration, &material),
        )?;
        Ok(StepOutcome::Continue)
    }
}
