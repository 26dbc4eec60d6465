//! Report composer with the citation-resolution finalization hook.

use async_trait::async_trait;

use crate::citations;
use crate::error::Result;
use crate::model::RoleModel;
use crate::pipeline::{RunContext, Step, StepOutcome};
use crate::prompts;
use crate::state::{Producer, StateKey};

/// Drafts the report, then resolves its citation markers.
pub struct ReportComposer {
    model: RoleModel,
}

impl ReportComposer {
    pub fn new(model: RoleModel) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for ReportComposer {
    fn name(&self) -> &str {
        "report_composer"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutcome> {
        ctx.state.require_findings()?;
        let input = serde_json::to_string_pretty(&ctx.state.snapshot(&[
            StateKey::ResearchPlan,
            StateKey::SectionResearchFindings,
            StateKey::Sources,
            StateKey::ReportSections,
        ]))
        .unwrap_or_default();

        let draft = self.model.invoke(&prompts::composer(), &input).await?;
        let markers = citations::count_markers(&draft);

        let resolution = citations::resolve(&draft, ctx.state.sources());
        tracing::info!(
            markers,
            resolved = resolution.resolved,
            stripped = resolution.stripped.len(),
            "Citations resolved"
        );

        ctx.citations_resolved = resolution.resolved;
        ctx.citations_stripped = resolution.stripped;
        ctx.state.set_final_report(Producer::Composer, resolution.text)?;
        Ok(StepOutcome::Continue)
    }
}
