//! Section planner: plan → report outline.

use async_trait::async_trait;

use crate::error::Result;
use crate::model::RoleModel;
use crate::pipeline::{RunContext, Step, StepOutcome};
use crate::prompts;
use crate::state::{Producer, StateKey};

pub struct SectionPlanner {
    model: RoleModel,
}

impl SectionPlanner {
    pub fn new(model: RoleModel) -> Self {
        Self { model }
    }
}

#[async_trait]
impl Step for SectionPlanner {
    fn name(&self) -> &str {
        "section_planner"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutcome> {
        ctx.state.require_plan()?;
        let input = ctx.state.snapshot(&[StateKey::ResearchPlan]).to_string();
        let outline = self.model.invoke(&prompts::section_planner(), &input).await?;

        let outline = outline.trim().to_string();
        tracing::debug!(
            headings = outline.lines().filter(|l| l.starts_with('#')).count(),
            "Report outline ready"
        );
        ctx.state.set_report_sections(Producer::SectionPlanner, outline)?;
        Ok(StepOutcome::Continue)
    }
}
