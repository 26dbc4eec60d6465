//! Escalation checker: the refinement loop's exit gate.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::Result;
use crate::evaluator::Feedback;
use crate::pipeline::{RunContext, Step, StepOutcome};

/// Why the refinement loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The evaluator graded the findings "pass".
    Passed,
    /// The iteration cap was reached without a pass.
    BudgetExhausted,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Passed => write!(f, "passed"),
            ExitReason::BudgetExhausted => write!(f, "iteration budget exhausted"),
        }
    }
}

/// Checker verdict for one iteration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Continue,
    Stop(ExitReason),
}

/// Stops on a passing grade or once `completed` iterations reach the cap.
#[derive(Debug, Clone, Copy)]
pub struct EscalationChecker {
    max_iterations: u32,
}

impl EscalationChecker {
    pub fn new(max_iterations: u32) -> Self {
        Self { max_iterations }
    }

    /// `completed` counts iterations finished before the current one.
    pub fn check(&self, feedback: &Feedback, completed: u32) -> Decision {
        if feedback.is_pass() {
            Decision::Stop(ExitReason::Passed)
        } else if completed >= self.max_iterations {
            Decision::Stop(ExitReason::BudgetExhausted)
        } else {
            Decision::Continue
        }
    }
}

#[async_trait]
impl Step for EscalationChecker {
    fn name(&self) -> &str {
        "escalation_checker"
    }

    async fn run(&self, ctx: &mut RunContext<'_>) -> Result<StepOutcome> {
        let feedback = ctx.state.require_evaluation()?;
        match self.check(feedback, ctx.loop_iteration) {
            Decision::Continue => {
                tracing::debug!(
                    iteration = ctx.current_iteration(),
                    "Research failed evaluation, continuing"
                );
                Ok(StepOutcome::Continue)
            }
            Decision::Stop(reason) => {
                tracing::info!(
                    iteration = ctx.current_iteration(),
                    reason = %reason,
                    "Escalating out of refinement loop"
                );
                Ok(StepOutcome::Escalate(reason))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pass_stops() {
        let checker = EscalationChecker::new(3);
        assert_eq!(
            checker.check(&Feedback::pass("ok"), 0),
            Decision::Stop(ExitReason::Passed)
        );
    }

    #[test]
    fn test_fail_continues_below_cap() {
        let checker = EscalationChecker::new(3);
        let fail = Feedback::fail("gaps", ["q"]);
        assert_eq!(checker.check(&fail, 0), Decision::Continue);
        assert_eq!(checker.check(&fail, 2), Decision::Continue);
    }

    #[test]
    fn test_fail_stops_at_cap() {
        let checker = EscalationChecker::new(2);
        assert_eq!(
            checker.check(&Feedback::fail("gaps", ["q"]), 2),
            Decision::Stop(ExitReason::BudgetExhausted)
        );
    }

    #[test]
    fn test_pass_wins_over_cap() {
        let checker = EscalationChecker::new(1);
        assert_eq!(
            checker.check(&Feedback::pass("ok"), 5),
            Decision::Stop(ExitReason::Passed)
        );
    }
}
