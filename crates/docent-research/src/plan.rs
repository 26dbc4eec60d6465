//! Research plan model and its markdown wire format.
//!
//! A plan is a bullet list, one goal per bullet, prefixed by bracketed tags:
//!
//! ```text
//! - [RESEARCH] Analyze how sessions persist state
//! - [RESEARCH][MODIFIED] Identify the callback hooks on agents
//! - [DELIVERABLE][IMPLIED] Create a comparison table of session services
//! ```

use std::collections::BTreeSet;
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PlanError;

static BULLET: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:[-*+•]|\d+[.)])\s+(.+?)\s*$").expect("valid regex"));

static LEADING_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[*_`\s]*\[([A-Za-z]+)\][*_`]*").expect("valid regex"));

/// What a goal asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GoalKind {
    /// Information gathering; requires searches.
    Research,
    /// Synthesis of an artifact from research summaries; no searches.
    Deliverable,
}

impl GoalKind {
    fn tag(&self) -> &'static str {
        match self {
            GoalKind::Research => "RESEARCH",
            GoalKind::Deliverable => "DELIVERABLE",
        }
    }
}

/// Revision status markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatusTag {
    Modified,
    New,
    Implied,
}

impl StatusTag {
    fn tag(&self) -> &'static str {
        match self {
            StatusTag::Modified => "MODIFIED",
            StatusTag::New => "NEW",
            StatusTag::Implied => "IMPLIED",
        }
    }
}

enum Tag {
    Kind(GoalKind),
    Status(StatusTag),
}

fn parse_tag(word: &str) -> Option<Tag> {
    match word.to_ascii_uppercase().as_str() {
        "RESEARCH" => Some(Tag::Kind(GoalKind::Research)),
        "DELIVERABLE" => Some(Tag::Kind(GoalKind::Deliverable)),
        "NEW" => Some(Tag::Status(StatusTag::New)),
        "MODIFIED" => Some(Tag::Status(StatusTag::Modified)),
        "IMPLIED" => Some(Tag::Status(StatusTag::Implied)),
        _ => None,
    }
}

/// One element of a research plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Goal {
    pub kind: GoalKind,
    pub status_tags: BTreeSet<StatusTag>,
    pub text: String,
}

impl Goal {
    /// A research goal without status tags.
    pub fn research(text: impl Into<String>) -> Self {
        Self {
            kind: GoalKind::Research,
            status_tags: BTreeSet::new(),
            text: text.into(),
        }
    }

    /// A deliverable goal without status tags.
    pub fn deliverable(text: impl Into<String>) -> Self {
        Self {
            kind: GoalKind::Deliverable,
            status_tags: BTreeSet::new(),
            text: text.into(),
        }
    }

    /// Add a status tag.
    pub fn with_tag(mut self, tag: StatusTag) -> Self {
        self.status_tags.insert(tag);
        self
    }

    /// Parse one bullet's content (the part after the bullet marker).
    fn parse_item(item: &str) -> Option<Self> {
        let mut rest = item;
        let mut kind = None;
        let mut status_tags = BTreeSet::new();

        while let Some(caps) = LEADING_TAG.captures(rest) {
            let Some(tag) = parse_tag(&caps[1]) else {
                break;
            };
            match tag {
                Tag::Kind(k) => {
                    kind.get_or_insert(k);
                }
                Tag::Status(s) => {
                    status_tags.insert(s);
                }
            }
            rest = &rest[caps.get(0).map_or(0, |m| m.end())..];
        }

        let text = rest
            .trim()
            .trim_start_matches([':', '-'])
            .trim()
            .to_string();
        if text.is_empty() {
            return None;
        }

        Some(Self {
            kind: kind.unwrap_or(GoalKind::Research),
            status_tags,
            text,
        })
    }

    fn normalized_text(&self) -> String {
        self.text
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind.tag())?;
        for tag in &self.status_tags {
            write!(f, "[{}]", tag.tag())?;
        }
        write!(f, " {}", self.text)
    }
}

/// An ordered list of goals.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub goals: Vec<Goal>,
}

impl ResearchPlan {
    pub fn new(goals: Vec<Goal>) -> Self {
        Self { goals }
    }

    /// Parse a markdown bullet list. Non-bullet lines are ignored.
    pub fn parse(text: &str) -> Result<Self, PlanError> {
        let goals: Vec<Goal> = text
            .lines()
            .filter_map(|line| BULLET.captures(line))
            .filter_map(|caps| Goal::parse_item(&caps[1]))
            .collect();

        if goals.is_empty() {
            return Err(PlanError::Empty);
        }
        Ok(Self { goals })
    }

    /// Render as the markdown bullet list that [`ResearchPlan::parse`] reads.
    pub fn render(&self) -> String {
        self.goals
            .iter()
            .map(|g| format!("- {}", g))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// RESEARCH goals in plan order.
    pub fn research_goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter().filter(|g| g.kind == GoalKind::Research)
    }

    /// DELIVERABLE goals in plan order.
    pub fn deliverable_goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.iter().filter(|g| g.kind == GoalKind::Deliverable)
    }

    pub fn len(&self) -> usize {
        self.goals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.goals.is_empty()
    }

    /// Tag as NEW every goal whose text did not appear in `previous` and
    /// which carries no status tag. Returns how many goals were tagged.
    pub fn reconcile_tags(&mut self, previous: &ResearchPlan) -> usize {
        let known: BTreeSet<String> = previous.goals.iter().map(Goal::normalized_text).collect();
        let mut tagged = 0;
        for goal in &mut self.goals {
            if goal.status_tags.is_empty() && !known.contains(&goal.normalized_text()) {
                goal.status_tags.insert(StatusTag::New);
                tagged += 1;
            }
        }
        tagged
    }
}

impl fmt::Display for ResearchPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"Here is the plan:

- [RESEARCH] Analyze how `Runner` drives an agent invocation.
- [RESEARCH] Identify the session services available.
* [research][modified] Investigate callback hooks.
1. [DELIVERABLE][IMPLIED] Create a comparison table of session services.
- **[DELIVERABLE]** Compile a summary of callbacks.

Let me know if you want changes."#;

    #[test]
    fn test_parse_sample() {
        let plan = ResearchPlan::parse(SAMPLE).unwrap();
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.research_goals().count(), 3);
        assert_eq!(plan.deliverable_goals().count(), 2);

        let modified = &plan.goals[2];
        assert!(modified.status_tags.contains(&StatusTag::Modified));
        assert_eq!(modified.text, "Investigate callback hooks.");

        let implied = &plan.goals[3];
        assert_eq!(implied.kind, GoalKind::Deliverable);
        assert!(implied.status_tags.contains(&StatusTag::Implied));

        assert_eq!(plan.goals[4].text, "Compile a summary of callbacks.");
    }

    #[test]
    fn test_untagged_bullet_defaults_to_research() {
        let plan = ResearchPlan::parse("- Explore memory services").unwrap();
        assert_eq!(plan.goals[0].kind, GoalKind::Research);
        assert!(plan.goals[0].status_tags.is_empty());
    }

    #[test]
    fn test_unknown_tag_stays_in_text() {
        let plan = ResearchPlan::parse("- [RESEARCH] [Optional] Check tools").unwrap();
        assert_eq!(plan.goals[0].text, "[Optional] Check tools");
    }

    #[test]
    fn test_empty_plan_is_error() {
        assert_eq!(ResearchPlan::parse("no bullets here"), Err(PlanError::Empty));
        assert_eq!(ResearchPlan::parse("- [RESEARCH]"), Err(PlanError::Empty));
    }

    #[test]
    fn test_render_then_parse_preserves_goals() {
        let plan = ResearchPlan::new(vec![
            Goal::research("Analyze runners"),
            Goal::deliverable("Create a table").with_tag(StatusTag::Implied),
        ]);
        let rendered = plan.render();
        assert_eq!(
            rendered,
            "- [RESEARCH] Analyze runners\n- [DELIVERABLE][IMPLIED] Create a table"
        );
        assert_eq!(ResearchPlan::parse(&rendered).unwrap(), plan);
    }

    #[test]
    fn test_reconcile_tags_marks_untagged_new_goals() {
        let previous = ResearchPlan::new(vec![
            Goal::research("Analyze runners"),
            Goal::research("Identify session services"),
        ]);
        let mut revised = ResearchPlan::new(vec![
            Goal::research("Analyze  runners"),
            Goal::research("Identify session services").with_tag(StatusTag::Modified),
            Goal::research("Investigate artifact storage"),
            Goal::deliverable("Summarize artifacts").with_tag(StatusTag::Implied),
        ]);

        let tagged = revised.reconcile_tags(&previous);
        assert_eq!(tagged, 1);
        assert!(revised.goals[0].status_tags.is_empty());
        assert!(revised.goals[2].status_tags.contains(&StatusTag::New));
        assert!(!revised.goals[3].status_tags.contains(&StatusTag::New));
    }
}
