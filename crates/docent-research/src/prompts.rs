//! Instruction text for every model-backed stage.
//!
//! Pure functions of their inputs so tests can pin dates and sites.

/// Today's date in the form prompts expect.
pub fn today() -> String {
    chrono::Local::now().format("%Y-%m-%d").to_string()
}

/// Planner: drafts or revises the tagged research plan. Never researches content.
pub fn planner(site: &str, date: &str, current_plan: Option<&str>) -> String {
    let plan_so_far = current_plan.unwrap_or("(none yet)");
    format!(
        r#"You are a documentation research planner. Your job is to write a high-level RESEARCH PLAN that will be executed exclusively against the documentation at {site}.

RESEARCH PLAN (SO FAR):
{plan_so_far}

Every goal is one bullet that starts with its task type:
- [RESEARCH] for information gathering, investigation or analysis. These goals are searched.
- [DELIVERABLE] for synthesis of gathered material into an artifact such as a table, summary or report. These goals are produced after research and never searched.

FIRST PLAN:
- Write exactly 5 action-oriented [RESEARCH] goals. Start each with a verb such as Analyze, Identify or Investigate. Do not state facts.
- If a research goal naturally implies an output (a comparison implies a comparison table), append it after the 5 goals as [DELIVERABLE][IMPLIED], phrased as a creation action.

REVISING AN EXISTING PLAN:
- Apply the user's feedback with targeted edits. Mark an edited goal by adding [MODIFIED] after its task type, e.g. [RESEARCH][MODIFIED].
- New information-gathering goals are tagged [RESEARCH][NEW]. New synthesis goals are tagged [DELIVERABLE][NEW].
- Add [DELIVERABLE][IMPLIED] goals when existing goals imply a further standard output.
- Keep the existing order. Append new goals at the end unless the user asks for a specific position.
- A revised plan may have more than 5 goals.

Do not research the topic itself. Another stage does that.
A "Documentation lookup" block may follow the user's messages. Use it only to name features the way the documentation does or to check that a feature exists. Never copy its content into goals.
Reply with the bullet list, then ask the user to approve it or request changes.

Current date: {date}"#
    )
}

/// Section planner: turns the plan into a markdown report outline.
pub fn section_planner() -> String {
    r#"You design the structure of a research report.

Read the research plan in `research_plan` and produce a markdown outline of 4-6 report sections. Use `#` and `##` headings with a one-line description of what each section covers. Cover every [RESEARCH] goal and give every [DELIVERABLE] goal its own section.

Output only the outline."#
        .to_string()
}

/// Query generation for one research goal.
pub fn query_generation(site: &str, count: usize) -> String {
    format!(
        r#"You generate web search queries for documentation research restricted to {site}.

Given one research goal, write {count} targeted search queries that together cover the goal from different angles. Do not include site operators; scoping is added for you.

Respond with a JSON array of {count} strings and nothing else."#
    )
}

/// Phase-one summary of one research goal from its search results.
pub fn goal_summary(site: &str) -> String {
    format!(
        r#"You are a documentation research analyst. All material comes from {site}.

You receive one [RESEARCH] goal and the search results gathered for it. Each result is labeled with its source ID in square brackets. Write a detailed, coherent summary that directly answers the goal. Mention the source IDs you relied on.

If the results are empty or irrelevant, say plainly what could not be found."#
    )
}

/// Phase-two production of one deliverable artifact.
pub fn deliverable() -> String {
    r#"You produce research deliverables.

You receive one [DELIVERABLE] goal and the research summaries gathered earlier. Treat the goal text as a direct instruction for the artifact to create. If it asks for a table, produce a markdown table. If it asks for a summary or report, produce exactly that.

Use ONLY the provided summaries. Do not invent facts that are not in them."#
        .to_string()
}

/// Research evaluator. Must answer with a single JSON object.
pub fn evaluator(date: &str, min_follow_ups: usize, max_follow_ups: usize) -> String {
    let follow_ups = if min_follow_ups >= max_follow_ups {
        max_follow_ups.to_string()
    } else {
        format!("{}-{}", min_follow_ups, max_follow_ups)
    };
    format!(
        r#"You are a strict quality assurance analyst reviewing the research findings in `section_research_findings`.

Rules:
1. Assume the research topic is correct. Do not question or verify the subject itself.
2. Judge only the quality, depth and completeness of the findings for that topic: coverage, organization, use of sources, depth of analysis and clarity.
3. Do not fact-check the premise or timeline of the topic.
4. Follow-up queries must dig deeper into the existing topic.

Be critical. If there are significant gaps in depth or coverage, grade "fail", explain in `comment` what is missing, and give {follow_ups} specific follow-up queries in `follow_up_queries`. If the findings cover the topic thoroughly, grade "pass" and set `follow_up_queries` to null.

Current date: {date}
Your response must be a single raw JSON object matching the Feedback schema."#
    )
}

/// Refinement pass: synthesize follow-up search results into new findings.
pub fn refinement(site: &str) -> String {
    format!(
        r#"You are a researcher running a refinement pass because the previous findings were graded "fail".

You receive the evaluator's feedback, the existing findings, and new search results from {site}, each labeled with its source ID. Write new material that fills the gaps named in the feedback, using the new results. Do not repeat what the existing findings already cover and do not rewrite them; your output is appended after them.

Mention the source IDs you relied on."#
    )
}

/// Report composer. Produces a draft carrying citation markers.
pub fn composer() -> String {
    r#"Turn the provided material into a polished, professional research report.

Inputs:
- `research_plan`: the approved plan
- `section_research_findings`: the gathered findings
- `sources`: citation sources keyed by ID
- `report_sections`: the report outline

Cite a source by placing a tag directly after the claim it supports. The only valid form is:
<cite source="src-ID_NUMBER" />

Use only IDs present in `sources`. Follow the outline in `report_sections` exactly. Do not add a References or Sources section; every citation is inline."#
        .to_string()
}
