//! Citation marker resolution.
//!
//! The composer emits `<cite source="src-N" />` markers. Resolution rewrites
//! each marker whose ID is registered into a markdown link and strips the rest.
//! Text outside the marker spans is left byte-identical.

use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::Serialize;

use crate::sources::{SourceRecord, SourceRegistry};

static MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<cite\s+source\s*=\s*["']?\s*([^"'\s/>]+)\s*["']?\s*/>"#).expect("valid regex")
});

/// Outcome of resolving one draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Final text.
    pub text: String,
    /// Markers rewritten into links.
    pub resolved: usize,
    /// IDs of markers that were removed, in order of appearance.
    pub stripped: Vec<String>,
}

/// Render a source as the inline citation form.
pub fn render_citation(record: &SourceRecord) -> String {
    let title = record.display_title().replace('[', "(").replace(']', ")");
    let url = record.url.replace('(', "%28").replace(')', "%29");
    format!("[{}]({})", title, url)
}

/// Resolve every marker in `draft` against `registry`.
pub fn resolve(draft: &str, registry: &SourceRegistry) -> Resolution {
    let mut resolved = 0;
    let mut stripped = Vec::new();

    let text = MARKER
        .replace_all(draft, |caps: &Captures<'_>| {
            let id = &caps[1];
            match registry.get(id) {
                Some(record) => {
                    resolved += 1;
                    render_citation(record)
                }
                None => {
                    tracing::debug!(id, "Stripping unresolvable citation");
                    stripped.push(id.to_string());
                    String::new()
                }
            }
        })
        .into_owned();

    if !stripped.is_empty() {
        tracing::warn!(
            count = stripped.len(),
            ids = ?stripped,
            "Removed citations to unknown sources"
        );
    }

    Resolution {
        text,
        resolved,
        stripped,
    }
}

/// Count raw markers remaining in `text`.
pub fn count_markers(text: &str) -> usize {
    MARKER.find_iter(text).count()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::SearchResult;

    fn registry_with(urls: &[(&str, &str)]) -> SourceRegistry {
        let mut registry = SourceRegistry::new();
        let results: Vec<SearchResult> = urls
            .iter()
            .map(|(url, title)| SearchResult {
                title: title.to_string(),
                url: url.to_string(),
                snippet: String::new(),
            })
            .collect();
        registry.record(0, &results);
        registry
    }

    #[test]
    fn test_known_and_unknown_markers() {
        let registry = registry_with(&[("https://adk.dev/sessions", "Sessions")]);
        let draft = r#"X <cite source="src-1" /> Y <cite source="src-9" /> Z"#;

        let resolution = resolve(draft, &registry);
        assert_eq!(resolution.text, "X [Sessions](https://adk.dev/sessions) Y  Z");
        assert_eq!(resolution.resolved, 1);
        assert_eq!(resolution.stripped, vec!["src-9"]);
        assert!(!resolution.text.contains("<cite"));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let registry = registry_with(&[("https://adk.dev/a", "A")]);
        let once = resolve(r#"See <cite source="src-1" />."#, &registry);
        let twice = resolve(&once.text, &registry);
        assert_eq!(once.text, twice.text);
        assert_eq!(twice.resolved, 0);
        assert!(twice.stripped.is_empty());
    }

    #[test]
    fn test_unknown_marker_leaves_surroundings_intact() {
        let registry = SourceRegistry::new();
        let draft = "alpha\n  <cite source=\"src-3\" />\n\tbeta";
        let resolution = resolve(draft, &registry);
        assert_eq!(resolution.text, "alpha\n  \n\tbeta");
    }

    #[test]
    fn test_tolerant_marker_forms() {
        let registry = registry_with(&[("https://adk.dev/a", "A")]);
        for draft in [
            "<cite source='src-1'/>",
            "<cite source=src-1 />",
            "<cite  source = \"src-1\"   />",
        ] {
            assert_eq!(resolve(draft, &registry).text, "[A](https://adk.dev/a)");
        }
    }

    #[test]
    fn test_no_markers_unchanged() {
        let registry = SourceRegistry::new();
        let text = "Plain text with <b>html</b> and [links](https://x).";
        assert_eq!(resolve(text, &registry).text, text);
    }

    #[test]
    fn test_render_escapes_brackets_and_parens() {
        let registry = registry_with(&[("https://en.wiki/Foo_(bar)", "[Draft] Foo")]);
        let rendered = render_citation(registry.get("src-1").unwrap());
        assert_eq!(rendered, "[(Draft) Foo](https://en.wiki/Foo_%28bar%29)");
    }

    #[test]
    fn test_count_markers() {
        assert_eq!(
            count_markers(r#"a <cite source="src-1" /> b <cite source="src-2" />"#),
            2
        );
    }
}
