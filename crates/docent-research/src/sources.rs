//! Run-scoped citation source registry.
//!
//! Every search result is offered to the registry; the first sighting of a URL
//! allocates the next `src-N` ID, later sightings are ignored. IDs are never
//! reused or reassigned.

use std::collections::HashMap;

use serde::Serialize;

use crate::error::StateError;
use crate::search::SearchResult;
use crate::state::{Producer, StateStore};

/// Prefix of every source ID.
pub const SOURCE_ID_PREFIX: &str = "src-";

/// One distinct URL seen during the run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceRecord {
    pub id: String,
    pub url: String,
    pub title: String,
    pub snippet: String,
    pub domain: Option<String>,
    pub first_seen_iteration: u32,
}

impl SourceRecord {
    /// Title for display: title, else domain, else ID.
    pub fn display_title(&self) -> &str {
        if !self.title.trim().is_empty() {
            self.title.trim()
        } else if let Some(ref domain) = self.domain {
            domain
        } else {
            &self.id
        }
    }
}

/// Ordered, URL-deduplicated source records.
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    records: Vec<SourceRecord>,
    by_url: HashMap<String, usize>,
    by_id: HashMap<String, usize>,
}

impl SourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register candidates seen at `iteration`. Returns the newly allocated IDs.
    pub fn record(&mut self, iteration: u32, candidates: &[SearchResult]) -> Vec<String> {
        let mut allocated = Vec::new();

        for candidate in candidates {
            let url = candidate.url.trim();
            if url.is_empty() {
                tracing::debug!(title = %candidate.title, "Skipping source without URL");
                continue;
            }
            if self.by_url.contains_key(url) {
                continue;
            }

            let id = format!("{}{}", SOURCE_ID_PREFIX, self.records.len() + 1);
            let index = self.records.len();
            self.records.push(SourceRecord {
                id: id.clone(),
                url: url.to_string(),
                title: candidate.title.trim().to_string(),
                snippet: candidate.snippet.clone(),
                domain: domain_of(url),
                first_seen_iteration: iteration,
            });
            self.by_url.insert(url.to_string(), index);
            self.by_id.insert(id.clone(), index);
            allocated.push(id);
        }

        allocated
    }

    /// Look up a record by ID.
    pub fn get(&self, id: &str) -> Option<&SourceRecord> {
        self.by_id.get(id).map(|&i| &self.records[i])
    }

    /// Look up a record by URL.
    pub fn find_by_url(&self, url: &str) -> Option<&SourceRecord> {
        self.by_url.get(url.trim()).map(|&i| &self.records[i])
    }

    /// Records in allocation order.
    pub fn records(&self) -> &[SourceRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// JSON map from ID to title and URL, as shown to the composer.
    pub fn to_context(&self) -> serde_json::Value {
        let map: serde_json::Map<String, serde_json::Value> = self
            .records
            .iter()
            .map(|r| {
                (
                    r.id.clone(),
                    serde_json::json!({ "title": r.display_title(), "url": r.url }),
                )
            })
            .collect();
        serde_json::Value::Object(map)
    }
}

fn domain_of(url: &str) -> Option<String> {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.trim_start_matches("www.").to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Source Collector
// ─────────────────────────────────────────────────────────────────────────────

/// Feeds search results into the run's `sources` slot.
///
/// This is the only writer of `sources`; searching stages go through it.
pub struct SourceCollector;

impl SourceCollector {
    /// Record a batch of results. Safe to call repeatedly with overlapping URLs.
    pub fn record(
        state: &mut StateStore,
        iteration: u32,
        results: &[SearchResult],
    ) -> Result<Vec<String>, StateError> {
        let registry = state.sources_mut(Producer::SourceCollector)?;
        let allocated = registry.record(iteration, results);
        if !allocated.is_empty() {
            tracing::debug!(
                iteration,
                new = allocated.len(),
                total = registry.len(),
                "Recorded sources"
            );
        }
        Ok(allocated)
    }
}
