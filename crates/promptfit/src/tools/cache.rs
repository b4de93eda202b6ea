//! Tool result cache for one tool-calling run.
//!
//! Results are keyed by the model's tool-call id. The cache only grows: an
//! id that already has a result keeps it, and nothing is evicted. That is
//! what lets the harness re-render earlier rounds without re-invoking the
//! tools they called.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::core::ToolResult;

/// Results keyed by tool-call id.
///
/// Serializes as a plain JSON object so it can be stored with a turn's
/// metadata and handed back on the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolResultCache {
    results: BTreeMap<String, ToolResult>,
}

impl ToolResultCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up the result for a call id.
    pub fn get(&self, call_id: &str) -> Option<&ToolResult> {
        self.results.get(call_id)
    }

    pub fn contains(&self, call_id: &str) -> bool {
        self.results.contains_key(call_id)
    }

    /// Store a result. Returns `false` and keeps the existing entry if the
    /// id already has one.
    pub fn insert(&mut self, call_id: impl Into<String>, result: ToolResult) -> bool {
        match self.results.entry(call_id.into()) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(result);
                true
            }
        }
    }

    /// Insert every result not already present. Returns the ids that were
    /// newly added, in iteration order.
    pub fn merge(&mut self, results: impl IntoIterator<Item = (String, ToolResult)>) -> Vec<String> {
        let mut added = Vec::new();
        for (id, result) in results {
            if self.insert(id.clone(), result) {
                added.push(id);
            }
        }
        added
    }

    /// Number of entries in the cache.
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ToolResult)> {
        self.results.iter().map(|(id, r)| (id.as_str(), r))
    }
}

impl FromIterator<(String, ToolResult)> for ToolResultCache {
    fn from_iter<I: IntoIterator<Item = (String, ToolResult)>>(iter: I) -> Self {
        let mut cache = Self::new();
        cache.merge(iter);
        cache
    }
}
