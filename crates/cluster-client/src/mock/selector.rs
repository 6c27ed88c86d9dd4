//! Minimal label selector matching for the mock store.
//!
//! Supports the equality-based subset: `key=value`, `key==value`,
//! `key!=value`, `key` and `!key`, joined by commas.

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Requirement {
    Equals(String, String),
    NotEquals(String, String),
    Exists(String),
    DoesNotExist(String),
}

/// Parsed label selector
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    /// Parse a selector string; the empty string selects everything
    pub fn parse(selector: &str) -> Self {
        let requirements = selector
            .split(',')
            .map(str::trim)
            .filter(|term| !term.is_empty())
            .map(|term| {
                if let Some((key, value)) = term.split_once("!=") {
                    Requirement::NotEquals(key.trim().to_string(), value.trim().to_string())
                } else if let Some((key, value)) = term.split_once("==") {
                    Requirement::Equals(key.trim().to_string(), value.trim().to_string())
                } else if let Some((key, value)) = term.split_once('=') {
                    Requirement::Equals(key.trim().to_string(), value.trim().to_string())
                } else if let Some(key) = term.strip_prefix('!') {
                    Requirement::DoesNotExist(key.trim().to_string())
                } else {
                    Requirement::Exists(term.to_string())
                }
            })
            .collect();
        Self { requirements }
    }

    /// Whether the given labels satisfy every requirement
    pub fn matches(&self, labels: Option<&BTreeMap<String, String>>) -> bool {
        let empty = BTreeMap::new();
        let labels = labels.unwrap_or(&empty);
        self.requirements.iter().all(|requirement| match requirement {
            Requirement::Equals(key, value) => labels.get(key) == Some(value),
            Requirement::NotEquals(key, value) => labels.get(key) != Some(value),
            Requirement::Exists(key) => labels.contains_key(key),
            Requirement::DoesNotExist(key) => !labels.contains_key(key),
        })
    }
}
