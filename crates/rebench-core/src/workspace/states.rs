//! Ordered log of labelled commits recorded during one attempt.

use serde::{Deserialize, Serialize};

/// Label of the checked-out parent of the target commit.
pub const PARENT: &str = "parent";
/// Label of the snapshot taken after setup and tool preparation.
pub const BASELINE: &str = "baseline";
/// Label of the snapshot taken after the approach ran.
pub const ATTEMPT: &str = "attempt";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedState {
    pub label: String,
    pub commit: String,
}

/// Append-only. A label may repeat; lookups return the latest entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NamedStates(Vec<NamedState>);

impl NamedStates {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, label: impl Into<String>, commit: impl Into<String>) {
        self.0.push(NamedState {
            label: label.into(),
            commit: commit.into(),
        });
    }

    pub fn get(&self, label: &str) -> Option<&str> {
        self.0
            .iter()
            .rev()
            .find(|s| s.label == label)
            .map(|s| s.commit.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamedState> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
