//! File sets and overlap scores.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Deduplicated, ordered set of repository-relative paths.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct FileSet(BTreeSet<String>);

impl FileSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse newline-separated `git ... --name-only` output.
    pub fn from_name_only(output: &str) -> Self {
        output
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .collect()
    }

    /// Drop every path that lives under one of `prefixes`.
    pub fn without_prefixes(self, prefixes: &[String]) -> Self {
        if prefixes.is_empty() {
            return self;
        }
        Self(
            self.0
                .into_iter()
                .filter(|path| !prefixes.iter().any(|p| is_under(path, p)))
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn intersection(&self, other: &FileSet) -> FileSet {
        Self(self.0.intersection(&other.0).cloned().collect())
    }

    pub fn difference(&self, other: &FileSet) -> FileSet {
        Self(self.0.difference(&other.0).cloned().collect())
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

/// `prefix` matches either as a directory (`.bobbin/` or `.bobbin`) or an
/// exact file path.
fn is_under(path: &str, prefix: &str) -> bool {
    let dir = prefix.trim_end_matches('/');
    if dir.is_empty() {
        return false;
    }
    path == dir
        || path
            .strip_prefix(dir)
            .is_some_and(|rest| rest.starts_with('/'))
}

impl FromIterator<String> for FileSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> FromIterator<&'a str> for FileSet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        Self(iter.into_iter().map(str::to_string).collect())
    }
}

/// Precision, recall and F1 of a predicted set against a reference set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Overlap {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl Overlap {
    /// precision = |p∩r|/|p| (0 when p is empty), recall = |p∩r|/|r|
    /// (0 when r is empty), f1 = harmonic mean or 0 when p+r = 0.
    pub fn between(predicted: &FileSet, reference: &FileSet) -> Self {
        let hits = predicted.intersection(reference).len() as f64;
        let precision = ratio(hits, predicted.len());
        let recall = ratio(hits, reference.len());
        Self::from_parts(precision, recall)
    }

    pub fn from_parts(precision: f64, recall: f64) -> Self {
        Self {
            precision,
            recall,
            f1: f1(precision, recall),
        }
    }
}

fn ratio(hits: f64, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        hits / denominator as f64
    }
}

/// Harmonic mean of precision and recall; 0 when both are 0.
pub fn f1(precision: f64, recall: f64) -> f64 {
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Result of comparing the files an agent touched with the ground truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreRecord {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub agent_files: Vec<String>,
    pub truth_files: Vec<String>,
    pub exact_match: bool,
}

impl ScoreRecord {
    /// Compare two file sets.
    ///
    /// Empty-vs-empty is the vacuous "nothing needed, nothing done" case and
    /// scores 1.0 everywhere; a non-empty agent set against an empty truth
    /// scores 0.
    pub fn compare(agent: &FileSet, truth: &FileSet) -> Self {
        let overlap = if agent.is_empty() && truth.is_empty() {
            Overlap::from_parts(1.0, 1.0)
        } else {
            Overlap::between(agent, truth)
        };
        Self {
            precision: overlap.precision,
            recall: overlap.recall,
            f1: overlap.f1,
            agent_files: agent.to_vec(),
            truth_files: truth.to_vec(),
            exact_match: agent == truth,
        }
    }
}
