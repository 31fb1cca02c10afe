//! Whether proactively injected context files were actually used.

use serde::{Deserialize, Serialize};

use crate::domain::score::{FileSet, Overlap, ScoreRecord};

/// Overlap between injected context files and files the agent touched.
///
/// Precision is over injected files, recall over touched files. Either
/// set being empty gives 0 for its side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InjectionScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub injected_and_touched: Vec<String>,
    pub injected_not_touched: Vec<String>,
    pub touched_not_injected: Vec<String>,
}

impl InjectionScore {
    pub fn score(injected: &FileSet, touched: &FileSet) -> Self {
        let Overlap {
            precision,
            recall,
            f1,
        } = Overlap::between(injected, touched);
        Self {
            precision,
            recall,
            f1,
            injected_and_touched: injected.intersection(touched).to_vec(),
            injected_not_touched: injected.difference(touched).to_vec(),
            touched_not_injected: touched.difference(injected).to_vec(),
        }
    }
}

/// Were the right files injected? Same comparison as the diff scorer, with
/// the injected set in place of the agent's.
pub fn score_correctness(injected: &FileSet, truth: &FileSet) -> ScoreRecord {
    ScoreRecord::compare(injected, truth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(paths: &[&str]) -> FileSet {
        paths.iter().copied().collect()
    }

    #[test]
    fn partial_usage() {
        let s = InjectionScore::score(&set(&["a.py", "b.py", "c.py"]), &set(&["a.py", "d.py"]));
        assert!((s.precision - 1.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.recall, 0.5);
        assert!((s.f1 - 0.4).abs() < 1e-9);
        assert_eq!(s.injected_and_touched, vec!["a.py"]);
        assert_eq!(s.injected_not_touched, vec!["b.py", "c.py"]);
        assert_eq!(s.touched_not_injected, vec!["d.py"]);
    }

    #[test]
    fn empty_sets_score_zero() {
        let s = InjectionScore::score(&FileSet::new(), &FileSet::new());
        assert_eq!((s.precision, s.recall, s.f1), (0.0, 0.0, 0.0));

        let s = InjectionScore::score(&FileSet::new(), &set(&["a.py"]));
        assert_eq!(s.f1, 0.0);
        assert_eq!(s.touched_not_injected, vec!["a.py"]);
    }

    #[test]
    fn correctness_against_truth() {
        let r = score_correctness(&set(&["a", "b"]), &set(&["a", "b"]));
        assert!(r.exact_match);
        assert_eq!(r.f1, 1.0);
    }
}
