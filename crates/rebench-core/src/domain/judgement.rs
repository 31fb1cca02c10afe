//! Pairwise judgement records and the flip-and-draw merge.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Rubric dimensions every judge response must score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Consistency,
    Completeness,
    Minimality,
}

impl Dimension {
    pub const ALL: [Dimension; 3] = [
        Dimension::Consistency,
        Dimension::Completeness,
        Dimension::Minimality,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Consistency => "consistency",
            Dimension::Completeness => "completeness",
            Dimension::Minimality => "minimality",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Winner of a comparison. In a raw response `A`/`B` name presentation
/// positions; in a [`Judgement`] they name the compared sides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Winner {
    A,
    B,
    Tie,
}

impl Winner {
    pub const ALL: [Winner; 3] = [Winner::A, Winner::B, Winner::Tie];

    /// Parse a judge token (`a`, `b`, `tie`), ignoring case and whitespace.
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "a" => Some(Winner::A),
            "b" => Some(Winner::B),
            "tie" => Some(Winner::Tie),
            _ => None,
        }
    }

    pub fn swapped(self) -> Self {
        match self {
            Winner::A => Winner::B,
            Winner::B => Winner::A,
            Winner::Tie => Winner::Tie,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Winner::A => "a",
            Winner::B => "b",
            Winner::Tie => "tie",
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scores for one rubric dimension, 1-5 per side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub a: f64,
    pub b: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl DimensionScore {
    fn swapped(&self) -> Self {
        Self {
            a: self.b,
            b: self.a,
            reasoning: self.reasoning.clone(),
        }
    }
}

/// One validated judge response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawVerdict {
    pub dimensions: BTreeMap<Dimension, DimensionScore>,
    pub winner: Winner,
    pub reasoning: String,
}

impl RawVerdict {
    /// Map a response taken in swapped order back onto the caller's sides.
    pub fn unflip(&self) -> Self {
        Self {
            dimensions: self
                .dimensions
                .iter()
                .map(|(dim, score)| (*dim, score.swapped()))
                .collect(),
            winner: self.winner.swapped(),
            reasoning: self.reasoning.clone(),
        }
    }
}

/// Final verdict of a flip-and-draw comparison.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Judgement {
    pub dimension_scores: BTreeMap<Dimension, DimensionScore>,
    pub overall_winner: Winner,
    pub bias_detected: bool,
    pub reasoning: String,
    pub model: String,
}

impl Judgement {
    /// Merge the forward verdict with the un-flipped swapped-order verdict.
    ///
    /// Scores are averaged per dimension. Disagreement on the winner yields
    /// a tie with `bias_detected` set.
    pub fn merge(forward: &RawVerdict, unflipped: &RawVerdict, model: impl Into<String>) -> Self {
        let dimension_scores = forward
            .dimensions
            .iter()
            .map(|(dim, fwd)| {
                let merged = match unflipped.dimensions.get(dim) {
                    Some(rev) => DimensionScore {
                        a: (fwd.a + rev.a) / 2.0,
                        b: (fwd.b + rev.b) / 2.0,
                        reasoning: fwd.reasoning.clone(),
                    },
                    None => fwd.clone(),
                };
                (*dim, merged)
            })
            .collect();

        let bias_detected = forward.winner != unflipped.winner;
        let overall_winner = if bias_detected {
            Winner::Tie
        } else {
            forward.winner
        };

        Self {
            dimension_scores,
            overall_winner,
            bias_detected,
            reasoning: forward.reasoning.clone(),
            model: model.into(),
        }
    }
}
