//! Turning free-text judge output into a validated [`RawVerdict`].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::domain::error::{JudgeError, JudgeResult};
use crate::domain::judgement::{Dimension, DimensionScore, RawVerdict, Winner};

static FENCED_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*\n(.*?)\n\s*```").expect("valid regex"));

const MIN_SCORE: f64 = 1.0;
const MAX_SCORE: f64 = 5.0;

/// The content of the first fenced code block, or the whole text.
pub fn extract_json(text: &str) -> &str {
    FENCED_BLOCK
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map_or(text, |m| m.as_str())
}

/// Parse and validate one judge response.
///
/// Every rubric dimension must carry numeric `a` and `b` scores in 1-5 and
/// `overall_winner` must be `a`, `b` or `tie` (case and whitespace
/// ignored). Errors carry the full response text.
pub fn parse_verdict(text: &str) -> JudgeResult<RawVerdict> {
    let value: Value =
        serde_json::from_str(extract_json(text).trim()).map_err(|e| JudgeError::InvalidJson {
            reason: e.to_string(),
            text: text.to_string(),
        })?;

    let missing = |field: &str| JudgeError::MissingField {
        field: field.to_string(),
        text: text.to_string(),
    };

    let dims = value
        .get("dimensions")
        .and_then(Value::as_object)
        .ok_or_else(|| missing("dimensions"))?;
    let winner_value = value
        .get("overall_winner")
        .ok_or_else(|| missing("overall_winner"))?;

    let mut dimensions = BTreeMap::new();
    for dim in Dimension::ALL {
        let entry = dims
            .get(dim.as_str())
            .ok_or_else(|| missing(&format!("dimensions.{dim}")))?;
        let a = score(entry, dim, "a", text)?;
        let b = score(entry, dim, "b", text)?;
        let reasoning = entry
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        dimensions.insert(dim, DimensionScore { a, b, reasoning });
    }

    let winner = match winner_value.as_str() {
        Some(token) => Winner::from_token(token)
            .ok_or_else(|| JudgeError::UnknownWinner(token.trim().to_ascii_lowercase()))?,
        None => return Err(JudgeError::UnknownWinner(winner_value.to_string())),
    };

    Ok(RawVerdict {
        dimensions,
        winner,
        reasoning: value
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

fn score(entry: &Value, dim: Dimension, label: &str, text: &str) -> JudgeResult<f64> {
    let raw = match entry.get(label) {
        None | Some(Value::Null) => {
            return Err(JudgeError::MissingField {
                field: format!("dimensions.{dim}.{label}"),
                text: text.to_string(),
            })
        }
        Some(raw) => raw,
    };
    match raw.as_f64() {
        Some(n) if (MIN_SCORE..=MAX_SCORE).contains(&n) => Ok(n),
        _ => Err(JudgeError::ScoreOutOfRange {
            dimension: dim.to_string(),
            label: label.to_string(),
            value: raw.to_string(),
        }),
    }
}
