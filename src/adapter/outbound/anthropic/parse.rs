//! Response parsing for blind estimates.

use serde_json::Value;

use crate::domain::estimate::{Confidence, EstimateOutput};
use crate::error::{ResearchError, Result};

fn snippet(text: &str) -> String {
    text.chars().take(200).collect()
}

/// Extract the JSON object from model text: a fenced ```json block
/// first, else the outermost `{...}` span.
pub fn extract_json(text: &str) -> Result<Value> {
    if let Some(fenced) = extract_fenced(text) {
        if let Ok(value) = serde_json::from_str::<Value>(&fenced) {
            return Ok(value);
        }
    }

    let first = text.find('{');
    let last = text.rfind('}');
    match (first, last) {
        (Some(first), Some(last)) if last > first => {
            serde_json::from_str(&text[first..=last]).map_err(|_| {
                ResearchError::NoJson {
                    snippet: snippet(text),
                }
                .into()
            })
        }
        _ => Err(ResearchError::NoJson {
            snippet: snippet(text),
        }
        .into()),
    }
}

fn extract_fenced(text: &str) -> Option<String> {
    let start = text.find("```")?;
    let after_fence = &text[start + 3..];
    let body_start = after_fence.find('{')?;
    let end = after_fence.find("```")?;
    if end <= body_start {
        return None;
    }
    let body = &after_fence[body_start..end];
    let close = body.rfind('}')?;
    Some(body[..=close].to_string())
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str().map(ToString::to_string))
                .collect()
        })
        .unwrap_or_default()
}

/// Parse model text into a validated estimate.
///
/// Probability is clamped into [0.01, 0.99]; non-finite values become
/// 0.5. Confidence is normalized case-insensitively with unknown
/// labels mapping to medium. Token/cost fields are left zeroed for the
/// caller to fill from usage data.
pub fn parse_estimate(text: &str) -> Result<EstimateOutput> {
    let data = extract_json(text)?;

    let raw_probability = data
        .get("probability")
        .and_then(Value::as_f64)
        .unwrap_or(0.5);
    let probability = if raw_probability.is_finite() {
        raw_probability.clamp(0.01, 0.99)
    } else {
        0.5
    };

    let confidence = data
        .get("confidence")
        .and_then(Value::as_str)
        .map_or(Confidence::Medium, Confidence::normalize);

    Ok(EstimateOutput {
        probability,
        confidence,
        reasoning: data
            .get("reasoning")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        key_evidence: string_list(data.get("key_evidence")),
        key_uncertainties: string_list(data.get("key_uncertainties")),
        input_tokens: 0,
        output_tokens: 0,
        estimated_cost: 0.0,
    })
}
