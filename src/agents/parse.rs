//! Defensive decoding of model output into plans and critiques.
//!
//! Models asked for "ONLY JSON" still wrap it in prose or markdown fences
//! often enough that parse failure has to be an expected case, not an error.

use serde_json::Value;
use tracing::warn;

use super::types::{AnswerStyle, Critique, Plan};

/// Recovers a JSON object from raw model output.
///
/// Tries the trimmed text directly; on failure, tries the substring from the
/// first `{` to the last `}`. Returns `None` when neither attempt produces a
/// JSON object.
pub(crate) fn extract_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed)
        && value.is_object()
    {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if start < end {
        serde_json::from_str(&trimmed[start..=end])
            .ok()
            .filter(Value::is_object)
    } else {
        None
    }
}

/// Decodes the planner's response, substituting [`Plan::fallback`] when no
/// JSON object can be recovered.
///
/// Individual fields degrade independently: a plan missing `subtasks` still
/// keeps its `intent`, and an unknown `answer_style` falls back to detailed.
pub(crate) fn plan_from_response(raw: &str) -> Plan {
    let Some(value) = extract_object(raw) else {
        warn!("planner output held no JSON object, using fallback plan");
        return Plan::fallback();
    };

    let defaults = Plan::fallback();
    Plan {
        intent: str_field(&value, "intent").unwrap_or(defaults.intent),
        subtasks: string_list(&value, "subtasks").unwrap_or(defaults.subtasks),
        answer_style: str_field(&value, "answer_style")
            .and_then(|s| AnswerStyle::parse(&s))
            .unwrap_or(defaults.answer_style),
        needs_context: value
            .get("needs_context")
            .and_then(Value::as_bool)
            .unwrap_or(defaults.needs_context),
    }
}

/// Decodes the critic's response, substituting [`Critique::fallback`] when no
/// JSON object can be recovered.
///
/// A missing `approved` field counts as approval, matching the fallback
/// direction: uncertainty must end the revision loop, never extend it.
pub(crate) fn critique_from_response(raw: &str) -> Critique {
    let Some(value) = extract_object(raw) else {
        warn!("critic output held no JSON object, using fallback critique");
        return Critique::fallback();
    };

    Critique {
        approved: value
            .get("approved")
            .and_then(Value::as_bool)
            .unwrap_or(true),
        reason: str_field(&value, "reason").unwrap_or_default(),
        improvements: string_list(&value, "improvements").unwrap_or_default(),
    }
}

fn str_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn string_list(value: &Value, key: &str) -> Option<Vec<String>> {
    value.get(key).and_then(Value::as_array).map(|items| {
        items
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect()
    })
}
