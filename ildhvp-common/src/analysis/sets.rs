//! Question-list content types: SingleChoiceSet and Summary
//!
//! Both carry a flat list of entries, each with its own subContentId. An
//! entry counts once the author has filled in its required fields.

use serde_json::Value;

use super::{is_present, AnalysisResult};

/// SingleChoiceSet: entries under `choices` need `question` and `answers`
pub(super) fn single_choice_set(params: &Value) -> AnalysisResult {
    entry_list(params, "choices", &["question", "answers"])
}

/// Summary: entries under `summaries` need a `summary`
pub(super) fn summary(params: &Value) -> AnalysisResult {
    entry_list(params, "summaries", &["summary"])
}

fn entry_list(params: &Value, list_key: &str, required: &[&str]) -> AnalysisResult {
    let Some(entries) = params.get(list_key).and_then(Value::as_array) else {
        return AnalysisResult::default();
    };

    let complete: Vec<&Value> = entries
        .iter()
        .filter(|entry| required.iter().all(|key| is_present(entry.get(*key))))
        .collect();

    if complete.is_empty() {
        return AnalysisResult::default();
    }

    let scorable_ids = complete
        .iter()
        .filter_map(|entry| entry.get("subContentId").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    AnalysisResult {
        is_scored: true,
        scorable_ids,
        ..AnalysisResult::default()
    }
}
