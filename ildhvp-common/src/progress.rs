//! Section progress calculation
//!
//! A section's progress is the mean grade percentage over the course modules
//! in it that the learner is expected to complete.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

/// Progress of one course section, as returned to the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SectionProgress {
    #[serde(rename = "sectionid")]
    pub section_id: i64,
    pub percentage: f64,
}

/// One course module of a section, joined with the learner's grade
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleGrade {
    pub visible: bool,
    pub completion_enabled: bool,
    /// Availability restriction tree as stored (JSON), if any
    pub availability: Option<String>,
    /// Learner's grade as a percentage of the item's maximum; `None` when ungraded
    pub grade_percentage: Option<f64>,
}

impl ModuleGrade {
    /// Whether this module counts toward the learner's section progress
    pub fn counts_for(&self, user_lang: &str) -> bool {
        if !self.visible || !self.completion_enabled {
            return false;
        }

        match &self.availability {
            Some(availability) => !restricted_to_other_language(availability, user_lang),
            None => true,
        }
    }
}

/// True when an availability tree contains a language condition for a
/// language other than `user_lang`
///
/// Nested condition groups are searched too. Unparseable trees restrict nothing.
pub fn restricted_to_other_language(availability: &str, user_lang: &str) -> bool {
    let tree: Value = match serde_json::from_str(availability) {
        Ok(tree) => tree,
        Err(e) => {
            warn!("Ignoring unparseable availability '{}': {}", availability, e);
            return false;
        }
    };

    fn walk(node: &Value, user_lang: &str) -> bool {
        let Some(conditions) = node.get("c").and_then(Value::as_array) else {
            return false;
        };

        conditions.iter().any(|condition| {
            let is_language = condition.get("type").and_then(Value::as_str) == Some("language");
            let other_language = condition
                .get("id")
                .and_then(Value::as_str)
                .is_some_and(|lang| lang != user_lang);

            (is_language && other_language) || walk(condition, user_lang)
        })
    }

    walk(&tree, user_lang)
}

/// Mean grade percentage of the modules that count; 0 when none do
pub fn section_percentage(modules: &[ModuleGrade], user_lang: &str) -> f64 {
    let counted: Vec<f64> = modules
        .iter()
        .filter(|module| module.counts_for(user_lang))
        .map(|module| module.grade_percentage.unwrap_or(0.0))
        .collect();

    if counted.is_empty() {
        return 0.0;
    }

    counted.iter().sum::<f64>() / counted.len() as f64
}
