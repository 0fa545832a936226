//! Content-tree scoring analysis
//!
//! Decides, bottom-up, whether a content instance produces gradable
//! statements and which sub-content ids should count toward its progress.
//!
//! Dispatch is a `match` over [`ContentType`]; types without scoring rules
//! fall through to the default (unscored) result.

mod composite;
mod sets;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::content::{ContentNode, ContentType};

/// xAPI verb on which a content type reports its score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionTrigger {
    #[default]
    Answered,
    Completed,
}

impl CompletionTrigger {
    pub fn verb(self) -> &'static str {
        match self {
            CompletionTrigger::Answered => "answered",
            CompletionTrigger::Completed => "completed",
        }
    }
}

/// Outcome of analyzing one content node
///
/// An empty `scorable_ids` list on a scored node means the node's own
/// subContentId is the scorable unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    pub is_scored: bool,
    pub scorable_ids: Vec<String>,
    pub completion_trigger: CompletionTrigger,
}

impl AnalysisResult {
    fn scored() -> Self {
        Self {
            is_scored: true,
            ..Self::default()
        }
    }
}

/// Analyze a nested content node
///
/// Nodes missing library, subContentId or params get the default result.
pub fn analyze(node: &ContentNode) -> AnalysisResult {
    match (&node.library, &node.sub_content_id, &node.params) {
        (Some(_), Some(_), Some(params)) => analyze_params(node.content_type(), params),
        _ => AnalysisResult::default(),
    }
}

/// Analyze a top-level content instance from its library identifier and params
///
/// Top-level content has no subContentId, so no well-formedness check applies.
pub fn analyze_content(library: &str, params: &Value) -> AnalysisResult {
    analyze_params(ContentType::from_library(library), params)
}

/// Apply the scoring rule of `content_type` to its parameter tree
pub fn analyze_params(content_type: ContentType, params: &Value) -> AnalysisResult {
    match content_type {
        ContentType::Blanks
        | ContentType::BranchingScenario
        | ContentType::DragQuestion
        | ContentType::DragText
        | ContentType::Essay
        | ContentType::GuessTheAnswer
        | ContentType::ImageHotspotQuestion
        | ContentType::MarkTheWords
        | ContentType::MemoryGame
        | ContentType::MultiChoice
        | ContentType::Questionnaire
        | ContentType::TrueFalse => AnalysisResult::scored(),
        ContentType::FlashCards => AnalysisResult {
            completion_trigger: CompletionTrigger::Completed,
            ..AnalysisResult::scored()
        },
        ContentType::SingleChoiceSet => sets::single_choice_set(params),
        ContentType::Summary => sets::summary(params),
        ContentType::CoursePresentation => composite::course_presentation(params),
        ContentType::InteractiveVideo => composite::interactive_video(params),
        // QuestionSet instances are gated by pass percentage, not by sub-content ids
        ContentType::QuestionSet | ContentType::Unknown => AnalysisResult::default(),
    }
}

/// Loose truthiness used for authored fields ("has a question", "has a summary")
fn is_present(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(b)) => *b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|f| f != 0.0),
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Array(_)) | Some(Value::Object(_)) => true,
    }
}
