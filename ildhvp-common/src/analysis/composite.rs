//! Container content types: CoursePresentation and InteractiveVideo
//!
//! A container is scored when any child is. Each scored child contributes
//! its own subContentId, or its finer-grained ids when it has some.

use serde_json::Value;
use tracing::trace;

use super::{analyze, AnalysisResult};
use crate::content::ContentNode;

/// Running merge of child results in document order
#[derive(Default)]
struct ChildMerge {
    is_scored: bool,
    scorable_ids: Vec<String>,
}

impl ChildMerge {
    /// Analyze one child `action` object and fold it in; broken children are skipped
    fn add_action(&mut self, action: Option<&Value>) {
        let Some(action) = action else {
            return;
        };

        let node = ContentNode::from_action(action);
        let Some(own_id) = node.sub_content_id.clone().filter(|_| node.is_well_formed()) else {
            trace!("Skipping broken content element: {}", action);
            return;
        };

        let result = analyze(&node);
        if result.is_scored {
            if result.scorable_ids.is_empty() {
                self.scorable_ids.push(own_id);
            } else {
                self.scorable_ids.extend(result.scorable_ids);
            }
            self.is_scored = true;
        }
    }

    fn finish(self) -> AnalysisResult {
        AnalysisResult {
            is_scored: self.is_scored,
            scorable_ids: self.scorable_ids,
            ..AnalysisResult::default()
        }
    }
}

/// CoursePresentation: `presentation.slides[].elements[].action`
pub(super) fn course_presentation(params: &Value) -> AnalysisResult {
    let Some(slides) = params.pointer("/presentation/slides").and_then(Value::as_array) else {
        return AnalysisResult::default();
    };

    let mut merge = ChildMerge::default();
    for slide in slides {
        let elements = slide.get("elements").and_then(Value::as_array);
        for element in elements.into_iter().flatten() {
            merge.add_action(element.get("action"));
        }
    }

    merge.finish()
}

/// InteractiveVideo: `interactiveVideo.assets.interactions[].action` plus the
/// optional `interactiveVideo.summary.task`
pub(super) fn interactive_video(params: &Value) -> AnalysisResult {
    let Some(video) = params.get("interactiveVideo").filter(|v| !v.is_null()) else {
        return AnalysisResult::default();
    };

    let mut merge = ChildMerge::default();

    let interactions = video.pointer("/assets/interactions").and_then(Value::as_array);
    for interaction in interactions.into_iter().flatten() {
        merge.add_action(interaction.get("action"));
    }

    // The summary task sits outside the regular interactions but is merged like one
    merge.add_action(video.pointer("/summary/task"));

    merge.finish()
}
