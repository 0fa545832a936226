//! Per-instance score aggregation
//!
//! A [`ContentInstanceState`] is built once per rendered content instance and
//! then fed statements in arrival order. Each call to
//! [`ContentInstanceState::process`] updates the in-memory state and returns
//! the result to persist, if any. Performing the persist call is left to the
//! caller, so a failed or slow store never leaves this state inconsistent.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::analysis::{analyze_content, CompletionTrigger};
use crate::content::ContentType;
use crate::xapi::{verbs, Statement};

/// Pass percentage H5P applies to a QuestionSet whose author left it unset
pub const DEFAULT_QUESTION_SET_PASS_PERCENTAGE: f64 = 50.0;

/// How statements for an instance are turned into results
///
/// Determined once from the library identifier; exactly one applies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Classification {
    /// Answered statements matched against the scorable id set
    Unclassified,
    /// Full marks once a completed attempt reaches the pass percentage
    QuestionSet { pass_percentage: f64 },
    /// Percentage of the completed set
    SingleChoiceSet { choices: usize },
    /// Percentage of every answered essay
    Essay { pass_percentage: Option<f64> },
    /// Full marks once the scenario is completed
    BranchingScenario,
    /// Unscored presentation: full marks when the last slide is reached
    SlideProgress { last_slide: usize },
}

/// Result the caller should hand to the persist-result collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PersistCommand {
    pub content_id: i64,
    pub score: f64,
    pub max_score: f64,
}

impl PersistCommand {
    /// Result expressed as a percentage out of 100
    pub fn percentage(content_id: i64, percentage: f64) -> Self {
        Self {
            content_id,
            score: percentage,
            max_score: 100.0,
        }
    }

    pub fn full_marks(content_id: i64) -> Self {
        Self::percentage(content_id, 100.0)
    }
}

/// Scoring state of one content instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentInstanceState {
    content_id: i64,
    classification: Classification,
    scorable_ids: Vec<String>,
    completion_trigger: CompletionTrigger,
    interaction_count: usize,
    matched_interactions: usize,
    accumulated_score: f64,
    accumulated_max_score: f64,
    running_percentage: f64,
    slide_completion_sent: bool,
}

impl ContentInstanceState {
    /// State with an explicit classification and scorable id set
    pub fn new(content_id: i64, classification: Classification, scorable_ids: Vec<String>) -> Self {
        let interaction_count = scorable_ids.len();
        Self {
            content_id,
            classification,
            scorable_ids,
            completion_trigger: CompletionTrigger::Answered,
            interaction_count,
            matched_interactions: 0,
            accumulated_score: 0.0,
            accumulated_max_score: 0.0,
            running_percentage: 0.0,
            slide_completion_sent: false,
        }
    }

    /// Build the state for a content instance from its library and parameters
    ///
    /// Some instances are complete as soon as they load (a presentation with a
    /// single unscored slide); their result is returned alongside the state.
    pub fn initialize(
        content_id: i64,
        library: &str,
        params: &Value,
    ) -> (Self, Option<PersistCommand>) {
        let content_type = ContentType::from_library(library);
        let analysis = analyze_content(library, params);

        let classification = match content_type {
            ContentType::QuestionSet => Classification::QuestionSet {
                pass_percentage: params
                    .get("passPercentage")
                    .and_then(Value::as_f64)
                    .unwrap_or(DEFAULT_QUESTION_SET_PASS_PERCENTAGE),
            },
            ContentType::SingleChoiceSet => Classification::SingleChoiceSet {
                choices: params
                    .get("choices")
                    .and_then(Value::as_array)
                    .map_or(0, Vec::len),
            },
            ContentType::Essay => Classification::Essay {
                pass_percentage: params
                    .pointer("/behaviour/percentagePassing")
                    .and_then(Value::as_f64),
            },
            ContentType::BranchingScenario => Classification::BranchingScenario,
            ContentType::CoursePresentation if !analysis.is_scored => {
                match params.pointer("/presentation/slides").and_then(Value::as_array) {
                    Some(slides) => Classification::SlideProgress {
                        last_slide: slides.len(),
                    },
                    None => Classification::Unclassified,
                }
            }
            _ => Classification::Unclassified,
        };

        let mut state = Self::new(content_id, classification, analysis.scorable_ids);
        state.completion_trigger = analysis.completion_trigger;

        debug!(
            content_id,
            library,
            classification = ?state.classification,
            scorable = state.scorable_ids.len(),
            "Initialized content instance"
        );

        let immediate = match state.classification {
            Classification::SlideProgress { last_slide } if last_slide < 2 => {
                state.slide_completion_sent = true;
                state.running_percentage = 100.0;
                Some(PersistCommand::full_marks(content_id))
            }
            _ => None,
        };

        (state, immediate)
    }

    pub fn content_id(&self) -> i64 {
        self.content_id
    }

    pub fn classification(&self) -> &Classification {
        &self.classification
    }

    pub fn scorable_ids(&self) -> &[String] {
        &self.scorable_ids
    }

    pub fn completion_trigger(&self) -> CompletionTrigger {
        self.completion_trigger
    }

    pub fn interaction_count(&self) -> usize {
        self.interaction_count
    }

    pub fn matched_interactions(&self) -> usize {
        self.matched_interactions
    }

    pub fn accumulated_score(&self) -> f64 {
        self.accumulated_score
    }

    pub fn accumulated_max_score(&self) -> f64 {
        self.accumulated_max_score
    }

    pub fn running_percentage(&self) -> f64 {
        self.running_percentage
    }

    /// Apply one statement; returns the result to persist, if any
    pub fn process(&mut self, statement: &Statement) -> Option<PersistCommand> {
        if statement.content_id != self.content_id {
            debug!(
                expected = self.content_id,
                got = statement.content_id,
                "Ignoring statement for another content instance"
            );
            return None;
        }

        let verb = statement.verb.as_str();
        let command = match self.classification {
            Classification::Unclassified => self.process_unclassified(statement),
            Classification::QuestionSet { pass_percentage } if verb == verbs::COMPLETED => {
                let percentage = statement.percentage()?;
                if percentage >= pass_percentage {
                    Some(PersistCommand::full_marks(self.content_id))
                } else {
                    debug!(
                        content_id = self.content_id,
                        percentage, pass_percentage, "Question set attempt below pass percentage"
                    );
                    None
                }
            }
            Classification::Essay { .. } if verb == verbs::ANSWERED => statement
                .percentage()
                .map(|p| PersistCommand::percentage(self.content_id, p)),
            Classification::SingleChoiceSet { .. } if verb == verbs::COMPLETED => statement
                .percentage()
                .map(|p| PersistCommand::percentage(self.content_id, p)),
            Classification::BranchingScenario if verb == verbs::COMPLETED => {
                Some(PersistCommand::full_marks(self.content_id))
            }
            Classification::SlideProgress { last_slide } if verb == verbs::PROGRESSED => {
                let reached_end = statement.ending_point == i64::try_from(last_slide).ok();
                if reached_end && !self.slide_completion_sent {
                    self.slide_completion_sent = true;
                    Some(PersistCommand::full_marks(self.content_id))
                } else {
                    None
                }
            }
            _ => None,
        };

        if let Some(command) = command {
            self.running_percentage = command.score;
        }
        command
    }

    fn accepts_scoring_verb(&self, verb: &str) -> bool {
        verb == verbs::ANSWERED || verb == self.completion_trigger.verb()
    }

    fn process_unclassified(&mut self, statement: &Statement) -> Option<PersistCommand> {
        if !statement.is_activity() || !self.accepts_scoring_verb(&statement.verb) {
            return None;
        }

        let ratio = statement.ratio()?;

        if self.scorable_ids.is_empty() {
            // No finer-grained ids: the whole content is one unit
            return Some(PersistCommand::percentage(self.content_id, ratio * 100.0));
        }

        let sub_content_id = statement.sub_content_id()?;
        if !self.scorable_ids.iter().any(|id| id == sub_content_id) {
            debug!(
                content_id = self.content_id,
                sub_content_id, "Statement for non-scorable sub-content ignored"
            );
            return None;
        }

        self.matched_interactions += 1;
        self.accumulated_score += statement.score.unwrap_or_default();
        self.accumulated_max_score += statement.max_score.unwrap_or_default();

        let interactions = self.interaction_count.max(1) as f64;
        let percentage = (self.running_percentage + ratio / interactions * 100.0).min(100.0);

        Some(PersistCommand::percentage(self.content_id, percentage))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    fn answered(content_id: i64, sub_id: &str, score: f64, max_score: f64) -> Statement {
        Statement::new(content_id, verbs::ANSWERED)
            .with_sub_content_id(sub_id)
            .with_score(score, max_score)
    }

    #[test]
    fn test_unclassified_accumulates_per_interaction() {
        let mut state = ContentInstanceState::new(1, Classification::Unclassified, ids(&["x", "y"]));
        assert_eq!(state.interaction_count(), 2);

        let first = state.process(&answered(1, "x", 1.0, 1.0)).unwrap();
        assert_eq!(first, PersistCommand::percentage(1, 50.0));
        assert_eq!(state.running_percentage(), 50.0);

        let second = state.process(&answered(1, "y", 1.0, 1.0)).unwrap();
        assert_eq!(second.score, 100.0);
        assert_eq!(state.matched_interactions(), 2);
        assert_eq!(state.accumulated_score(), 2.0);
        assert_eq!(state.accumulated_max_score(), 2.0);
    }

    #[test]
    fn test_unclassified_ignores_unknown_sub_content() {
        let mut state = ContentInstanceState::new(1, Classification::Unclassified, ids(&["x"]));

        assert_eq!(state.process(&answered(1, "other", 1.0, 1.0)), None);
        assert_eq!(
            state.process(&Statement::new(1, verbs::ANSWERED).with_score(1.0, 1.0)),
            None
        );
        assert_eq!(state.running_percentage(), 0.0);
        assert_eq!(state.matched_interactions(), 0);
    }

    #[test]
    fn test_unclassified_without_ids_overwrites() {
        let mut state = ContentInstanceState::new(3, Classification::Unclassified, Vec::new());

        let first = state.process(&Statement::new(3, verbs::ANSWERED).with_score(1.0, 4.0));
        assert_eq!(first, Some(PersistCommand::percentage(3, 25.0)));

        let second = state.process(&Statement::new(3, verbs::ANSWERED).with_score(2.0, 4.0));
        assert_eq!(second, Some(PersistCommand::percentage(3, 50.0)));
        assert_eq!(state.running_percentage(), 50.0);
    }

    #[test]
    fn test_unclassified_requires_activity_and_answered() {
        let mut state = ContentInstanceState::new(1, Classification::Unclassified, Vec::new());

        let not_activity = Statement::new(1, verbs::ANSWERED)
            .with_score(1.0, 1.0)
            .with_object_type("SubStatement");
        assert_eq!(state.process(&not_activity), None);

        let completed = Statement::new(1, verbs::COMPLETED).with_score(1.0, 1.0);
        assert_eq!(state.process(&completed), None);
    }

    #[test]
    fn test_zero_max_score_never_persists() {
        let mut state = ContentInstanceState::new(1, Classification::Unclassified, ids(&["x"]));
        assert_eq!(state.process(&answered(1, "x", 1.0, 0.0)), None);
        assert_eq!(state.matched_interactions(), 0);

        let mut whole = ContentInstanceState::new(1, Classification::Unclassified, Vec::new());
        assert_eq!(
            whole.process(&Statement::new(1, verbs::ANSWERED).with_score(0.0, 0.0)),
            None
        );
    }

    #[test]
    fn test_running_percentage_is_capped() {
        let mut state = ContentInstanceState::new(1, Classification::Unclassified, ids(&["x"]));
        state.process(&answered(1, "x", 1.0, 1.0));
        let repeat = state.process(&answered(1, "x", 1.0, 1.0)).unwrap();
        assert_eq!(repeat.score, 100.0);
    }

    #[test]
    fn test_question_set_pass_threshold() {
        let mut state = ContentInstanceState::new(
            5,
            Classification::QuestionSet { pass_percentage: 80.0 },
            Vec::new(),
        );

        let below = Statement::new(5, verbs::COMPLETED).with_score(7.0, 10.0);
        assert_eq!(state.process(&below), None);

        let at_threshold = Statement::new(5, verbs::COMPLETED).with_score(8.0, 10.0);
        assert_eq!(state.process(&at_threshold), Some(PersistCommand::full_marks(5)));

        let answered = Statement::new(5, verbs::ANSWERED).with_score(10.0, 10.0);
        assert_eq!(state.process(&answered), None);
    }

    #[test]
    fn test_essay_persists_every_answer() {
        let mut state = ContentInstanceState::new(
            2,
            Classification::Essay { pass_percentage: Some(60.0) },
            Vec::new(),
        );

        let low = Statement::new(2, verbs::ANSWERED).with_score(1.0, 4.0);
        assert_eq!(state.process(&low), Some(PersistCommand::percentage(2, 25.0)));

        let completed = Statement::new(2, verbs::COMPLETED).with_score(4.0, 4.0);
        assert_eq!(state.process(&completed), None);
    }

    #[test]
    fn test_single_choice_set_on_completed() {
        let mut state =
            ContentInstanceState::new(4, Classification::SingleChoiceSet { choices: 3 }, ids(&["a"]));

        assert_eq!(state.process(&answered(4, "a", 1.0, 1.0)), None);

        let completed = Statement::new(4, verbs::COMPLETED).with_score(2.0, 3.0);
        let command = state.process(&completed).unwrap();
        assert!((command.score - 66.666).abs() < 0.01);
        assert_eq!(command.max_score, 100.0);
    }

    #[test]
    fn test_branching_scenario_ignores_score() {
        let mut state = ContentInstanceState::new(6, Classification::BranchingScenario, Vec::new());
        let completed = Statement::new(6, verbs::COMPLETED);
        assert_eq!(state.process(&completed), Some(PersistCommand::full_marks(6)));
    }

    #[test]
    fn test_statement_for_other_content_is_ignored() {
        let mut state = ContentInstanceState::new(1, Classification::BranchingScenario, Vec::new());
        assert_eq!(state.process(&Statement::new(2, verbs::COMPLETED)), None);
    }

    #[test]
    fn test_initialize_question_set() {
        let (state, immediate) =
            ContentInstanceState::initialize(9, "H5P.QuestionSet 1.17", &json!({"passPercentage": 70}));
        assert_eq!(
            state.classification(),
            &Classification::QuestionSet { pass_percentage: 70.0 }
        );
        assert_eq!(immediate, None);

        let (state, _) = ContentInstanceState::initialize(9, "H5P.QuestionSet 1.17", &json!({}));
        assert_eq!(
            state.classification(),
            &Classification::QuestionSet {
                pass_percentage: DEFAULT_QUESTION_SET_PASS_PERCENTAGE
            }
        );
    }

    #[test]
    fn test_initialize_single_choice_set_and_essay() {
        let params = json!({"choices": [
            {"question": "Q1", "answers": ["a"], "subContentId": "c1"},
            {"subContentId": "c2"}
        ]});
        let (state, _) = ContentInstanceState::initialize(1, "H5P.SingleChoiceSet 1.11", &params);
        assert_eq!(state.classification(), &Classification::SingleChoiceSet { choices: 2 });
        assert_eq!(state.scorable_ids(), &["c1".to_string()]);

        let (state, _) = ContentInstanceState::initialize(
            1,
            "H5P.Essay 1.5",
            &json!({"behaviour": {"percentagePassing": 40}}),
        );
        assert_eq!(
            state.classification(),
            &Classification::Essay { pass_percentage: Some(40.0) }
        );
    }

    #[test]
    fn test_initialize_scored_presentation() {
        let params = json!({"presentation": {"slides": [
            {"elements": [{"action": {"library": "H5P.MultiChoice 1.16", "subContentId": "q1", "params": {}}}]},
            {"elements": [{"action": {"library": "H5P.TrueFalse 1.8", "subContentId": "q2", "params": {}}}]}
        ]}});

        let (mut state, immediate) =
            ContentInstanceState::initialize(11, "H5P.CoursePresentation 1.25", &params);
        assert_eq!(immediate, None);
        assert_eq!(state.classification(), &Classification::Unclassified);
        assert_eq!(state.interaction_count(), 2);

        let command = state.process(&answered(11, "q2", 1.0, 2.0)).unwrap();
        assert_eq!(command.score, 25.0);
    }

    #[test]
    fn test_unscored_presentation_completes_on_last_slide() {
        let params = json!({"presentation": {"slides": [{}, {}, {}]}});
        let (mut state, immediate) =
            ContentInstanceState::initialize(12, "H5P.CoursePresentation 1.25", &params);
        assert_eq!(immediate, None);
        assert_eq!(state.classification(), &Classification::SlideProgress { last_slide: 3 });

        let middle = Statement::new(12, verbs::PROGRESSED).with_ending_point(2);
        assert_eq!(state.process(&middle), None);

        let last = Statement::new(12, verbs::PROGRESSED).with_ending_point(3);
        assert_eq!(state.process(&last), Some(PersistCommand::full_marks(12)));

        // Only reported once
        assert_eq!(state.process(&last), None);
    }

    #[test]
    fn test_single_slide_presentation_completes_immediately() {
        let params = json!({"presentation": {"slides": [{"elements": []}]}});
        let (state, immediate) =
            ContentInstanceState::initialize(13, "H5P.CoursePresentation 1.25", &params);
        assert_eq!(immediate, Some(PersistCommand::full_marks(13)));
        assert_eq!(state.running_percentage(), 100.0);
    }

    #[test]
    fn test_flash_cards_score_on_completed() {
        let (mut state, _) = ContentInstanceState::initialize(14, "H5P.FlashCards 1.7", &json!({}));
        assert_eq!(state.completion_trigger(), CompletionTrigger::Completed);

        let completed = Statement::new(14, verbs::COMPLETED).with_score(3.0, 4.0);
        assert_eq!(state.process(&completed), Some(PersistCommand::percentage(14, 75.0)));
    }

    #[test]
    fn test_reinitializing_is_deterministic() {
        let params = json!({"interactiveVideo": {"assets": {"interactions": [
            {"action": {"library": "H5P.Blanks 1.14", "subContentId": "b1", "params": {}}}
        ]}}});
        let (first, _) = ContentInstanceState::initialize(20, "H5P.InteractiveVideo 1.22", &params);
        let (second, _) = ContentInstanceState::initialize(20, "H5P.InteractiveVideo 1.22", &params);
        assert_eq!(first, second);
        assert_eq!(first.scorable_ids(), &["b1".to_string()]);
    }

    #[test]
    fn test_interactive_video_summary_answer_counts() {
        let params = json!({"interactiveVideo": {
            "assets": {"interactions": [
                {"action": {"library": "H5P.MultiChoice 1.16", "subContentId": "q1", "params": {}}}
            ]},
            "summary": {"task": {
                "library": "H5P.Summary 1.10",
                "subContentId": "sumtask",
                "params": {"summaries": [{"summary": ["right", "wrong"]}]}
            }}
        }});
        let (mut state, immediate) =
            ContentInstanceState::initialize(21, "H5P.InteractiveVideo 1.22", &params);
        assert_eq!(immediate, None);
        assert_eq!(state.interaction_count(), 2);

        let summary_answer = answered(21, "sumtask", 1.0, 1.0);
        assert_eq!(
            state.process(&summary_answer),
            Some(PersistCommand::percentage(21, 50.0))
        );
    }
}
