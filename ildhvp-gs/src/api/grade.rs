//! `setgrade` web service

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use ildhvp_common::db::{authorize_grader, set_grade};
use ildhvp_common::events::IldEvent;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ApiError, AuthUser};
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetGradeRequest {
    pub contentid: i64,
    pub score: f64,
    pub maxscore: f64,
    /// Learner to grade; the caller when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub userid: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetGradeResponse {
    pub sectionid: i64,
    pub percentage: f64,
    /// Whether the stored grade changed
    pub updated: bool,
}

/// POST /webservice/setgrade
///
/// Stores the learner's result when it beats their stored grade and returns
/// the progress of the section holding the content either way. The learner
/// is the caller unless `userid` names someone else, which requires the
/// save-for-others capability.
pub async fn set_grade_handler(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(request): Json<SetGradeRequest>,
) -> Result<Json<SetGradeResponse>, ApiError> {
    let learner_id = request.userid.unwrap_or(user.id);
    debug!(
        caller_id = user.id,
        learner_id,
        content_id = request.contentid,
        score = request.score,
        max_score = request.maxscore,
        "setgrade"
    );

    authorize_grader(&state.db, user.id, learner_id).await?;

    let outcome = set_grade(
        &state.db,
        learner_id,
        request.contentid,
        request.score,
        request.maxscore,
    )
    .await?;

    if outcome.updated {
        state.publish(IldEvent::GradeRecorded {
            user_id: learner_id,
            content_id: request.contentid,
            score: request.score,
            max_score: request.maxscore,
            timestamp: Utc::now(),
        });
    }
    state.publish_progress(learner_id, outcome.progress);

    Ok(Json(SetGradeResponse {
        sectionid: outcome.progress.section_id,
        percentage: outcome.progress.percentage,
        updated: outcome.updated,
    }))
}
