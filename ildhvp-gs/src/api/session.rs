//! Scoring session endpoints
//!
//! The page opens a session when it renders a content instance and posts
//! every xAPI statement the H5P runtime emits. Results are persisted
//! through the configured [`ResultSink`](ildhvp_common::sink::ResultSink).

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use ildhvp_common::db::get_content;
use ildhvp_common::events::IldEvent;
use ildhvp_common::progress::SectionProgress;
use ildhvp_common::{ContentInstanceState, PersistCommand, Statement};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use super::{ApiError, AuthUser};
use crate::session::{Applied, Session};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub contentid: i64,
}

/// Session snapshot plus the outcome of any persist the request triggered
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: Session,
    pub persisted: Option<PersistCommand>,
    pub progress: Option<SectionProgress>,
    pub error: Option<String>,
}

impl SessionResponse {
    fn idle(session: Session) -> Self {
        Self {
            session,
            persisted: None,
            progress: None,
            error: None,
        }
    }
}

/// Hand a result to the sink; failures are logged and reported, never retried
async fn persist_result(
    state: &AppState,
    session: Session,
    command: PersistCommand,
) -> SessionResponse {
    match state.sink.set_result(session.user_id, command).await {
        Ok(progress) => {
            state.publish_progress(session.user_id, progress);
            SessionResponse {
                session,
                persisted: Some(command),
                progress: Some(progress),
                error: None,
            }
        }
        Err(e) => {
            warn!(
                session_id = %session.id,
                content_id = command.content_id,
                "Failed to persist result: {}",
                e
            );
            state.publish(IldEvent::ResultPersistFailed {
                session_id: session.id,
                user_id: session.user_id,
                content_id: command.content_id,
                error: e.to_string(),
                timestamp: Utc::now(),
            });
            SessionResponse {
                session,
                persisted: Some(command),
                progress: None,
                error: Some(e.to_string()),
            }
        }
    }
}

/// POST /api/sessions
pub async fn create_session(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Json(request): Json<CreateSessionRequest>,
) -> Result<(StatusCode, Json<SessionResponse>), ApiError> {
    let content = get_content(&state.db, request.contentid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Content {} not found", request.contentid)))?;

    let (instance, immediate) =
        ContentInstanceState::initialize(content.id, &content.library, &content.params_json());

    let session = state.sessions.create(user.id, instance).await;
    info!(
        session_id = %session.id,
        user_id = user.id,
        content_id = content.id,
        "Opened scoring session for '{}'",
        content.title
    );

    let response = match immediate {
        Some(command) => persist_result(&state, session, command).await,
        None => SessionResponse::idle(session),
    };

    Ok((StatusCode::CREATED, Json(response)))
}

/// GET /api/sessions/:id
pub async fn get_session(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<Session>, ApiError> {
    state
        .sessions
        .get(session_id, user.id)
        .await
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Session {} not found", session_id)))
}

/// POST /api/sessions/:id/statements
///
/// Body is a raw xAPI statement.
pub async fn post_statement(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
    Json(raw): Json<Value>,
) -> Result<Json<SessionResponse>, ApiError> {
    let statement = Statement::from_xapi(&raw)?;

    // Lock is released when apply returns; the persist call runs outside it
    match state.sessions.apply(session_id, user.id, &statement).await {
        Applied::UnknownSession => Err(ApiError::NotFound(format!(
            "Session {} not found",
            session_id
        ))),
        Applied::Processed {
            command: Some(command),
            snapshot,
        } => Ok(Json(persist_result(&state, snapshot, command).await)),
        Applied::Processed {
            command: None,
            snapshot,
        } => Ok(Json(SessionResponse::idle(snapshot))),
    }
}

/// DELETE /api/sessions/:id
pub async fn close_session(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    if state.sessions.close(session_id, user.id).await {
        info!(session_id = %session_id, user_id = user.id, "Closed scoring session");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::NotFound(format!("Session {} not found", session_id)))
    }
}
