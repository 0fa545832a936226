//! Server-Sent Events for section progress
//!
//! Each client only sees events about its own user.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    Extension,
};
use futures::stream::Stream;
use std::convert::Infallible;

use super::AuthUser;
use crate::AppState;

/// GET /api/events
pub async fn event_stream(
    State(state): State<AppState>,
    Extension(AuthUser(user)): Extension<AuthUser>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    ildhvp_common::sse::create_event_sse_stream(
        crate::SERVICE_NAME,
        state.events.subscribe(),
        Some(user.id),
    )
}
