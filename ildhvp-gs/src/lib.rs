//! ildhvp-gs library - H5P grade service
//!
//! HTTP surface of the scoring bridge: the `setgrade` web service, content
//! metadata, per-view scoring sessions fed with xAPI statements, and an SSE
//! stream of section progress.

use axum::Router;
use chrono::Utc;
use ildhvp_common::db::GradebookSink;
use ildhvp_common::events::IldEvent;
use ildhvp_common::progress::SectionProgress;
use ildhvp_common::sink::ResultSink;
use sqlx::SqlitePool;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod session;
pub mod sink;

use session::SessionRegistry;

/// Name reported by `/health` and in SSE logs
pub const SERVICE_NAME: &str = "ildhvp-gs";

const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    /// Where session results are persisted
    pub sink: Arc<dyn ResultSink>,
    pub sessions: Arc<SessionRegistry>,
    pub events: broadcast::Sender<IldEvent>,
}

impl AppState {
    /// State persisting session results into the local gradebook
    pub fn new(db: SqlitePool) -> Self {
        let sink = Arc::new(GradebookSink::new(db.clone()));
        Self::with_sink(db, sink)
    }

    pub fn with_sink(db: SqlitePool, sink: Arc<dyn ResultSink>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            sink,
            sessions: Arc::new(SessionRegistry::new()),
            events,
        }
    }

    /// Replace the session registry, e.g. one with a configured idle TTL
    pub fn with_sessions(mut self, sessions: SessionRegistry) -> Self {
        self.sessions = Arc::new(sessions);
        self
    }

    /// Broadcast an event; having no subscribers is fine
    pub fn publish(&self, event: IldEvent) {
        let _ = self.events.send(event);
    }

    pub fn publish_progress(&self, user_id: i64, progress: SectionProgress) {
        self.publish(IldEvent::SectionProgressUpdated {
            user_id,
            section_id: progress.section_id,
            percentage: progress.percentage,
            timestamp: Utc::now(),
        });
    }
}

/// Build application router
///
/// `/health` and `/api/buildinfo` are public; everything else requires a
/// web-service token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::{get, post};

    let protected = Router::new()
        .route("/webservice/setgrade", post(api::set_grade_handler))
        .route("/api/contents/:id", get(api::get_content_handler))
        .route("/api/sessions", post(api::create_session))
        .route(
            "/api/sessions/:id",
            get(api::get_session).delete(api::close_session),
        )
        .route("/api/sessions/:id/statements", post(api::post_statement))
        .route("/api/events", get(api::event_stream))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
