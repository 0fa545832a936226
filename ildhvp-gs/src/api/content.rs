//! Read-only content metadata

use axum::{
    extract::{Path, State},
    Json,
};
use ildhvp_common::content::{handler_name, LibraryName};
use ildhvp_common::db::get_content;
use ildhvp_common::{analysis::analyze_content, AnalysisResult};
use serde::Serialize;
use serde_json::Value;

use super::ApiError;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct ContentResponse {
    pub id: i64,
    pub title: String,
    pub library: String,
    pub machine_name: String,
    pub handler: Option<String>,
    pub version: Option<String>,
    pub params: Value,
    pub analysis: AnalysisResult,
}

/// GET /api/contents/:id
pub async fn get_content_handler(
    State(state): State<AppState>,
    Path(content_id): Path<i64>,
) -> Result<Json<ContentResponse>, ApiError> {
    let content = get_content(&state.db, content_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Content {} not found", content_id)))?;

    let params = content.params_json();
    let library = LibraryName::parse(&content.library);
    let analysis = analyze_content(&content.library, &params);

    Ok(Json(ContentResponse {
        id: content.id,
        handler: handler_name(&content.library),
        machine_name: library.machine_name.clone(),
        version: library.version(),
        title: content.title,
        library: content.library,
        params,
        analysis,
    }))
}
