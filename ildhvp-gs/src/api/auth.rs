//! Web-service token authentication
//!
//! Protected routes accept the token as a `wstoken` query parameter or an
//! `Authorization: Bearer` header. The token owner is attached to the
//! request as an [`AuthUser`] extension.

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};
use ildhvp_common::db::{user_for_token, User};
use tracing::{debug, warn};

use super::ApiError;
use crate::AppState;

const TOKEN_QUERY_PARAM: &str = "wstoken";

/// Authenticated caller
#[derive(Debug, Clone)]
pub struct AuthUser(pub User);

fn token_from_query(query: &str) -> Option<&str> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == TOKEN_QUERY_PARAM)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

fn token_from_header(request: &Request) -> Option<&str> {
    request
        .headers()
        .get(AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Authentication middleware for protected routes
///
/// `/health` and `/api/buildinfo` are not behind it.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .uri()
        .query()
        .and_then(token_from_query)
        .or_else(|| token_from_header(&request))
        .map(str::to_string)
        .ok_or_else(|| ApiError::Unauthorized("Missing web service token".to_string()))?;

    let user = user_for_token(&state.db, &token).await?.ok_or_else(|| {
        warn!("Rejected request with unknown token to {}", request.uri().path());
        ApiError::Unauthorized("Invalid token".to_string())
    })?;

    debug!(user_id = user.id, path = %request.uri().path(), "Authenticated");
    request.extensions_mut().insert(AuthUser(user));

    Ok(next.run(request).await)
}
