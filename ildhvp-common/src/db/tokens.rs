//! Web-service tokens and capabilities
//!
//! Tokens are handed to the client once and stored as SHA-256 hex digests.

use rand::{distributions::Alphanumeric, Rng};
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;

use crate::db::models::User;
use crate::Result;

const TOKEN_LENGTH: usize = 32;

/// SHA-256 hex digest of a token
pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Issue a new token for `user_id`; returns the plain token
pub async fn create_token(pool: &SqlitePool, user_id: i64) -> Result<String> {
    let token: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect();

    sqlx::query("INSERT INTO ws_tokens (token_hash, user_id) VALUES (?, ?)")
        .bind(hash_token(&token))
        .bind(user_id)
        .execute(pool)
        .await?;

    Ok(token)
}

/// User owning `token`, if any
pub async fn user_for_token(pool: &SqlitePool, token: &str) -> Result<Option<User>> {
    let user = sqlx::query_as::<_, User>(
        r#"
        SELECT u.id, u.username, u.lang, u.session_lang
        FROM ws_tokens t
        JOIN users u ON u.id = t.user_id
        WHERE t.token_hash = ?
        "#,
    )
    .bind(hash_token(token))
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn grant_capability(pool: &SqlitePool, user_id: i64, capability: &str) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO user_capabilities (user_id, capability) VALUES (?, ?)")
        .bind(user_id)
        .bind(capability)
        .execute(pool)
        .await?;

    Ok(())
}

pub async fn has_capability(pool: &SqlitePool, user_id: i64, capability: &str) -> Result<bool> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM user_capabilities WHERE user_id = ? AND capability = ?",
    )
    .bind(user_id)
    .bind(capability)
    .fetch_one(pool)
    .await?;

    Ok(count > 0)
}
