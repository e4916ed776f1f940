//! Opaque bearer tokens. Clients hold the random token; only its sha256
//! digest is stored.

use chrono::{DateTime, Duration, Utc};
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use crate::db;
use crate::error::AppError;
use crate::models::User;

pub fn generate() -> String {
    let bytes: [u8; 32] = rand::random();
    hex::encode(bytes)
}

pub fn hash_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Create a token for `user_id` and return the plaintext to hand out.
pub async fn issue(pool: &PgPool, user_id: Uuid, ttl: Duration) -> Result<String, AppError> {
    let expires_at = expiry(ttl)?;
    let token = generate();
    db::tokens::create(pool, user_id, &hash_token(&token), expires_at).await?;
    Ok(token)
}

fn expiry(ttl: Duration) -> Result<DateTime<Utc>, AppError> {
    Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| AppError::Internal(format!("token lifetime out of range: {ttl}")))
}

/// The active user the token belongs to, if the token is known and unexpired.
pub async fn authenticate(pool: &PgPool, token: &str) -> Result<Option<User>, sqlx::Error> {
    db::tokens::find_active_user(pool, &hash_token(token)).await
}
