use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use rand::{rngs::OsRng, RngCore};
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Opaque bearer token, one row per user.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AuthToken {
    pub user_id: Uuid,
    pub token: String,
    pub created_at: OffsetDateTime,
}

/// 20 random bytes, hex-encoded.
pub fn generate_key() -> String {
    let mut bytes = [0u8; 20];
    OsRng.fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

impl AuthToken {
    /// Issue a fresh token for the user, replacing any prior one.
    pub async fn issue(db: &PgPool, user_id: Uuid) -> anyhow::Result<AuthToken> {
        let token = sqlx::query_as::<_, AuthToken>(
            r#"
            INSERT INTO auth_tokens (user_id, token)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET token = EXCLUDED.token, created_at = now()
            RETURNING user_id, token, created_at
            "#,
        )
        .bind(user_id)
        .bind(generate_key())
        .fetch_one(db)
        .await?;
        Ok(token)
    }

    /// Resolve a token key to the id of an active user.
    pub async fn resolve(db: &PgPool, key: &str) -> anyhow::Result<Option<Uuid>> {
        let user_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT u.id
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token = $1 AND u.is_active
            "#,
        )
        .bind(key)
        .fetch_optional(db)
        .await?;
        Ok(user_id)
    }
}

/// Extracts the bearer token and resolves it to a user id. Runs before any
/// handler logic on every protected route.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl FromRequestParts<AppState> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .ok_or_else(|| ApiError::auth("missing Authorization header"))?;

        let key = auth
            .strip_prefix("Bearer ")
            .or_else(|| auth.strip_prefix("bearer "))
            .ok_or_else(|| ApiError::auth("invalid auth scheme"))?;

        match AuthToken::resolve(&state.db, key).await? {
            Some(user_id) => Ok(AuthUser(user_id)),
            None => {
                warn!("invalid token");
                Err(ApiError::auth("invalid token"))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_keys_are_40_hex_chars() {
        let key = generate_key();
        assert_eq!(key.len(), 40);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn generated_keys_are_unique() {
        let a = generate_key();
        let b = generate_key();
        assert_ne!(a, b);
    }
}
