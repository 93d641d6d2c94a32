use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{info, instrument, warn};

use crate::error::ApiError;
use crate::state::AppState;
use crate::users::{
    dto::{
        CreateUserRequest, ProfileResponse, PublicUser, TokenRequest, TokenResponse,
        UpdateProfileRequest,
    },
    password::{hash_password, meets_min_length, verify_password},
    repo::User,
    token::{AuthToken, AuthUser},
};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/create", post(create_user))
        .route("/users/token", post(create_token))
        .route(
            "/users/profile",
            get(get_profile)
                .patch(update_profile)
                .post(method_not_allowed),
        )
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    Json(mut payload): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<PublicUser>), ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if !is_valid_email(&payload.email) {
        warn!(email = %payload.email, "invalid email");
        return Err(ApiError::validation("invalid email"));
    }
    if !meets_min_length(&payload.password) {
        warn!("password too short");
        return Err(ApiError::validation("password too short"));
    }
    if User::find_by_email(&state.db, &payload.email).await?.is_some() {
        warn!(email = %payload.email, "email already registered");
        return Err(ApiError::validation("email already registered"));
    }

    let hash = hash_password(&payload.password)?;
    let user = User::create(&state.db, &payload.email, &hash, &payload.name).await?;

    info!(user_id = %user.id, email = %user.email, "user created");
    Ok((
        StatusCode::CREATED,
        Json(PublicUser {
            id: user.id,
            email: user.email,
            name: user.name,
        }),
    ))
}

/// The token endpoint treats bad credentials as request validation, so
/// failures here are 400 rather than 401.
#[instrument(skip(state, payload))]
pub async fn create_token(
    State(state): State<AppState>,
    Json(mut payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    payload.email = payload.email.trim().to_lowercase();

    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(ApiError::validation("email and password are required"));
    }

    let rejected = || ApiError::validation("unable to authenticate with provided credentials");

    let user = match User::find_by_email(&state.db, &payload.email).await? {
        Some(u) => u,
        None => {
            warn!(email = %payload.email, "token request for unknown email");
            return Err(rejected());
        }
    };

    if !user.is_active {
        warn!(user_id = %user.id, "token request for inactive user");
        return Err(rejected());
    }

    if !verify_password(&payload.password, &user.password_hash)? {
        warn!(user_id = %user.id, "token request with invalid password");
        return Err(rejected());
    }

    // Replaces any previously issued token for this user
    let token = AuthToken::issue(&state.db, user.id).await?;

    info!(user_id = %user.id, "token issued");
    Ok(Json(TokenResponse { token: token.token }))
}

#[instrument(skip(state))]
pub async fn get_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<ProfileResponse>, ApiError> {
    let user = User::find_by_id(&state.db, user_id)
        .await?
        .ok_or_else(|| ApiError::auth("user not found"))?;

    Ok(Json(ProfileResponse {
        email: user.email,
        name: user.name,
    }))
}

#[instrument(skip(state, payload))]
pub async fn update_profile(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    Json(payload): Json<UpdateProfileRequest>,
) -> Result<Json<ProfileResponse>, ApiError> {
    let email = match payload.email {
        Some(raw) => {
            let email = raw.trim().to_lowercase();
            if !is_valid_email(&email) {
                return Err(ApiError::validation("invalid email"));
            }
            if let Some(existing) = User::find_by_email(&state.db, &email).await? {
                if existing.id != user_id {
                    return Err(ApiError::validation("email already registered"));
                }
            }
            Some(email)
        }
        None => None,
    };

    let password_hash = match payload.password {
        Some(plain) => {
            if !meets_min_length(&plain) {
                return Err(ApiError::validation("password too short"));
            }
            Some(hash_password(&plain)?)
        }
        None => None,
    };

    let user = User::update(
        &state.db,
        user_id,
        email.as_deref(),
        password_hash.as_deref(),
        payload.name.as_deref(),
    )
    .await?;

    info!(user_id = %user.id, "profile updated");
    Ok(Json(ProfileResponse {
        email: user.email,
        name: user.name,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_addresses() {
        assert!(is_valid_email("atman@druk.com"));
        assert!(is_valid_email("a.b+c@sub.example.org"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_email(""));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("two@@ats.com"));
        assert!(!is_valid_email("spaces in@mail.com"));
        assert!(!is_valid_email("nodot@host"));
    }
}
