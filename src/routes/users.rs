use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::WithRejection;
use serde::{Deserialize, Serialize};

use crate::auth::extractor::{AuthUser, INVALID_TOKEN};
use crate::auth::{password, token};
use crate::db;
use crate::error::{AppError, FieldErrors};
use crate::identity::{self, UserFields};
use crate::models::UserProfile;
use crate::routes::fields;
use crate::state::SharedState;

const INVALID_CREDENTIALS: &str = "Unable to authenticate with provided credentials";

#[derive(Deserialize)]
pub struct CreateUserRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Deserialize)]
pub struct TokenRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
}

#[derive(Serialize)]
pub struct TokenResponse {
    pub token: String,
}

pub async fn create(
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateUserRequest>, AppError>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let mut errors = FieldErrors::new();
    let email = fields::text(&mut errors, "email", req.email.as_deref(), true)
        .and_then(|e| fields::email(&mut errors, e));
    let password = fields::text(&mut errors, "password", req.password.as_deref(), true)
        .and_then(|p| fields::password(&mut errors, p));
    let name = fields::text(&mut errors, "name", req.name.as_deref(), true);

    let (Some(email), Some(password), Some(name)) = (email, password, name) else {
        return Err(AppError::Validation(errors));
    };

    let user = identity::create_user(
        &state.pool,
        Some(&email),
        Some(password),
        UserFields {
            name: name.to_string(),
            ..UserFields::default()
        },
    )
    .await?;

    tracing::info!(user_id = %user.id, "user registered");

    Ok((StatusCode::CREATED, Json(user.into())))
}

pub async fn token(
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<TokenRequest>, AppError>,
) -> Result<Json<TokenResponse>, AppError> {
    let mut errors = FieldErrors::new();
    let email = fields::text(&mut errors, "email", req.email.as_deref(), true);
    let password = fields::text(&mut errors, "password", req.password.as_deref(), true);
    let (Some(email), Some(password)) = (email, password) else {
        return Err(AppError::Validation(errors));
    };
    let email = identity::normalize_email(email);

    if state.login_limiter.check(&email).is_err() {
        tracing::warn!("Login rate limit reached");
        return Err(AppError::RateLimited(
            "Too many login attempts. Please try again later.".to_string(),
        ));
    }

    let user = match db::users::find_by_email(&state.pool, &email).await? {
        Some(user) if user.is_active && identity::verify_password(&user, password) => user,
        _ => {
            state.login_limiter.record_failure(&email);
            return Err(AppError::BadRequest(INVALID_CREDENTIALS.to_string()));
        }
    };
    state.login_limiter.clear(&email);

    let token = token::issue(&state.pool, user.id, state.token_ttl()).await?;

    tracing::info!(user_id = %user.id, "token issued");

    Ok(Json(TokenResponse { token }))
}

pub async fn me(
    auth: AuthUser,
    State(state): State<SharedState>,
) -> Result<Json<UserProfile>, AppError> {
    let user = db::users::find_by_id(&state.pool, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.to_string()))?;
    Ok(Json(user.into()))
}

/// PUT: email, password and name are all required.
pub async fn replace_me(
    auth: AuthUser,
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateMeRequest>, AppError>,
) -> Result<Json<UserProfile>, AppError> {
    update(&state, &auth, req, false).await
}

/// PATCH: only the given fields change.
pub async fn update_me(
    auth: AuthUser,
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<UpdateMeRequest>, AppError>,
) -> Result<Json<UserProfile>, AppError> {
    update(&state, &auth, req, true).await
}

async fn update(
    state: &SharedState,
    auth: &AuthUser,
    req: UpdateMeRequest,
    partial: bool,
) -> Result<Json<UserProfile>, AppError> {
    let mut errors = FieldErrors::new();
    let email = fields::text(&mut errors, "email", req.email.as_deref(), !partial)
        .and_then(|e| fields::email(&mut errors, e));
    let new_password = fields::text(&mut errors, "password", req.password.as_deref(), !partial)
        .and_then(|p| fields::password(&mut errors, p));
    let name = fields::text(&mut errors, "name", req.name.as_deref(), !partial);
    errors.into_result()?;

    let mut tx = state.pool.begin().await?;

    let current = db::users::find_by_id(&mut *tx, auth.user_id)
        .await?
        .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.to_string()))?;

    let user = db::users::update_profile(
        &mut *tx,
        current.id,
        email.as_deref().unwrap_or(&current.email),
        name.unwrap_or(&current.name),
    )
    .await
    .map_err(identity::duplicate_email)?;

    if let Some(new_password) = new_password {
        let pw_hash = password::hash(new_password).map_err(AppError::Internal)?;
        db::users::update_password(&mut *tx, user.id, &pw_hash).await?;
    }

    tx.commit().await?;

    Ok(Json(user.into()))
}
