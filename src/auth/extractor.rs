use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use uuid::Uuid;

use crate::auth::token;
use crate::error::AppError;
use crate::state::SharedState;

/// Same body for every authentication failure.
pub const INVALID_TOKEN: &str = "Invalid or missing authentication token";

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: String,
}

impl FromRequestParts<SharedState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &SharedState,
    ) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| AppError::Unauthorized(INVALID_TOKEN.to_string()))?;

        let user = token::authenticate(&state.pool, bearer.token())
            .await?
            .ok_or_else(|| AppError::Unauthorized(INVALID_TOKEN.to_string()))?;

        Ok(AuthUser {
            user_id: user.id,
            email: user.email,
        })
    }
}
