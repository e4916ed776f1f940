use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::Json;
use axum_extra::extract::WithRejection;
use serde::Deserialize;

use crate::auth::extractor::AuthUser;
use crate::db;
use crate::error::{AppError, FieldErrors};
use crate::models::Ingredient;
use crate::routes::fields;
use crate::scoping::AttributeFilter;
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ListParams {
    pub assigned_only: Option<String>,
}

#[derive(Deserialize)]
pub struct CreateIngredient {
    pub name: Option<String>,
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Ingredient>>, AppError> {
    let filter = AttributeFilter::parse(params.assigned_only.as_deref())?;
    let ingredients = db::ingredients::list(&state.pool, auth.user_id, &filter).await?;
    Ok(Json(ingredients))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<CreateIngredient>, AppError>,
) -> Result<(StatusCode, Json<Ingredient>), AppError> {
    let mut errors = FieldErrors::new();
    let Some(name) = fields::text(&mut errors, "name", req.name.as_deref(), true) else {
        return Err(AppError::Validation(errors));
    };

    let ingredient = db::ingredients::create(&state.pool, auth.user_id, name.trim()).await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}
