use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::Json;
use axum_extra::extract::WithRejection;
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;

use crate::auth::extractor::AuthUser;
use crate::config::Config;
use crate::db;
use crate::db::recipes::RecipeFields;
use crate::error::{AppError, FieldErrors};
use crate::images;
use crate::models::{Recipe, RecipeDetail, RecipeImage, RecipeSummary};
use crate::routes::fields;
use crate::scoping::{Catalog, RecipeFilter};
use crate::state::SharedState;

#[derive(Deserialize)]
pub struct ListParams {
    pub tags: Option<String>,
    pub ingredients: Option<String>,
}

/// Body of create, PUT and PATCH. Any `user` key is ignored: the owner is
/// always the caller.
#[derive(Deserialize)]
pub struct RecipePayload {
    pub title: Option<String>,
    pub time_minutes: Option<i32>,
    pub price: Option<Decimal>,
    pub link: Option<String>,
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

/// A validated write. `None` link sets leave the existing links alone.
struct RecipeWrite {
    fields: RecipeFields,
    tags: Option<Vec<i64>>,
    ingredients: Option<Vec<i64>>,
}

impl RecipePayload {
    /// With `existing`, missing fields keep their stored values (PATCH).
    /// Without it, every field but `link` is required (create, PUT).
    fn validate(self, existing: Option<&Recipe>) -> Result<RecipeWrite, AppError> {
        let full = existing.is_none();
        let mut errors = FieldErrors::new();

        let title = fields::text(&mut errors, "title", self.title.as_deref(), full);
        let time_minutes = if full {
            fields::required(&mut errors, "time_minutes", self.time_minutes)
        } else {
            self.time_minutes
        };
        let price = if full {
            fields::required(&mut errors, "price", self.price)
        } else {
            self.price
        }
        .and_then(|p| fields::price(&mut errors, p));
        let link = match self.link.as_deref() {
            Some(link) => fields::optional_text(&mut errors, "link", link),
            None => None,
        };
        let (tags, ingredients) = if full {
            (
                fields::required(&mut errors, "tags", self.tags),
                fields::required(&mut errors, "ingredients", self.ingredients),
            )
        } else {
            (self.tags, self.ingredients)
        };

        errors.into_result()?;

        let write = match existing {
            Some(recipe) => RecipeWrite {
                fields: RecipeFields {
                    title: title.map_or_else(|| recipe.title.clone(), str::to_string),
                    time_minutes: time_minutes.unwrap_or(recipe.time_minutes),
                    price: price.unwrap_or(recipe.price),
                    link: link.map_or_else(|| recipe.link.clone(), str::to_string),
                },
                tags,
                ingredients,
            },
            None => {
                let (Some(title), Some(time_minutes), Some(price), Some(tags), Some(ingredients)) =
                    (title, time_minutes, price, tags, ingredients)
                else {
                    return Err(AppError::BadRequest("Incomplete recipe".to_string()));
                };
                RecipeWrite {
                    fields: RecipeFields {
                        title: title.to_string(),
                        time_minutes,
                        price,
                        link: link.unwrap_or_default().to_string(),
                    },
                    tags: Some(tags),
                    ingredients: Some(ingredients),
                }
            }
        };
        Ok(write)
    }
}

pub async fn list(
    auth: AuthUser,
    State(state): State<SharedState>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<RecipeSummary>>, AppError> {
    let filter = RecipeFilter::parse(params.tags.as_deref(), params.ingredients.as_deref())?;
    let recipes = db::recipes::list(&state.pool, auth.user_id, &filter).await?;
    Ok(Json(summaries(&state, recipes).await?))
}

pub async fn create(
    auth: AuthUser,
    State(state): State<SharedState>,
    WithRejection(Json(req), _): WithRejection<Json<RecipePayload>, AppError>,
) -> Result<(StatusCode, Json<RecipeSummary>), AppError> {
    let write = req.validate(None)?;

    let mut tx = state.pool.begin().await?;
    check_references(&mut tx, &write).await?;
    let recipe = db::recipes::create(&mut *tx, auth.user_id, &write.fields).await?;
    store_links(&mut tx, recipe.id, &write).await?;
    tx.commit().await?;

    tracing::info!(user_id = %auth.user_id, recipe_id = recipe.id, "recipe created");

    Ok((StatusCode::CREATED, Json(summary(&state, recipe).await?)))
}

pub async fn get(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>, AppError> {
    let recipe = find_owned(&state, id, &auth).await?;

    let tags = db::tags::list_for_recipe(&state.pool, recipe.id).await?;
    let ingredients = db::ingredients::list_for_recipe(&state.pool, recipe.id).await?;

    Ok(Json(RecipeDetail {
        id: recipe.id,
        image: image_url(&state.config, &recipe),
        title: recipe.title,
        ingredients,
        tags,
        time_minutes: recipe.time_minutes,
        price: recipe.price,
        link: recipe.link,
    }))
}

pub async fn replace(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    WithRejection(Json(req), _): WithRejection<Json<RecipePayload>, AppError>,
) -> Result<Json<RecipeSummary>, AppError> {
    find_owned(&state, id, &auth).await?;
    let write = req.validate(None)?;
    let recipe = apply(&state, id, &auth, &write).await?;
    Ok(Json(summary(&state, recipe).await?))
}

pub async fn update(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    WithRejection(Json(req), _): WithRejection<Json<RecipePayload>, AppError>,
) -> Result<Json<RecipeSummary>, AppError> {
    let existing = find_owned(&state, id, &auth).await?;
    let write = req.validate(Some(&existing))?;
    let recipe = apply(&state, id, &auth, &write).await?;
    Ok(Json(summary(&state, recipe).await?))
}

pub async fn delete(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, AppError> {
    if !db::recipes::delete(&state.pool, id, auth.user_id).await? {
        return Err(not_found());
    }

    tracing::info!(user_id = %auth.user_id, recipe_id = id, "recipe deleted");

    Ok(StatusCode::NO_CONTENT)
}

pub async fn upload_image(
    auth: AuthUser,
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<RecipeImage>, AppError> {
    find_owned(&state, id, &auth).await?;

    let upload = images::read_upload(&headers, body).await?;
    let path = state.image_paths.generate_path(&upload.file_name);
    images::store(&state.config.media_root, &path, &upload.data).await?;

    let recipe = db::recipes::set_image(&state.pool, id, auth.user_id, &path)
        .await?
        .ok_or_else(not_found)?;

    tracing::info!(
        recipe_id = recipe.id,
        format = ?upload.format,
        bytes = upload.data.len(),
        "recipe image stored at {path}"
    );

    Ok(Json(RecipeImage {
        id: recipe.id,
        image: image_url(&state.config, &recipe),
    }))
}

async fn apply(
    state: &SharedState,
    id: i64,
    auth: &AuthUser,
    write: &RecipeWrite,
) -> Result<Recipe, AppError> {
    let mut tx = state.pool.begin().await?;
    check_references(&mut tx, write).await?;
    let recipe = db::recipes::update(&mut *tx, id, auth.user_id, &write.fields)
        .await?
        .ok_or_else(not_found)?;
    store_links(&mut tx, recipe.id, write).await?;
    tx.commit().await?;
    Ok(recipe)
}

async fn find_owned(state: &SharedState, id: i64, auth: &AuthUser) -> Result<Recipe, AppError> {
    db::recipes::find_by_id_scoped(&state.pool, id, auth.user_id)
        .await?
        .ok_or_else(not_found)
}

fn not_found() -> AppError {
    AppError::NotFound("Recipe not found".to_string())
}

/// Referenced tags and ingredients must exist; their owner is not checked.
async fn check_references(conn: &mut PgConnection, write: &RecipeWrite) -> Result<(), AppError> {
    let mut errors = FieldErrors::new();

    if let Some(ids) = &write.tags {
        let found = db::tags::existing_ids(&mut *conn, ids).await?;
        missing_ids(&mut errors, Catalog::Tags, ids, &found);
    }
    if let Some(ids) = &write.ingredients {
        let found = db::ingredients::existing_ids(&mut *conn, ids).await?;
        missing_ids(&mut errors, Catalog::Ingredients, ids, &found);
    }

    errors.into_result()
}

fn missing_ids(errors: &mut FieldErrors, catalog: Catalog, wanted: &[i64], found: &[i64]) {
    for id in wanted.iter().filter(|id| !found.contains(id)) {
        errors.add(
            catalog.table(),
            format!("Invalid pk \"{id}\" - object does not exist."),
        );
    }
}

async fn store_links(conn: &mut PgConnection, recipe_id: i64, write: &RecipeWrite) -> Result<(), AppError> {
    let sets = [
        (Catalog::Tags, write.tags.as_deref()),
        (Catalog::Ingredients, write.ingredients.as_deref()),
    ];
    for (catalog, ids) in sets {
        if let Some(ids) = ids {
            db::recipes::replace_links(conn, catalog, recipe_id, ids)
                .await
                .map_err(|e| integrity_error(catalog, e))?;
        }
    }
    Ok(())
}

/// A link whose target was deleted after `check_references` ran.
fn integrity_error(catalog: Catalog, e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_foreign_key_violation() => {
            AppError::validation(catalog.table(), "Referenced object does not exist.")
        }
        _ => AppError::Database(e),
    }
}

fn image_url(config: &Config, recipe: &Recipe) -> Option<String> {
    recipe.image.as_deref().map(|path| config.media_url(path))
}

async fn summary(state: &SharedState, recipe: Recipe) -> Result<RecipeSummary, AppError> {
    let mut items = summaries(state, vec![recipe]).await?;
    items
        .pop()
        .ok_or_else(|| AppError::Internal("recipe summary missing".to_string()))
}

async fn summaries(state: &SharedState, recipes: Vec<Recipe>) -> Result<Vec<RecipeSummary>, AppError> {
    let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();
    let mut tags = db::recipes::links(&state.pool, Catalog::Tags, &ids).await?;
    let mut ingredients = db::recipes::links(&state.pool, Catalog::Ingredients, &ids).await?;

    Ok(recipes
        .into_iter()
        .map(|recipe| RecipeSummary {
            id: recipe.id,
            image: image_url(&state.config, &recipe),
            ingredients: ingredients.remove(&recipe.id).unwrap_or_default(),
            tags: tags.remove(&recipe.id).unwrap_or_default(),
            title: recipe.title,
            time_minutes: recipe.time_minutes,
            price: recipe.price,
            link: recipe.link,
        })
        .collect())
}
