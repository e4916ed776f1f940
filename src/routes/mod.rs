pub mod fields;
pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod users;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;

use crate::state::SharedState;

pub fn api_routes(max_upload_size: usize) -> Router<SharedState> {
    Router::new()
        // Users
        .route("/api/user/create", post(users::create))
        .route("/api/user/token", post(users::token))
        .route(
            "/api/user/me",
            get(users::me).put(users::replace_me).patch(users::update_me),
        )
        // Catalog
        .route("/api/recipe/tags", get(tags::list).post(tags::create))
        .route(
            "/api/recipe/ingredients",
            get(ingredients::list).post(ingredients::create),
        )
        // Recipes
        .route(
            "/api/recipe/recipes",
            get(recipes::list).post(recipes::create),
        )
        .route(
            "/api/recipe/recipes/{id}",
            get(recipes::get)
                .put(recipes::replace)
                .patch(recipes::update)
                .delete(recipes::delete),
        )
        .route(
            "/api/recipe/recipes/{id}/upload-image",
            post(recipes::upload_image).layer(DefaultBodyLimit::max(max_upload_size)),
        )
}
