pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod identity;
pub mod images;
pub mod models;
pub mod rate_limit;
pub mod routes;
pub mod scoping;
pub mod state;
pub mod worker;

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use sqlx::PgPool;
use tower_http::services::ServeDir;
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::state::{AppState, SharedState};

pub fn build_app(pool: PgPool, config: Config) -> (Router, SharedState) {
    let state: SharedState = Arc::new(AppState::new(pool, config));
    (build_router(state.clone()), state)
}

pub fn build_router(state: SharedState) -> Router {
    let media = ServeDir::new(&state.config.media_root);

    Router::new()
        .merge(routes::api_routes(state.config.max_upload_size))
        .nest_service("/media", media)
        .route("/health", axum::routing::get(health))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-content-type-options"),
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("x-frame-options"),
            HeaderValue::from_static("DENY"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            HeaderName::from_static("referrer-policy"),
            HeaderValue::from_static("strict-origin-when-cross-origin"),
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
