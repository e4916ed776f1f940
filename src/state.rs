use std::sync::Arc;

use sqlx::PgPool;

use crate::config::Config;
use crate::images::ImagePaths;
use crate::rate_limit::LoginRateLimiter;

pub type SharedState = Arc<AppState>;

pub struct AppState {
    pub pool: PgPool,
    pub config: Config,
    pub image_paths: ImagePaths,
    pub login_limiter: LoginRateLimiter,
}

impl AppState {
    pub fn new(pool: PgPool, config: Config) -> Self {
        Self::with_image_paths(pool, config, ImagePaths::random())
    }

    pub fn with_image_paths(pool: PgPool, config: Config, image_paths: ImagePaths) -> Self {
        Self {
            pool,
            config,
            image_paths,
            login_limiter: LoginRateLimiter::new(),
        }
    }

    /// Out-of-range values saturate; `token::issue` then refuses them.
    pub fn token_ttl(&self) -> chrono::Duration {
        chrono::TimeDelta::try_hours(self.config.token_ttl_hours).unwrap_or(chrono::TimeDelta::MAX)
    }
}
