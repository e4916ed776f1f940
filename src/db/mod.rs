pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod tokens;
pub mod users;

use std::future::Future;
use std::time::Duration;

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

pub async fn connect(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await
}

/// Call `connect` until it succeeds, sleeping `interval` between failed
/// attempts. Gives up with the last error after `max_attempts`.
pub async fn retry_connect<T, F, Fut>(
    mut connect: F,
    max_attempts: u32,
    interval: Duration,
) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, sqlx::Error>>,
{
    let mut attempt = 1;
    loop {
        match connect().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts => {
                tracing::info!(attempt, "Database unavailable ({e}), waiting {interval:?}");
                tokio::time::sleep(interval).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
