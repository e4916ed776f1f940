use std::net::IpAddr;
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub host: IpAddr,
    pub port: u16,
    pub base_url: String,
    pub media_root: PathBuf,
    pub max_upload_size: usize,
    pub token_ttl_hours: i64,
    pub log_level: String,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let database_url = env_required("DATABASE_URL")?;

        let host: IpAddr = env_or("RECIPE_API_HOST", "0.0.0.0")
            .parse()
            .map_err(|e| format!("Invalid RECIPE_API_HOST: {e}"))?;

        let port: u16 = env_or("RECIPE_API_PORT", "8000")
            .parse()
            .map_err(|e| format!("Invalid RECIPE_API_PORT: {e}"))?;

        let base_url = env_or("RECIPE_API_BASE_URL", &format!("http://{host}:{port}"));

        let media_root = PathBuf::from(env_or("RECIPE_API_MEDIA_ROOT", "media"));

        let max_upload_size: usize = env_or("RECIPE_API_MAX_UPLOAD_SIZE", "10485760")
            .parse()
            .map_err(|e| format!("Invalid RECIPE_API_MAX_UPLOAD_SIZE: {e}"))?;

        let token_ttl_hours = parse_token_ttl(&env_or("RECIPE_API_TOKEN_TTL_HOURS", "720"))?;

        let log_level = env_or("RECIPE_API_LOG_LEVEL", "info");

        Ok(Config {
            database_url,
            host,
            port,
            base_url,
            media_root,
            max_upload_size,
            token_ttl_hours,
            log_level,
        })
    }

    /// Public URL of a file stored under the media root.
    pub fn media_url(&self, relative_path: &str) -> String {
        format!(
            "{}/media/{}",
            self.base_url.trim_end_matches('/'),
            relative_path.trim_start_matches('/')
        )
    }
}

/// Positive and small enough that `now + ttl` stays a valid timestamp.
fn parse_token_ttl(raw: &str) -> Result<i64, String> {
    let hours: i64 = raw
        .parse()
        .map_err(|e| format!("Invalid RECIPE_API_TOKEN_TTL_HOURS: {e}"))?;
    if hours <= 0 {
        return Err("RECIPE_API_TOKEN_TTL_HOURS must be positive".to_string());
    }
    chrono::TimeDelta::try_hours(hours)
        .and_then(|ttl| chrono::Utc::now().checked_add_signed(ttl))
        .ok_or_else(|| format!("RECIPE_API_TOKEN_TTL_HOURS out of range: {hours}"))?;
    Ok(hours)
}

fn env_required(key: &str) -> Result<String, String> {
    std::env::var(key).map_err(|_| format!("Missing required environment variable: {key}"))
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
