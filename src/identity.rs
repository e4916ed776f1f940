//! Account creation and credential checks.

use std::sync::LazyLock;

use regex::Regex;
use sqlx::PgPool;

use crate::auth::password;
use crate::db;
use crate::error::AppError;
use crate::models::User;

pub const MIN_PASSWORD_LEN: usize = 5;
pub const MAX_FIELD_LEN: usize = 255;

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("valid email regex"));

/// Emails are stored trimmed and lower-cased so lookups are case-insensitive.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    email.len() <= MAX_FIELD_LEN && EMAIL_RE.is_match(email)
}

/// Non-credential columns set at creation.
#[derive(Debug, Clone)]
pub struct UserFields {
    pub name: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Default for UserFields {
    fn default() -> Self {
        Self {
            name: String::new(),
            is_active: true,
            is_staff: false,
            is_superuser: false,
        }
    }
}

/// Create a user. A missing password stores a hash nothing verifies against.
pub async fn create_user<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: Option<&str>,
    password: Option<&str>,
    fields: UserFields,
) -> Result<User, AppError> {
    let email = email.map(normalize_email).unwrap_or_default();
    if email.is_empty() {
        return Err(AppError::validation("email", "Users must have an email address."));
    }

    let password_hash = match password {
        Some(p) => password::hash(p).map_err(AppError::Internal)?,
        None => password::unusable(),
    };

    db::users::create(
        executor,
        &email,
        &password_hash,
        &fields.name,
        fields.is_active,
        fields.is_staff,
        fields.is_superuser,
    )
    .await
    .map_err(duplicate_email)
}

pub async fn create_superuser(pool: &PgPool, email: &str, password: &str) -> Result<User, AppError> {
    let mut tx = pool.begin().await?;
    let user = create_user(&mut *tx, Some(email), Some(password), UserFields::default()).await?;
    let user = db::users::set_privileges(&mut *tx, user.id, true, true).await?;
    tx.commit().await?;

    tracing::info!(user_id = %user.id, "superuser created");
    Ok(user)
}

pub fn verify_password(user: &User, candidate: &str) -> bool {
    if !password::is_usable(&user.password_hash) {
        return false;
    }
    match password::verify(candidate, &user.password_hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(user_id = %user.id, "Stored password hash unreadable: {e}");
            false
        }
    }
}

/// Map a unique violation on `users.email` to a field error.
pub fn duplicate_email(e: sqlx::Error) -> AppError {
    match e {
        sqlx::Error::Database(ref db_err) if db_err.is_unique_violation() => {
            AppError::validation("email", "A user with this email already exists.")
        }
        _ => AppError::Database(e),
    }
}
