use sqlx::PgPool;
use uuid::Uuid;

use crate::models::User;

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    email: &str,
    password_hash: &str,
    name: &str,
    is_active: bool,
    is_staff: bool,
    is_superuser: bool,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "INSERT INTO users (email, password_hash, name, is_active, is_staff, is_superuser)
         VALUES ($1, $2, $3, $4, $5, $6) RETURNING *",
    )
    .bind(email)
    .bind(password_hash)
    .bind(name)
    .bind(is_active)
    .bind(is_staff)
    .bind(is_superuser)
    .fetch_one(executor)
    .await
}

pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await
}

pub async fn find_by_id<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
) -> Result<Option<User>, sqlx::Error> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(executor)
        .await
}

pub async fn update_profile<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    email: &str,
    name: &str,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>("UPDATE users SET email = $2, name = $3 WHERE id = $1 RETURNING *")
        .bind(id)
        .bind(email)
        .bind(name)
        .fetch_one(executor)
        .await
}

pub async fn update_password<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    password_hash: &str,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
        .bind(id)
        .bind(password_hash)
        .execute(executor)
        .await?;
    Ok(())
}

pub async fn set_privileges<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: Uuid,
    is_staff: bool,
    is_superuser: bool,
) -> Result<User, sqlx::Error> {
    sqlx::query_as::<_, User>(
        "UPDATE users SET is_staff = $2, is_superuser = $3 WHERE id = $1 RETURNING *",
    )
    .bind(id)
    .bind(is_staff)
    .bind(is_superuser)
    .fetch_one(executor)
    .await
}

/// Removes the user; tokens, tags, ingredients and recipes go with it.
pub async fn delete(pool: &PgPool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM users WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
