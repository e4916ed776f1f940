use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Tag;
use crate::scoping::{self, AttributeFilter, Catalog};

pub async fn list(
    pool: &PgPool,
    user_id: Uuid,
    filter: &AttributeFilter,
) -> Result<Vec<Tag>, sqlx::Error> {
    let mut query = scoping::catalog_query(Catalog::Tags, user_id, filter);
    query.build_query_as::<Tag>().fetch_all(pool).await
}

pub async fn create(pool: &PgPool, user_id: Uuid, name: &str) -> Result<Tag, sqlx::Error> {
    sqlx::query_as::<_, Tag>(
        "INSERT INTO tags (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
    )
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await
}

/// Which of `ids` exist, regardless of owner.
pub async fn existing_ids<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(executor)
        .await
}

pub async fn list_for_recipe(pool: &PgPool, recipe_id: i64) -> Result<Vec<Tag>, sqlx::Error> {
    sqlx::query_as::<_, Tag>(
        "SELECT t.id, t.user_id, t.name FROM tags t
         JOIN recipe_tags rt ON rt.tag_id = t.id
         WHERE rt.recipe_id = $1 ORDER BY t.id",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
}
