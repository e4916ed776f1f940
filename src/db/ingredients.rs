use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Ingredient;
use crate::scoping::{self, AttributeFilter, Catalog};

pub async fn list(
    pool: &PgPool,
    user_id: Uuid,
    filter: &AttributeFilter,
) -> Result<Vec<Ingredient>, sqlx::Error> {
    let mut query = scoping::catalog_query(Catalog::Ingredients, user_id, filter);
    query.build_query_as::<Ingredient>().fetch_all(pool).await
}

pub async fn create(pool: &PgPool, user_id: Uuid, name: &str) -> Result<Ingredient, sqlx::Error> {
    sqlx::query_as::<_, Ingredient>(
        "INSERT INTO ingredients (user_id, name) VALUES ($1, $2) RETURNING id, user_id, name",
    )
    .bind(user_id)
    .bind(name)
    .fetch_one(pool)
    .await
}

pub async fn existing_ids<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    ids: &[i64],
) -> Result<Vec<i64>, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM ingredients WHERE id = ANY($1)")
        .bind(ids)
        .fetch_all(executor)
        .await
}

pub async fn list_for_recipe(
    pool: &PgPool,
    recipe_id: i64,
) -> Result<Vec<Ingredient>, sqlx::Error> {
    sqlx::query_as::<_, Ingredient>(
        "SELECT i.id, i.user_id, i.name FROM ingredients i
         JOIN recipe_ingredients ri ON ri.ingredient_id = i.id
         WHERE ri.recipe_id = $1 ORDER BY i.id",
    )
    .bind(recipe_id)
    .fetch_all(pool)
    .await
}
