use std::collections::HashMap;

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::models::Recipe;
use crate::scoping::{self, Catalog, RecipeFilter};

/// Writable columns of a recipe. Owner and id are never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecipeFields {
    pub title: String,
    pub time_minutes: i32,
    pub price: Decimal,
    pub link: String,
}

pub async fn list(
    pool: &PgPool,
    user_id: Uuid,
    filter: &RecipeFilter,
) -> Result<Vec<Recipe>, sqlx::Error> {
    let mut query = scoping::recipe_query(user_id, filter);
    query.build_query_as::<Recipe>().fetch_all(pool).await
}

pub async fn find_by_id_scoped<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
    user_id: Uuid,
) -> Result<Option<Recipe>, sqlx::Error> {
    sqlx::query_as::<_, Recipe>("SELECT * FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .fetch_optional(executor)
        .await
}

pub async fn create<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    user_id: Uuid,
    fields: &RecipeFields,
) -> Result<Recipe, sqlx::Error> {
    sqlx::query_as::<_, Recipe>(
        "INSERT INTO recipes (user_id, title, time_minutes, price, link)
         VALUES ($1, $2, $3, $4, $5) RETURNING *",
    )
    .bind(user_id)
    .bind(&fields.title)
    .bind(fields.time_minutes)
    .bind(fields.price)
    .bind(&fields.link)
    .fetch_one(executor)
    .await
}

pub async fn update<'e, E: sqlx::PgExecutor<'e>>(
    executor: E,
    id: i64,
    user_id: Uuid,
    fields: &RecipeFields,
) -> Result<Option<Recipe>, sqlx::Error> {
    sqlx::query_as::<_, Recipe>(
        "UPDATE recipes
         SET title = $3, time_minutes = $4, price = $5, link = $6, updated_at = now()
         WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .bind(&fields.title)
    .bind(fields.time_minutes)
    .bind(fields.price)
    .bind(&fields.link)
    .fetch_optional(executor)
    .await
}

/// Replace the recipe's links into `catalog` with `ids`. Run inside the
/// transaction that wrote the recipe row.
pub async fn replace_links(
    conn: &mut PgConnection,
    catalog: Catalog,
    recipe_id: i64,
    ids: &[i64],
) -> Result<(), sqlx::Error> {
    let table = catalog.link_table();
    let column = catalog.link_column();

    sqlx::query(&format!("DELETE FROM {table} WHERE recipe_id = $1"))
        .bind(recipe_id)
        .execute(&mut *conn)
        .await?;

    if !ids.is_empty() {
        sqlx::query(&format!(
            "INSERT INTO {table} (recipe_id, {column})
             SELECT $1, linked FROM unnest($2::bigint[]) AS linked
             ON CONFLICT DO NOTHING"
        ))
        .bind(recipe_id)
        .bind(ids)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

/// recipe id -> linked ids in `catalog`, for every recipe in `recipe_ids`.
pub async fn links(
    pool: &PgPool,
    catalog: Catalog,
    recipe_ids: &[i64],
) -> Result<HashMap<i64, Vec<i64>>, sqlx::Error> {
    let rows: Vec<(i64, i64)> = sqlx::query_as(&format!(
        "SELECT recipe_id, {column} FROM {table}
         WHERE recipe_id = ANY($1) ORDER BY recipe_id, {column}",
        table = catalog.link_table(),
        column = catalog.link_column(),
    ))
    .bind(recipe_ids)
    .fetch_all(pool)
    .await?;

    let mut map: HashMap<i64, Vec<i64>> = HashMap::new();
    for (recipe_id, linked) in rows {
        map.entry(recipe_id).or_default().push(linked);
    }
    Ok(map)
}

pub async fn set_image(
    pool: &PgPool,
    id: i64,
    user_id: Uuid,
    image: &str,
) -> Result<Option<Recipe>, sqlx::Error> {
    sqlx::query_as::<_, Recipe>(
        "UPDATE recipes SET image = $3, updated_at = now()
         WHERE id = $1 AND user_id = $2 RETURNING *",
    )
    .bind(id)
    .bind(user_id)
    .bind(image)
    .fetch_optional(pool)
    .await
}

pub async fn delete(pool: &PgPool, id: i64, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM recipes WHERE id = $1 AND user_id = $2")
        .bind(id)
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
