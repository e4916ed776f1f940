//! Owner scoping and list filters for tags, ingredients and recipes.
//!
//! Raw query-string values are parsed into typed filters, the filters are
//! turned into [`Predicate`]s, and the predicates are AND-ed into a
//! `QueryBuilder`. Every query aliases the candidate row as `c`.
//!
//! "Referenced by a recipe" checks are written as `EXISTS` semi-joins, so a
//! row matched through several recipes is still returned once.

use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::AppError;

/// The per-user attribute tables a recipe can reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Catalog {
    Tags,
    Ingredients,
}

impl Catalog {
    pub fn table(self) -> &'static str {
        match self {
            Catalog::Tags => "tags",
            Catalog::Ingredients => "ingredients",
        }
    }

    pub fn link_table(self) -> &'static str {
        match self {
            Catalog::Tags => "recipe_tags",
            Catalog::Ingredients => "recipe_ingredients",
        }
    }

    pub fn link_column(self) -> &'static str {
        match self {
            Catalog::Tags => "tag_id",
            Catalog::Ingredients => "ingredient_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    OwnedBy(Uuid),
    ReferencedByRecipe(Catalog),
    HasAnyTag(Vec<i64>),
    HasAnyIngredient(Vec<i64>),
}

impl Predicate {
    fn push_sql(self, qb: &mut QueryBuilder<'static, Postgres>) {
        match self {
            Predicate::OwnedBy(owner) => {
                qb.push("c.user_id = ").push_bind(owner);
            }
            Predicate::ReferencedByRecipe(catalog) => {
                qb.push(format!(
                    "EXISTS (SELECT 1 FROM {} l WHERE l.{} = c.id)",
                    catalog.link_table(),
                    catalog.link_column()
                ));
            }
            Predicate::HasAnyTag(ids) => push_any_link(qb, Catalog::Tags, ids),
            Predicate::HasAnyIngredient(ids) => push_any_link(qb, Catalog::Ingredients, ids),
        }
    }
}

fn push_any_link(qb: &mut QueryBuilder<'static, Postgres>, catalog: Catalog, ids: Vec<i64>) {
    qb.push(format!(
        "EXISTS (SELECT 1 FROM {} l WHERE l.recipe_id = c.id AND l.{} = ANY(",
        catalog.link_table(),
        catalog.link_column()
    ))
    .push_bind(ids)
    .push("))");
}

fn push_where(qb: &mut QueryBuilder<'static, Postgres>, predicates: Vec<Predicate>) {
    for (i, predicate) in predicates.into_iter().enumerate() {
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        predicate.push_sql(qb);
    }
}

/// Filter accepted by the tag and ingredient lists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AttributeFilter {
    pub assigned_only: bool,
}

impl AttributeFilter {
    /// `assigned_only` is an integer flag; anything non-zero enables it.
    pub fn parse(assigned_only: Option<&str>) -> Result<Self, AppError> {
        let assigned_only = match assigned_only.map(str::trim) {
            None | Some("") => false,
            Some(raw) => raw
                .parse::<i64>()
                .map(|v| v != 0)
                .map_err(|_| AppError::validation("assigned_only", "Must be an integer."))?,
        };
        Ok(Self { assigned_only })
    }

    pub fn predicates(&self, catalog: Catalog, owner: Uuid) -> Vec<Predicate> {
        let mut predicates = vec![Predicate::OwnedBy(owner)];
        if self.assigned_only {
            predicates.push(Predicate::ReferencedByRecipe(catalog));
        }
        predicates
    }
}

/// Filter accepted by the recipe list. Each clause matches on any of its
/// ids; both clauses must hold when both are given.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    pub tags: Option<Vec<i64>>,
    pub ingredients: Option<Vec<i64>>,
}

impl RecipeFilter {
    pub fn parse(tags: Option<&str>, ingredients: Option<&str>) -> Result<Self, AppError> {
        Ok(Self {
            tags: parse_optional_ids("tags", tags)?,
            ingredients: parse_optional_ids("ingredients", ingredients)?,
        })
    }

    pub fn predicates(&self, owner: Uuid) -> Vec<Predicate> {
        let mut predicates = vec![Predicate::OwnedBy(owner)];
        if let Some(ids) = &self.tags {
            predicates.push(Predicate::HasAnyTag(ids.clone()));
        }
        if let Some(ids) = &self.ingredients {
            predicates.push(Predicate::HasAnyIngredient(ids.clone()));
        }
        predicates
    }
}

/// Parse a comma-separated id list such as `1,2,3`.
pub fn parse_id_list(field: &str, raw: &str) -> Result<Vec<i64>, AppError> {
    raw.split(',')
        .map(|item| {
            let item = item.trim();
            item.parse::<i64>().map_err(|_| {
                AppError::validation(
                    field,
                    format!("Expected a comma-separated list of integers, got \"{item}\"."),
                )
            })
        })
        .collect()
}

fn parse_optional_ids(field: &str, raw: Option<&str>) -> Result<Option<Vec<i64>>, AppError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(raw) => parse_id_list(field, raw).map(Some),
    }
}

pub fn catalog_query(
    catalog: Catalog,
    owner: Uuid,
    filter: &AttributeFilter,
) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(format!("SELECT c.id, c.user_id, c.name FROM {} c", catalog.table()));
    push_where(&mut qb, filter.predicates(catalog, owner));
    qb.push(" ORDER BY c.name DESC, c.id DESC");
    qb
}

pub fn recipe_query(owner: Uuid, filter: &RecipeFilter) -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new("SELECT c.* FROM recipes c");
    push_where(&mut qb, filter.predicates(owner));
    qb.push(" ORDER BY c.id DESC");
    qb
}
