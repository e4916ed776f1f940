use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, sqlx::FromRow, Serialize, Deserialize)]
pub struct Ingredient {
    pub id: i64,
    #[serde(skip_serializing)]
    pub user_id: Uuid,
    pub name: String,
}
