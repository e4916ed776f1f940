pub mod auth_token;
pub mod ingredient;
pub mod recipe;
pub mod tag;
pub mod user;

pub use auth_token::AuthToken;
pub use ingredient::Ingredient;
pub use recipe::{Recipe, RecipeDetail, RecipeImage, RecipeSummary};
pub use tag::Tag;
pub use user::{User, UserProfile};
