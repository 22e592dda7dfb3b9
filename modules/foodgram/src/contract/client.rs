use async_trait::async_trait;

use crate::contract::{
    error::FoodgramError,
    model::{Ingredient, Recipe, Tag, User},
};

/// Public API of the foodgram module for other modules. Calls are anonymous
/// unless a `viewer` is given.
#[async_trait]
pub trait FoodgramApi: Send + Sync {
    async fn get_user(&self, id: i64, viewer: Option<i64>) -> Result<User, FoodgramError>;

    async fn get_recipe(&self, id: i64, viewer: Option<i64>) -> Result<Recipe, FoodgramError>;

    async fn list_tags(&self) -> Result<Vec<Tag>, FoodgramError>;

    /// Case-insensitive prefix search, ordered by name.
    async fn search_ingredients(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>, FoodgramError>;

    /// Rendered shopping list of the user's cart.
    async fn shopping_list(&self, user_id: i64) -> Result<String, FoodgramError>;
}
