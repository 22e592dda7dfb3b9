use async_trait::async_trait;
use modkit::PageRequest;

use crate::contract::model::{
    CurrentUser, Ingredient, IngredientAmountInput, Recipe, RecipeFilter, RecipeShort, Role, Tag,
    User,
};

/// Join tables that pair a user with a recipe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeRelation {
    Favorite,
    ShoppingCart,
}

/// Result of a write guarded by a unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome<T> {
    Written(T),
    /// The storage rejected the write as a duplicate.
    Conflict,
}

#[derive(Debug, Clone)]
pub struct NewUserRecord {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password_hash: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: i64,
    pub password_hash: String,
}

/// Owner and stored image of a recipe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeMeta {
    pub author_id: i64,
    pub image: String,
}

#[derive(Debug, Clone)]
pub struct RecipeRecord {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    /// `None` leaves the stored image untouched on update.
    pub image: Option<String>,
    pub tags: Vec<i64>,
    pub ingredients: Vec<IngredientAmountInput>,
}

/// One ingredient row of a recipe in a user's cart, before aggregation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub name: String,
    pub measurement_unit: String,
    pub amount: i64,
}

/// Persistence port of the domain. `viewer` drives the existence annotations
/// (`is_subscribed`, `is_favorited`, `is_in_shopping_cart`).
#[async_trait]
pub trait FoodgramRepository: Send + Sync {
    // users
    async fn find_user(&self, id: i64, viewer: Option<i64>) -> anyhow::Result<Option<User>>;
    async fn list_users(&self, viewer: Option<i64>, page: PageRequest) -> anyhow::Result<(Vec<User>, u64)>;
    async fn email_taken(&self, email: &str) -> anyhow::Result<bool>;
    async fn username_taken(&self, username: &str) -> anyhow::Result<bool>;
    async fn insert_user(&self, user: NewUserRecord) -> anyhow::Result<WriteOutcome<i64>>;
    async fn find_credentials_by_email(&self, email: &str) -> anyhow::Result<Option<Credentials>>;
    async fn find_password_hash(&self, user_id: i64) -> anyhow::Result<Option<String>>;
    async fn update_password_hash(&self, user_id: i64, hash: &str) -> anyhow::Result<()>;

    // tokens
    async fn find_token(&self, user_id: i64) -> anyhow::Result<Option<String>>;
    async fn insert_token(&self, user_id: i64, key: &str) -> anyhow::Result<WriteOutcome<()>>;
    async fn delete_tokens(&self, user_id: i64) -> anyhow::Result<u64>;
    async fn find_user_by_token(&self, key: &str) -> anyhow::Result<Option<CurrentUser>>;

    // subscriptions
    async fn add_subscription(&self, user_id: i64, author_id: i64) -> anyhow::Result<bool>;
    async fn remove_subscription(&self, user_id: i64, author_id: i64) -> anyhow::Result<bool>;
    async fn list_subscriptions(&self, user_id: i64, page: PageRequest) -> anyhow::Result<(Vec<User>, u64)>;
    /// Newest first, capped at `limit`, plus the uncapped total.
    async fn author_recipes(&self, author_id: i64, limit: Option<u64>) -> anyhow::Result<(Vec<RecipeShort>, u64)>;

    // tags and ingredients
    async fn list_tags(&self) -> anyhow::Result<Vec<Tag>>;
    async fn find_tag(&self, id: i64) -> anyhow::Result<Option<Tag>>;
    async fn search_ingredients(&self, prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>>;
    async fn find_ingredient(&self, id: i64) -> anyhow::Result<Option<Ingredient>>;
    /// Ids from `ids` that do not exist.
    async fn missing_tags(&self, ids: &[i64]) -> anyhow::Result<Vec<i64>>;
    async fn missing_ingredients(&self, ids: &[i64]) -> anyhow::Result<Vec<i64>>;

    // recipes
    async fn list_recipes(
        &self,
        viewer: Option<i64>,
        filter: &RecipeFilter,
        page: PageRequest,
    ) -> anyhow::Result<(Vec<Recipe>, u64)>;
    async fn find_recipe(&self, id: i64, viewer: Option<i64>) -> anyhow::Result<Option<Recipe>>;
    async fn find_recipe_short(&self, id: i64) -> anyhow::Result<Option<RecipeShort>>;
    async fn find_recipe_meta(&self, id: i64) -> anyhow::Result<Option<RecipeMeta>>;
    async fn recipe_name_taken(&self, name: &str, exclude: Option<i64>) -> anyhow::Result<bool>;
    /// Recipe row, tags and amounts in one transaction.
    async fn insert_recipe(&self, author_id: i64, record: RecipeRecord) -> anyhow::Result<WriteOutcome<i64>>;
    /// Same as insert; tags and amounts are replaced wholesale.
    async fn update_recipe(&self, id: i64, record: RecipeRecord) -> anyhow::Result<WriteOutcome<()>>;
    async fn delete_recipe(&self, id: i64) -> anyhow::Result<bool>;

    // favorites and cart
    /// `false` when the pair already exists.
    async fn add_relation(&self, kind: RecipeRelation, user_id: i64, recipe_id: i64) -> anyhow::Result<bool>;
    /// `false` when there was nothing to delete.
    async fn remove_relation(&self, kind: RecipeRelation, user_id: i64, recipe_id: i64) -> anyhow::Result<bool>;
    async fn cart_lines(&self, user_id: i64) -> anyhow::Result<Vec<CartLine>>;
}

/// Storage for uploaded images, addressed by paths relative to the media root.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn save(&self, ext: &str, bytes: &[u8]) -> anyhow::Result<String>;
    async fn remove(&self, path: &str) -> anyhow::Result<()>;
}
