//! Pure models for inter-module communication (no serde/OpenAPI).

use chrono::{DateTime, Utc};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Guest,
    Authorized,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Guest => "guest",
            Role::Authorized => "authorized",
            Role::Admin => "admin",
        }
    }

    /// Unknown values degrade to `Guest`.
    pub fn parse(s: &str) -> Self {
        match s {
            "admin" => Role::Admin,
            "authorized" => Role::Authorized,
            _ => Role::Guest,
        }
    }
}

/// The authenticated requester.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub id: i64,
    pub role: Role,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// A user as seen by a viewer; `is_subscribed` is false for anonymous viewers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub color: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ingredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

/// Ingredient line of a recipe; `id` is the ingredient id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeIngredient {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipe {
    pub id: i64,
    pub author: User,
    pub name: String,
    /// Path relative to the media root, empty when the recipe has no image.
    pub image: String,
    pub text: String,
    pub cooking_time: i32,
    pub pub_date: DateTime<Utc>,
    pub tags: Vec<Tag>,
    pub ingredients: Vec<RecipeIngredient>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeShort {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i32,
}

impl From<&Recipe> for RecipeShort {
    fn from(r: &Recipe) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            image: r.image.clone(),
            cooking_time: r.cooking_time,
        }
    }
}

/// A followed author with their newest recipes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subscription {
    pub author: User,
    pub recipes: Vec<RecipeShort>,
    /// Total number of the author's recipes, regardless of any limit.
    pub recipes_count: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecipeFilter {
    /// Tag slugs; a recipe matches when it has any of them.
    pub tags: BTreeSet<String>,
    pub author: Option<i64>,
    pub is_favorited: Option<bool>,
    pub is_in_shopping_cart: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngredientAmountInput {
    pub id: i64,
    pub amount: i32,
}

/// Decoded image upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewImage {
    /// Lowercase file extension without the dot.
    pub ext: String,
    pub bytes: Vec<u8>,
}

/// Create/update payload. `image: None` keeps the current image on update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipeDraft {
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
    pub tags: Vec<i64>,
    pub ingredients: Vec<IngredientAmountInput>,
    pub image: Option<NewImage>,
}
