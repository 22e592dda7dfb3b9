//! SeaORM entities, one table per module.

pub mod auth_token;
pub mod favorite;
pub mod ingredient;
pub mod ingredient_amount;
pub mod recipe;
pub mod recipe_tag;
pub mod shopping_cart;
pub mod subscription;
pub mod tag;
pub mod user;
