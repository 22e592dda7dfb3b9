//! Foodgram: recipes with tags and ingredients, favorites, a shopping cart
//! that aggregates into a downloadable list, and author subscriptions.

pub mod api;
pub mod config;
pub mod contract;
pub mod domain;
pub mod gateways;
pub mod infra;
pub mod module;

pub use config::FoodgramConfig;
pub use contract::{FoodgramApi, FoodgramError};
pub use infra::import::{import_data, FileReport, ImportReport};
pub use module::{register, FoodgramModule, MODULE_NAME};
