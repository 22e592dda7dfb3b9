use std::sync::Arc;

use async_trait::async_trait;

use crate::contract::{
    client::FoodgramApi,
    error::FoodgramError,
    model::{Ingredient, Recipe, Tag, User},
};
use crate::domain::{error::DomainError, service::Service};

/// In-process implementation of [`FoodgramApi`] over the domain service.
pub struct FoodgramLocalClient {
    service: Arc<Service>,
}

impl FoodgramLocalClient {
    pub fn new(service: Arc<Service>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl FoodgramApi for FoodgramLocalClient {
    async fn get_user(&self, id: i64, viewer: Option<i64>) -> Result<User, FoodgramError> {
        self.service.get_user(id, viewer).await.map_err(Into::into)
    }

    async fn get_recipe(&self, id: i64, viewer: Option<i64>) -> Result<Recipe, FoodgramError> {
        self.service.get_recipe(id, viewer).await.map_err(Into::into)
    }

    async fn list_tags(&self) -> Result<Vec<Tag>, FoodgramError> {
        self.service.list_tags().await.map_err(Into::into)
    }

    async fn search_ingredients(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>, FoodgramError> {
        self.service
            .search_ingredients(prefix)
            .await
            .map_err(Into::into)
    }

    async fn shopping_list(&self, user_id: i64) -> Result<String, FoodgramError> {
        self.service.shopping_list(user_id).await.map_err(Into::into)
    }
}

impl From<DomainError> for FoodgramError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::RecipeNotFound { id } => FoodgramError::not_found("recipe", id),
            DomainError::UserNotFound { id } => FoodgramError::not_found("user", id),
            DomainError::TagNotFound { id } => FoodgramError::not_found("tag", id),
            DomainError::IngredientNotFound { id } => FoodgramError::not_found("ingredient", id),
            DomainError::Validation { field, message } => FoodgramError::validation(field, message),
            DomainError::Unauthorized => FoodgramError::Unauthorized,
            DomainError::Forbidden => FoodgramError::Forbidden,
            DomainError::Database { .. } | DomainError::Storage { .. } => FoodgramError::Internal,
            other => FoodgramError::rejected(other.to_string()),
        }
    }
}
