use thiserror::Error;

/// Domain-specific errors using thiserror
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Validation failed: {field}: {message}")]
    Validation { field: String, message: String },

    #[error("You have already added the recipe to favorites")]
    AlreadyFavorited,

    #[error("The recipe is not in favorites")]
    NotFavorited,

    #[error("You have already added the recipe to shopping cart")]
    AlreadyInCart,

    #[error("The recipe is not in shopping cart")]
    NotInCart,

    #[error("You cannot subscribe to yourself")]
    SelfSubscription,

    #[error("You are already subscribed to the author")]
    AlreadySubscribed,

    #[error("You are not subscribed to the author")]
    NotSubscribed,

    #[error("Unable to log in with provided credentials")]
    InvalidCredentials,

    #[error("Recipe not found: {id}")]
    RecipeNotFound { id: i64 },

    #[error("User not found: {id}")]
    UserNotFound { id: i64 },

    #[error("Tag not found: {id}")]
    TagNotFound { id: i64 },

    #[error("Ingredient not found: {id}")]
    IngredientNotFound { id: i64 },

    #[error("Invalid page")]
    PageNotFound,

    #[error("You do not have permission to perform this action")]
    Forbidden,

    #[error("Authentication credentials were not provided or are invalid")]
    Unauthorized,

    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Storage error: {message}")]
    Storage { message: String },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn recipe_not_found(id: i64) -> Self {
        Self::RecipeNotFound { id }
    }

    pub fn user_not_found(id: i64) -> Self {
        Self::UserNotFound { id }
    }

    pub fn database(e: anyhow::Error) -> Self {
        Self::Database {
            message: format!("{e:#}"),
        }
    }

    pub fn storage(e: anyhow::Error) -> Self {
        Self::Storage {
            message: format!("{e:#}"),
        }
    }

    /// Business-rule rejections: the request was well-formed but not allowed in
    /// the current state.
    pub fn is_rule_violation(&self) -> bool {
        matches!(
            self,
            Self::AlreadyFavorited
                | Self::NotFavorited
                | Self::AlreadyInCart
                | Self::NotInCart
                | Self::SelfSubscription
                | Self::AlreadySubscribed
                | Self::NotSubscribed
                | Self::InvalidCredentials
        )
    }
}
