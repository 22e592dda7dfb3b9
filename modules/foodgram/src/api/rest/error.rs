use axum::http::StatusCode;
use modkit::{Problem, ProblemResponse};
use tracing::error;

use crate::domain::error::DomainError;

fn code(e: &DomainError) -> &'static str {
    match e {
        DomainError::Validation { .. } => "validation_error",
        DomainError::AlreadyFavorited => "already_favorited",
        DomainError::NotFavorited => "not_favorited",
        DomainError::AlreadyInCart => "already_in_shopping_cart",
        DomainError::NotInCart => "not_in_shopping_cart",
        DomainError::SelfSubscription => "self_subscription",
        DomainError::AlreadySubscribed => "already_subscribed",
        DomainError::NotSubscribed => "not_subscribed",
        DomainError::InvalidCredentials => "invalid_credentials",
        DomainError::RecipeNotFound { .. } => "recipe_not_found",
        DomainError::UserNotFound { .. } => "user_not_found",
        DomainError::TagNotFound { .. } => "tag_not_found",
        DomainError::IngredientNotFound { .. } => "ingredient_not_found",
        DomainError::PageNotFound => "invalid_page",
        DomainError::Forbidden => "permission_denied",
        DomainError::Unauthorized => "not_authenticated",
        DomainError::Database { .. } | DomainError::Storage { .. } => "internal_error",
    }
}

/// Map domain errors to RFC 9457 problems.
pub fn map_domain_error(e: &DomainError) -> ProblemResponse {
    let (status, title) = match e {
        DomainError::Validation { .. } => (StatusCode::BAD_REQUEST, "Validation failed"),
        e if e.is_rule_violation() => (StatusCode::BAD_REQUEST, "Bad Request"),
        DomainError::RecipeNotFound { .. }
        | DomainError::UserNotFound { .. }
        | DomainError::TagNotFound { .. }
        | DomainError::IngredientNotFound { .. }
        | DomainError::PageNotFound => (StatusCode::NOT_FOUND, "Not Found"),
        DomainError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden"),
        DomainError::Unauthorized => (StatusCode::UNAUTHORIZED, "Unauthorized"),
        _ => {
            error!(error = %e, "internal error");
            return Problem::new(StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred")
                .with_code(code(e))
                .into();
        }
    };

    let problem = match e {
        DomainError::Validation { field, message } => {
            Problem::new(status, message.clone()).with_field_error(field, message.clone())
        }
        _ => Problem::new(status, e.to_string()),
    };
    problem.titled(title).with_code(code(e)).into()
}

impl From<DomainError> for ProblemResponse {
    fn from(e: DomainError) -> Self {
        map_domain_error(&e)
    }
}
