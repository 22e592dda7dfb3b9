use std::collections::HashSet;

use crate::contract::model::{NewUser, RecipeDraft};
use crate::domain::error::DomainError;

pub const EMAIL_MAX_LEN: usize = 254;
pub const USER_FIELD_MAX_LEN: usize = 150;
pub const RECIPE_NAME_MAX_LEN: usize = 200;
pub const PASSWORD_MIN_LEN: usize = 8;

pub const ALLOWED_IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

fn required(field: &str, value: &str, max: usize) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(field, "This field may not be blank."));
    }
    if value.chars().count() > max {
        return Err(DomainError::validation(
            field,
            format!("Ensure this field has no more than {max} characters."),
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), DomainError> {
    required("email", email, EMAIL_MAX_LEN)?;
    let valid = match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && domain.contains('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid {
        return Err(DomainError::validation("email", "Enter a valid email address."));
    }
    Ok(())
}

/// Letters, digits and `_ . @ + -`.
pub fn validate_username(username: &str) -> Result<(), DomainError> {
    required("username", username, USER_FIELD_MAX_LEN)?;
    let ok = username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '@' | '+' | '-'));
    if !ok {
        return Err(DomainError::validation(
            "username",
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }
    Ok(())
}

pub fn validate_password(field: &str, password: &str) -> Result<(), DomainError> {
    if password.chars().count() < PASSWORD_MIN_LEN {
        return Err(DomainError::validation(
            field,
            format!("This password is too short. It must contain at least {PASSWORD_MIN_LEN} characters."),
        ));
    }
    if password.chars().all(|c| c.is_ascii_digit()) {
        return Err(DomainError::validation(field, "This password is entirely numeric."));
    }
    Ok(())
}

pub fn validate_new_user(user: &NewUser) -> Result<(), DomainError> {
    validate_email(&user.email)?;
    validate_username(&user.username)?;
    required("first_name", &user.first_name, USER_FIELD_MAX_LEN)?;
    required("last_name", &user.last_name, USER_FIELD_MAX_LEN)?;
    validate_password("password", &user.password)
}

/// Shape checks that need no storage access.
pub fn validate_recipe(draft: &RecipeDraft) -> Result<(), DomainError> {
    required("name", &draft.name, RECIPE_NAME_MAX_LEN)?;
    if draft.text.trim().is_empty() {
        return Err(DomainError::validation("text", "This field may not be blank."));
    }
    if draft.cooking_time <= 0 {
        return Err(DomainError::validation(
            "cooking_time",
            "Cooking time must be at least 1 minute.",
        ));
    }
    if draft.ingredients.is_empty() {
        return Err(DomainError::validation(
            "ingredients",
            "A recipe needs at least one ingredient.",
        ));
    }
    let mut seen = HashSet::new();
    for item in &draft.ingredients {
        if item.amount <= 0 {
            return Err(DomainError::validation(
                "ingredients",
                "The ingredient amount must be at least 1.",
            ));
        }
        if !seen.insert(item.id) {
            return Err(DomainError::validation(
                "ingredients",
                "Ingredients should not be repeated.",
            ));
        }
    }
    let mut tags = HashSet::new();
    if draft.tags.iter().any(|t| !tags.insert(*t)) {
        return Err(DomainError::validation("tags", "Tags should not be repeated."));
    }
    if let Some(image) = &draft.image {
        validate_image_ext(&image.ext)?;
    }
    Ok(())
}

pub fn validate_image_ext(ext: &str) -> Result<(), DomainError> {
    if ALLOWED_IMAGE_EXTENSIONS.contains(&ext) {
        Ok(())
    } else {
        Err(DomainError::validation(
            "image",
            format!(
                "Unsupported image type '{ext}'. Allowed: {}.",
                ALLOWED_IMAGE_EXTENSIONS.join(", ")
            ),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::model::{IngredientAmountInput, NewImage};

    fn draft() -> RecipeDraft {
        RecipeDraft {
            name: "Pancakes".into(),
            text: "Mix and fry".into(),
            cooking_time: 1,
            tags: vec![1, 2],
            ingredients: vec![
                IngredientAmountInput { id: 1, amount: 200 },
                IngredientAmountInput { id: 2, amount: 2 },
            ],
            image: None,
        }
    }

    fn field_of(err: DomainError) -> String {
        match err {
            DomainError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn cooking_time_boundary() {
        assert!(validate_recipe(&draft()).is_ok());
        let mut d = draft();
        d.cooking_time = 0;
        assert_eq!(field_of(validate_recipe(&d).unwrap_err()), "cooking_time");
    }

    #[test]
    fn ingredient_rules() {
        let mut d = draft();
        d.ingredients[1].id = 1;
        assert_eq!(field_of(validate_recipe(&d).unwrap_err()), "ingredients");

        let mut d = draft();
        d.ingredients[0].amount = 0;
        assert_eq!(field_of(validate_recipe(&d).unwrap_err()), "ingredients");

        let mut d = draft();
        d.ingredients.clear();
        assert_eq!(field_of(validate_recipe(&d).unwrap_err()), "ingredients");
    }

    #[test]
    fn blank_name_and_long_name() {
        let mut d = draft();
        d.name = "   ".into();
        assert_eq!(field_of(validate_recipe(&d).unwrap_err()), "name");
        d.name = "x".repeat(RECIPE_NAME_MAX_LEN + 1);
        assert_eq!(field_of(validate_recipe(&d).unwrap_err()), "name");
    }

    #[test]
    fn image_extension_is_checked() {
        let mut d = draft();
        d.image = Some(NewImage {
            ext: "bmp".into(),
            bytes: vec![1],
        });
        assert_eq!(field_of(validate_recipe(&d).unwrap_err()), "image");
        d.image = Some(NewImage {
            ext: "webp".into(),
            bytes: vec![1],
        });
        assert!(validate_recipe(&d).is_ok());
    }

    #[test]
    fn email_shapes() {
        assert!(validate_email("cook@example.com").is_ok());
        assert!(validate_email("cook@localhost").is_err());
        assert!(validate_email("@example.com").is_err());
        assert!(validate_email("cook example@ex.com").is_err());
        assert!(validate_email(&format!("{}@ex.com", "a".repeat(250))).is_err());
    }

    #[test]
    fn username_charset() {
        assert!(validate_username("chef.anna+1@home-k_").is_ok());
        assert!(validate_username("chef anna").is_err());
        assert!(validate_username("chef/anna").is_err());
    }

    #[test]
    fn password_rules() {
        assert!(validate_password("password", "s3cret-pass").is_ok());
        assert!(validate_password("password", "short").is_err());
        assert_eq!(
            field_of(validate_password("new_password", "1234567890").unwrap_err()),
            "new_password"
        );
    }
}
