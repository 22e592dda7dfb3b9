use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::contract::model::{
    Ingredient, IngredientAmountInput, NewUser, PasswordChange, Recipe, RecipeIngredient,
    RecipeShort, Subscription, Tag, User,
};

/// Public URL prefix of stored media.
pub const MEDIA_URL: &str = "/media/";

fn media_url(path: String) -> Option<String> {
    (!path.is_empty()).then(|| format!("{MEDIA_URL}{path}"))
}

// ----- users -----

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserDto {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the requesting user follows this user.
    pub is_subscribed: bool,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
            is_subscribed: u.is_subscribed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreateReq {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl From<UserCreateReq> for NewUser {
    fn from(r: UserCreateReq) -> Self {
        Self {
            email: r.email.trim().to_string(),
            username: r.username.trim().to_string(),
            first_name: r.first_name,
            last_name: r.last_name,
            password: r.password,
        }
    }
}

/// Registration response; never includes the password.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserCreatedDto {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for UserCreatedDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SetPasswordReq {
    pub current_password: String,
    pub new_password: String,
}

impl From<SetPasswordReq> for PasswordChange {
    fn from(r: SetPasswordReq) -> Self {
        Self {
            current_password: r.current_password,
            new_password: r.new_password,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LoginReq {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenDto {
    pub auth_token: String,
}

// ----- tags and ingredients -----

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TagDto {
    pub id: i64,
    pub name: String,
    /// `#RRGGBB`
    pub color: String,
    pub slug: String,
}

impl From<Tag> for TagDto {
    fn from(t: Tag) -> Self {
        Self {
            id: t.id,
            name: t.name,
            color: t.color,
            slug: t.slug,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IngredientDto {
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
}

impl From<Ingredient> for IngredientDto {
    fn from(i: Ingredient) -> Self {
        Self {
            id: i.id,
            name: i.name,
            measurement_unit: i.measurement_unit,
        }
    }
}

// ----- recipes -----

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeIngredientDto {
    /// Ingredient id.
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i32,
}

impl From<RecipeIngredient> for RecipeIngredientDto {
    fn from(i: RecipeIngredient) -> Self {
        Self {
            id: i.id,
            name: i.name,
            measurement_unit: i.measurement_unit,
            amount: i.amount,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeDto {
    pub id: i64,
    pub tags: Vec<TagDto>,
    pub author: UserDto,
    pub ingredients: Vec<RecipeIngredientDto>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    /// `/media/recipes/<file>`, null when the recipe has no image.
    pub image: Option<String>,
    pub text: String,
    /// Minutes.
    pub cooking_time: i32,
}

impl From<Recipe> for RecipeDto {
    fn from(r: Recipe) -> Self {
        Self {
            id: r.id,
            tags: r.tags.into_iter().map(TagDto::from).collect(),
            author: r.author.into(),
            ingredients: r.ingredients.into_iter().map(Into::into).collect(),
            is_favorited: r.is_favorited,
            is_in_shopping_cart: r.is_in_shopping_cart,
            name: r.name,
            image: media_url(r.image),
            text: r.text,
            cooking_time: r.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecipeShortDto {
    pub id: i64,
    pub name: String,
    pub image: Option<String>,
    pub cooking_time: i32,
}

impl From<RecipeShort> for RecipeShortDto {
    fn from(r: RecipeShort) -> Self {
        Self {
            id: r.id,
            name: r.name,
            image: media_url(r.image),
            cooking_time: r.cooking_time,
        }
    }
}

/// A followed author: user fields plus their newest recipes.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionDto {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    pub recipes: Vec<RecipeShortDto>,
    /// All recipes of the author, regardless of `recipes_limit`.
    pub recipes_count: u64,
}

impl From<Subscription> for SubscriptionDto {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.author.id,
            email: s.author.email,
            username: s.author.username,
            first_name: s.author.first_name,
            last_name: s.author.last_name,
            is_subscribed: s.author.is_subscribed,
            recipes: s.recipes.into_iter().map(Into::into).collect(),
            recipes_count: s.recipes_count,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, ToSchema)]
pub struct IngredientAmountReq {
    pub id: i64,
    pub amount: i32,
}

impl From<IngredientAmountReq> for IngredientAmountInput {
    fn from(r: IngredientAmountReq) -> Self {
        Self {
            id: r.id,
            amount: r.amount,
        }
    }
}

/// Create/update body. Missing fields are reported by validation, not by the parser.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct RecipeWriteReq {
    pub ingredients: Vec<IngredientAmountReq>,
    /// Tag ids.
    pub tags: Vec<i64>,
    /// `data:image/<ext>;base64,<data>`; optional on update.
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i32,
}

// ----- query parameters (documentation; parsed from the raw query string) -----

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PageQuery {
    /// 1-based page number.
    pub page: Option<u64>,
    /// Page size.
    pub limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubscriptionsQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Cap on recipes listed per author.
    pub recipes_limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipesLimitQuery {
    pub recipes_limit: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipeListQuery {
    pub page: Option<u64>,
    pub limit: Option<u64>,
    /// Tag slug; repeat to match any of several tags.
    pub tags: Option<Vec<String>>,
    /// Author id.
    pub author: Option<i64>,
    /// `1`/`true` or `0`/`false`; ignored for anonymous requests.
    pub is_favorited: Option<String>,
    /// `1`/`true` or `0`/`false`; ignored for anonymous requests.
    pub is_in_shopping_cart: Option<String>,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IngredientSearchQuery {
    /// Case-insensitive name prefix.
    pub name: Option<String>,
}
