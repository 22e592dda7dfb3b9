use std::sync::Arc;

use axum::{
    extract::{OriginalUri, Path, RawQuery},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    Extension,
};
use modkit::{Page, PageRequest, Problem, ProblemResponse};
use tracing::info;

use crate::api::rest::auth::{AuthUser, MaybeUser};
use crate::api::rest::dto::{
    IngredientDto, LoginReq, RecipeDto, RecipeShortDto, SetPasswordReq, SubscriptionDto, TagDto,
    TokenDto, UserCreateReq, UserCreatedDto, UserDto,
};
use crate::api::rest::payload::{JsonBody, RecipePayload};
use crate::contract::model::RecipeFilter;
use crate::domain::error::DomainError;
use crate::domain::service::Service;
use crate::domain::shopping_list;

type ApiResult<T> = Result<T, ProblemResponse>;

/// Decoded query string; keeps repeated keys.
struct Params(Vec<(String, String)>);

impl Params {
    fn parse(raw: Option<String>) -> Self {
        let pairs = raw
            .map(|q| url::form_urlencoded::parse(q.as_bytes()).into_owned().collect())
            .unwrap_or_default();
        Self(pairs)
    }

    fn first(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    fn all<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.0
            .iter()
            .filter(move |(k, v)| k == key && !v.is_empty())
            .map(|(_, v)| v.as_str())
    }

    fn int<T: std::str::FromStr>(&self, key: &str) -> Result<Option<T>, DomainError> {
        self.first(key)
            .map(|v| {
                v.trim()
                    .parse()
                    .map_err(|_| DomainError::validation(key, "A valid integer is required."))
            })
            .transpose()
    }

    fn flag(&self, key: &str) -> Result<Option<bool>, DomainError> {
        match self.first(key).map(str::to_ascii_lowercase).as_deref() {
            None => Ok(None),
            Some("1" | "true") => Ok(Some(true)),
            Some("0" | "false") => Ok(Some(false)),
            Some(_) => Err(DomainError::validation(key, "Expected 1, 0, true or false.")),
        }
    }

    /// Unparseable, zero or unaddressable `page` is an invalid page; an unparseable `limit` falls back to the default.
    fn page_request(&self, svc: &Service) -> Result<PageRequest, DomainError> {
        let page = match self.first("page") {
            None => None,
            Some(v) => match v.trim().parse::<u64>() {
                Ok(p) if p > 0 => Some(p),
                _ => return Err(DomainError::PageNotFound),
            },
        };
        let limit = self.first("limit").and_then(|v| v.trim().parse::<u64>().ok());
        let req = svc.page_request(page, limit);
        if req.offset().is_none() {
            return Err(DomainError::PageNotFound);
        }
        Ok(req)
    }
}

fn paged<T, U>(page: Page<T>, uri: &OriginalUri, req: PageRequest) -> Json<Page<U>>
where
    U: From<T>,
{
    Json(page.map(U::from).with_links(&uri.0, req))
}

// ----- users and auth -----

/// Register a new user
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = UserCreateReq,
    responses(
        (status = 201, description = "User created", body = UserCreatedDto),
        (status = 400, description = "Validation failed", body = Problem)
    )
)]
pub async fn register(
    Extension(svc): Extension<Arc<Service>>,
    JsonBody(req): JsonBody<UserCreateReq>,
) -> ApiResult<(StatusCode, Json<UserCreatedDto>)> {
    let user = svc.register(req.into()).await?;
    Ok((StatusCode::CREATED, Json(user.into())))
}

/// List users
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(crate::api::rest::dto::PageQuery),
    responses(
        (status = 200, description = "Page of users", body = Page<UserDto>),
        (status = 404, description = "Invalid page", body = Problem)
    )
)]
pub async fn list_users(
    Extension(svc): Extension<Arc<Service>>,
    viewer: MaybeUser,
    uri: OriginalUri,
    RawQuery(raw): RawQuery,
) -> ApiResult<Json<Page<UserDto>>> {
    let req = Params::parse(raw).page_request(&svc)?;
    let page = svc.list_users(viewer.id(), req).await?;
    Ok(paged(page, &uri, req))
}

/// Get a user profile
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User", body = UserDto),
        (status = 404, description = "Not found", body = Problem)
    )
)]
pub async fn get_user(
    Extension(svc): Extension<Arc<Service>>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<UserDto>> {
    let user = svc.get_user(id, viewer.id()).await?;
    Ok(Json(user.into()))
}

/// Current user profile
#[utoipa::path(
    get,
    path = "/api/users/me",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserDto),
        (status = 401, description = "Not authenticated", body = Problem)
    )
)]
pub async fn me(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
) -> ApiResult<Json<UserDto>> {
    let user = svc.get_user(current.id, Some(current.id)).await?;
    Ok(Json(user.into()))
}

/// Change the current user's password
#[utoipa::path(
    post,
    path = "/api/users/set_password",
    tag = "users",
    request_body = SetPasswordReq,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Validation failed", body = Problem),
        (status = 401, description = "Not authenticated", body = Problem)
    )
)]
pub async fn set_password(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    JsonBody(req): JsonBody<SetPasswordReq>,
) -> ApiResult<StatusCode> {
    svc.set_password(current, req.into()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Obtain an auth token
#[utoipa::path(
    post,
    path = "/api/auth/token/login",
    tag = "auth",
    request_body = LoginReq,
    responses(
        (status = 200, description = "Token issued", body = TokenDto),
        (status = 400, description = "Invalid credentials", body = Problem)
    )
)]
pub async fn login(
    Extension(svc): Extension<Arc<Service>>,
    JsonBody(req): JsonBody<LoginReq>,
) -> ApiResult<Json<TokenDto>> {
    let auth_token = svc.login(req.email.trim(), &req.password).await?;
    Ok(Json(TokenDto { auth_token }))
}

/// Revoke the current token
#[utoipa::path(
    post,
    path = "/api/auth/token/logout",
    tag = "auth",
    responses(
        (status = 204, description = "Logged out"),
        (status = 401, description = "Not authenticated", body = Problem)
    )
)]
pub async fn logout(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
) -> ApiResult<StatusCode> {
    svc.logout(current).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----- subscriptions -----

/// Authors the current user follows
#[utoipa::path(
    get,
    path = "/api/users/subscriptions",
    tag = "users",
    params(crate::api::rest::dto::SubscriptionsQuery),
    responses(
        (status = 200, description = "Page of followed authors", body = Page<SubscriptionDto>),
        (status = 401, description = "Not authenticated", body = Problem)
    )
)]
pub async fn subscriptions(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    uri: OriginalUri,
    RawQuery(raw): RawQuery,
) -> ApiResult<Json<Page<SubscriptionDto>>> {
    let params = Params::parse(raw);
    let req = params.page_request(&svc)?;
    let recipes_limit = params.int::<u64>("recipes_limit")?;
    let page = svc.subscriptions(current, req, recipes_limit).await?;
    Ok(paged(page, &uri, req))
}

/// Follow an author
#[utoipa::path(
    post,
    path = "/api/users/{id}/subscribe",
    tag = "users",
    params(("id" = i64, Path, description = "Author id"), crate::api::rest::dto::RecipesLimitQuery),
    responses(
        (status = 201, description = "Subscribed", body = SubscriptionDto),
        (status = 400, description = "Self or duplicate subscription", body = Problem),
        (status = 404, description = "Author not found", body = Problem)
    )
)]
pub async fn subscribe(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    Path(id): Path<i64>,
    RawQuery(raw): RawQuery,
) -> ApiResult<(StatusCode, Json<SubscriptionDto>)> {
    let recipes_limit = Params::parse(raw).int::<u64>("recipes_limit")?;
    let sub = svc.subscribe(current, id, recipes_limit).await?;
    info!(user_id = current.id, author_id = id, "subscribed");
    Ok((StatusCode::CREATED, Json(sub.into())))
}

/// Unfollow an author
#[utoipa::path(
    delete,
    path = "/api/users/{id}/subscribe",
    tag = "users",
    params(("id" = i64, Path, description = "Author id")),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 400, description = "Not subscribed", body = Problem),
        (status = 404, description = "Author not found", body = Problem)
    )
)]
pub async fn unsubscribe(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    svc.unsubscribe(current, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----- tags and ingredients -----

/// List tags
#[utoipa::path(
    get,
    path = "/api/tags",
    tag = "tags",
    responses((status = 200, description = "All tags", body = Vec<TagDto>))
)]
pub async fn list_tags(Extension(svc): Extension<Arc<Service>>) -> ApiResult<Json<Vec<TagDto>>> {
    let tags = svc.list_tags().await?;
    Ok(Json(tags.into_iter().map(TagDto::from).collect()))
}

/// Get a tag
#[utoipa::path(
    get,
    path = "/api/tags/{id}",
    tag = "tags",
    params(("id" = i64, Path, description = "Tag id")),
    responses(
        (status = 200, description = "Tag", body = TagDto),
        (status = 404, description = "Not found", body = Problem)
    )
)]
pub async fn get_tag(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<TagDto>> {
    Ok(Json(svc.get_tag(id).await?.into()))
}

/// Search ingredients by name prefix
#[utoipa::path(
    get,
    path = "/api/ingredients",
    tag = "ingredients",
    params(crate::api::rest::dto::IngredientSearchQuery),
    responses((status = 200, description = "Matching ingredients", body = Vec<IngredientDto>))
)]
pub async fn list_ingredients(
    Extension(svc): Extension<Arc<Service>>,
    RawQuery(raw): RawQuery,
) -> ApiResult<Json<Vec<IngredientDto>>> {
    let params = Params::parse(raw);
    let found = svc.search_ingredients(params.first("name")).await?;
    Ok(Json(found.into_iter().map(IngredientDto::from).collect()))
}

/// Get an ingredient
#[utoipa::path(
    get,
    path = "/api/ingredients/{id}",
    tag = "ingredients",
    params(("id" = i64, Path, description = "Ingredient id")),
    responses(
        (status = 200, description = "Ingredient", body = IngredientDto),
        (status = 404, description = "Not found", body = Problem)
    )
)]
pub async fn get_ingredient(
    Extension(svc): Extension<Arc<Service>>,
    Path(id): Path<i64>,
) -> ApiResult<Json<IngredientDto>> {
    Ok(Json(svc.get_ingredient(id).await?.into()))
}

// ----- recipes -----

fn recipe_filter(params: &Params) -> Result<RecipeFilter, DomainError> {
    Ok(RecipeFilter {
        tags: params.all("tags").map(str::to_string).collect(),
        author: params.int("author")?,
        is_favorited: params.flag("is_favorited")?,
        is_in_shopping_cart: params.flag("is_in_shopping_cart")?,
    })
}

/// List recipes
#[utoipa::path(
    get,
    path = "/api/recipes",
    tag = "recipes",
    params(crate::api::rest::dto::RecipeListQuery),
    responses(
        (status = 200, description = "Page of recipes", body = Page<RecipeDto>),
        (status = 400, description = "Invalid filter", body = Problem),
        (status = 404, description = "Invalid page", body = Problem)
    )
)]
pub async fn list_recipes(
    Extension(svc): Extension<Arc<Service>>,
    viewer: MaybeUser,
    uri: OriginalUri,
    RawQuery(raw): RawQuery,
) -> ApiResult<Json<Page<RecipeDto>>> {
    let params = Params::parse(raw);
    let filter = recipe_filter(&params)?;
    let req = params.page_request(&svc)?;
    let page = svc.list_recipes(viewer.id(), filter, req).await?;
    Ok(paged(page, &uri, req))
}

/// Get a recipe
#[utoipa::path(
    get,
    path = "/api/recipes/{id}",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe id")),
    responses(
        (status = 200, description = "Recipe", body = RecipeDto),
        (status = 404, description = "Not found", body = Problem)
    )
)]
pub async fn get_recipe(
    Extension(svc): Extension<Arc<Service>>,
    viewer: MaybeUser,
    Path(id): Path<i64>,
) -> ApiResult<Json<RecipeDto>> {
    Ok(Json(svc.get_recipe(id, viewer.id()).await?.into()))
}

/// Create a recipe
#[utoipa::path(
    post,
    path = "/api/recipes",
    tag = "recipes",
    request_body(content = crate::api::rest::dto::RecipeWriteReq, description = "JSON or multipart/form-data"),
    responses(
        (status = 201, description = "Recipe created", body = RecipeDto),
        (status = 400, description = "Validation failed", body = Problem),
        (status = 401, description = "Not authenticated", body = Problem)
    )
)]
pub async fn create_recipe(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    RecipePayload(draft): RecipePayload,
) -> ApiResult<(StatusCode, Json<RecipeDto>)> {
    let recipe = svc.create_recipe(current, draft).await?;
    Ok((StatusCode::CREATED, Json(recipe.into())))
}

/// Update a recipe (author or admin)
#[utoipa::path(
    patch,
    path = "/api/recipes/{id}",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe id")),
    request_body(content = crate::api::rest::dto::RecipeWriteReq, description = "JSON or multipart/form-data; image optional"),
    responses(
        (status = 200, description = "Recipe updated", body = RecipeDto),
        (status = 400, description = "Validation failed", body = Problem),
        (status = 403, description = "Not the author", body = Problem),
        (status = 404, description = "Not found", body = Problem)
    )
)]
pub async fn update_recipe(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    Path(id): Path<i64>,
    RecipePayload(draft): RecipePayload,
) -> ApiResult<Json<RecipeDto>> {
    Ok(Json(svc.update_recipe(current, id, draft).await?.into()))
}

/// Delete a recipe (author or admin)
#[utoipa::path(
    delete,
    path = "/api/recipes/{id}",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 403, description = "Not the author", body = Problem),
        (status = 404, description = "Not found", body = Problem)
    )
)]
pub async fn delete_recipe(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    svc.delete_recipe(current, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ----- favorites and shopping cart -----

/// Add a recipe to favorites
#[utoipa::path(
    post,
    path = "/api/recipes/{id}/favorite",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe id")),
    responses(
        (status = 201, description = "Added", body = RecipeShortDto),
        (status = 400, description = "Already in favorites", body = Problem),
        (status = 404, description = "Recipe not found", body = Problem)
    )
)]
pub async fn add_favorite(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<RecipeShortDto>)> {
    let short = svc.add_favorite(current, id).await?;
    Ok((StatusCode::CREATED, Json(short.into())))
}

/// Remove a recipe from favorites
#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/favorite",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Not in favorites", body = Problem),
        (status = 404, description = "Recipe not found", body = Problem)
    )
)]
pub async fn remove_favorite(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    svc.remove_favorite(current, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a recipe to the shopping cart
#[utoipa::path(
    post,
    path = "/api/recipes/{id}/shopping_cart",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe id")),
    responses(
        (status = 201, description = "Added", body = RecipeShortDto),
        (status = 400, description = "Already in the shopping cart", body = Problem),
        (status = 404, description = "Recipe not found", body = Problem)
    )
)]
pub async fn add_to_cart(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<(StatusCode, Json<RecipeShortDto>)> {
    let short = svc.add_to_cart(current, id).await?;
    Ok((StatusCode::CREATED, Json(short.into())))
}

/// Remove a recipe from the shopping cart
#[utoipa::path(
    delete,
    path = "/api/recipes/{id}/shopping_cart",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe id")),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Not in the shopping cart", body = Problem),
        (status = 404, description = "Recipe not found", body = Problem)
    )
)]
pub async fn remove_from_cart(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
    Path(id): Path<i64>,
) -> ApiResult<StatusCode> {
    svc.remove_from_cart(current, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Download the aggregated shopping list
#[utoipa::path(
    get,
    path = "/api/recipes/download_shopping_cart",
    tag = "recipes",
    responses(
        (status = 200, description = "Plain-text shopping list", content_type = "text/plain", body = String),
        (status = 401, description = "Not authenticated", body = Problem)
    )
)]
pub async fn download_shopping_cart(
    Extension(svc): Extension<Arc<Service>>,
    AuthUser(current): AuthUser,
) -> ApiResult<impl IntoResponse> {
    let body = svc.shopping_list(current.id).await?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename={}", shopping_list::FILE_NAME),
            ),
        ],
        body,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_keep_repeated_tags_and_parse_flags() {
        let p = Params::parse(Some("tags=breakfast&tags=lunch&is_favorited=1&is_in_shopping_cart=false&author=3".into()));
        let f = recipe_filter(&p).unwrap();
        assert_eq!(f.tags.len(), 2);
        assert_eq!(f.is_favorited, Some(true));
        assert_eq!(f.is_in_shopping_cart, Some(false));
        assert_eq!(f.author, Some(3));
    }

    #[test]
    fn bad_flag_is_a_validation_error() {
        let p = Params::parse(Some("is_favorited=maybe".into()));
        assert!(matches!(
            recipe_filter(&p),
            Err(DomainError::Validation { field, .. }) if field == "is_favorited"
        ));
    }
}
