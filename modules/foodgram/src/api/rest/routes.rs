use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Extension, Router,
};
use modkit::contracts::OpenApiRegistry;
use tower_http::services::ServeDir;
use utoipa::OpenApi;

use crate::api::rest::{dto, handlers};
use crate::domain::service::Service;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::register,
        handlers::list_users,
        handlers::get_user,
        handlers::me,
        handlers::set_password,
        handlers::login,
        handlers::logout,
        handlers::subscriptions,
        handlers::subscribe,
        handlers::unsubscribe,
        handlers::list_tags,
        handlers::get_tag,
        handlers::list_ingredients,
        handlers::get_ingredient,
        handlers::list_recipes,
        handlers::get_recipe,
        handlers::create_recipe,
        handlers::update_recipe,
        handlers::delete_recipe,
        handlers::add_favorite,
        handlers::remove_favorite,
        handlers::add_to_cart,
        handlers::remove_from_cart,
        handlers::download_shopping_cart,
    ),
    components(schemas(
        dto::UserDto,
        dto::UserCreateReq,
        dto::UserCreatedDto,
        dto::SetPasswordReq,
        dto::LoginReq,
        dto::TokenDto,
        dto::TagDto,
        dto::IngredientDto,
        dto::RecipeIngredientDto,
        dto::RecipeDto,
        dto::RecipeShortDto,
        dto::SubscriptionDto,
        dto::IngredientAmountReq,
        dto::RecipeWriteReq,
        modkit::Problem,
        modkit::ValidationError,
    )),
    tags(
        (name = "users", description = "Accounts, profiles and subscriptions"),
        (name = "auth", description = "Token login and logout"),
        (name = "tags", description = "Recipe tags"),
        (name = "ingredients", description = "Ingredient catalog"),
        (name = "recipes", description = "Recipes, favorites and shopping cart"),
    )
)]
pub struct FoodgramApiDoc;

fn api_routes() -> Router {
    Router::new()
        .route("/users", get(handlers::list_users).post(handlers::register))
        .route("/users/me", get(handlers::me))
        .route("/users/set_password", post(handlers::set_password))
        .route("/users/subscriptions", get(handlers::subscriptions))
        .route("/users/{id}", get(handlers::get_user))
        .route(
            "/users/{id}/subscribe",
            post(handlers::subscribe).delete(handlers::unsubscribe),
        )
        .route("/auth/token/login", post(handlers::login))
        .route("/auth/token/logout", post(handlers::logout))
        .route("/tags", get(handlers::list_tags))
        .route("/tags/{id}", get(handlers::get_tag))
        .route("/ingredients", get(handlers::list_ingredients))
        .route("/ingredients/{id}", get(handlers::get_ingredient))
        .route(
            "/recipes",
            get(handlers::list_recipes).post(handlers::create_recipe),
        )
        .route(
            "/recipes/download_shopping_cart",
            get(handlers::download_shopping_cart),
        )
        .route(
            "/recipes/{id}",
            get(handlers::get_recipe)
                .patch(handlers::update_recipe)
                .put(handlers::update_recipe)
                .delete(handlers::delete_recipe),
        )
        .route(
            "/recipes/{id}/favorite",
            post(handlers::add_favorite).delete(handlers::remove_favorite),
        )
        .route(
            "/recipes/{id}/shopping_cart",
            post(handlers::add_to_cart).delete(handlers::remove_from_cart),
        )
}

/// `/api/...` plus uploaded files under `/media`.
pub fn router(service: Arc<Service>, media_root: PathBuf) -> Router {
    Router::new()
        .nest("/api", api_routes())
        .nest_service("/media", ServeDir::new(media_root))
        .layer(Extension(service))
}

pub fn register_routes(
    router: Router,
    openapi: &dyn OpenApiRegistry,
    service: Arc<Service>,
    media_root: PathBuf,
) -> anyhow::Result<Router> {
    let doc = FoodgramApiDoc::openapi();
    tracing::debug!(paths = doc.paths.paths.len(), "registering foodgram routes");
    openapi.register_document(doc);
    Ok(router.merge(self::router(service, media_root)))
}
