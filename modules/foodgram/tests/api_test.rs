//! End-to-end HTTP scenarios against an in-memory SQLite database.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use foodgram::infra::import::import_dir;
use foodgram::infra::storage::entity::{favorite, recipe, shopping_cart, subscription, user};
use foodgram::FoodgramModule;
use modkit::contracts::{DbModule, Module, OpenApiRegistry, RestfulModule};
use modkit::{ConfigProvider, ModuleCtxBuilder};
use modkit_db::{ConnectOpts, DbHandle};

/// Keeps the paths of every registered document.
#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl OpenApiRegistry for Recorder {
    fn register_document(&self, doc: utoipa::openapi::OpenApi) {
        self.0.lock().unwrap().extend(doc.paths.paths.into_keys());
    }
}

struct JsonConfig(HashMap<String, Value>);

impl ConfigProvider for JsonConfig {
    fn get_module_config(&self, module_name: &str) -> Option<&Value> {
        self.0.get(module_name)
    }
}

struct TestApp {
    router: Router,
    db: Arc<DbHandle>,
    module: Arc<FoodgramModule>,
    registry: Recorder,
    media: TempDir,
}

async fn setup() -> TestApp {
    let media = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    std::fs::write(
        data.path().join("ingredients.csv"),
        "flour,g\negg,pcs\nmilk,ml\n",
    )
    .unwrap();
    std::fs::write(
        data.path().join("tags.csv"),
        "Breakfast,#E26C2D,breakfast\nLunch,#49B64E,lunch\n",
    )
    .unwrap();

    let db = Arc::new(
        DbHandle::connect("sqlite::memory:", ConnectOpts::default())
            .await
            .unwrap(),
    );
    let provider = JsonConfig(HashMap::from([(
        "foodgram".to_string(),
        json!({
            "default_page_size": 2,
            "max_page_size": 10,
            "media_root": media.path().to_string_lossy(),
        }),
    )]));
    let ctx = ModuleCtxBuilder::new(CancellationToken::new())
        .with_db(db.clone())
        .with_config_provider(Arc::new(provider))
        .build()
        .for_module("foodgram");

    let module = Arc::new(FoodgramModule::default());
    module.init(&ctx).await.unwrap();
    module.migrate(&db).await.unwrap();
    import_dir(db.seaorm(), data.path()).await.unwrap();

    let registry = Recorder::default();
    let router = module
        .register_rest(&ctx, Router::new(), &registry)
        .unwrap();

    TestApp {
        router,
        db,
        module,
        registry,
        media,
    }
}

impl TestApp {
    async fn raw(&self, req: Request<Body>) -> (StatusCode, header::HeaderMap, Vec<u8>) {
        let resp = self.router.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, headers, body.to_vec())
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            req = req.header(header::AUTHORIZATION, format!("Token {t}"));
        }
        let req = match body {
            Some(b) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => req.body(Body::empty()).unwrap(),
        };
        let (status, _, bytes) = self.raw(req).await;
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    /// Registers and logs in a user, returning `(id, token)`.
    async fn user(&self, name: &str) -> (i64, String) {
        let (status, body) = self
            .call(
                "POST",
                "/api/users",
                None,
                Some(json!({
                    "email": format!("{name}@example.com"),
                    "username": name,
                    "first_name": "Test",
                    "last_name": "Cook",
                    "password": "s3cret-pass",
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        let id = body["id"].as_i64().unwrap();

        let (status, body) = self
            .call(
                "POST",
                "/api/auth/token/login",
                None,
                Some(json!({"email": format!("{name}@example.com"), "password": "s3cret-pass"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        (id, body["auth_token"].as_str().unwrap().to_string())
    }

    async fn recipe(&self, token: &str, name: &str, ingredients: Value, tags: Value) -> i64 {
        let (status, body) = self
            .call(
                "POST",
                "/api/recipes",
                Some(token),
                Some(json!({
                    "name": name,
                    "text": "Mix and cook.",
                    "cooking_time": 10,
                    "ingredients": ingredients,
                    "tags": tags,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_i64().unwrap()
    }
}

#[tokio::test]
async fn registration_login_and_profile() {
    let app = setup().await;
    let (id, token) = app.user("anna").await;

    let (status, me) = app.call("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], id);
    assert_eq!(me["username"], "anna");
    assert_eq!(me["is_subscribed"], false);
    assert!(me.get("password").is_none());

    // logging in again returns the same token
    let (_, again) = app
        .call(
            "POST",
            "/api/auth/token/login",
            None,
            Some(json!({"email": "anna@example.com", "password": "s3cret-pass"})),
        )
        .await;
    assert_eq!(again["auth_token"], token.as_str());

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/token/login",
            None,
            Some(json!({"email": "anna@example.com", "password": "wrong-pass"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .call(
            "POST",
            "/api/users",
            None,
            Some(json!({
                "email": "anna@example.com",
                "username": "other",
                "first_name": "A",
                "last_name": "B",
                "password": "s3cret-pass",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["pointer"], "/email");

    let (status, _) = app.call("GET", "/api/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app.call("GET", "/api/users/me", Some("bogus"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .call("POST", "/api/auth/token/logout", Some(&token), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("GET", "/api/users/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn set_password_checks_current_password() {
    let app = setup().await;
    let (_, token) = app.user("boris").await;

    let (status, body) = app
        .call(
            "POST",
            "/api/users/set_password",
            Some(&token),
            Some(json!({"current_password": "nope-nope", "new_password": "fresh-pass-1"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["pointer"], "/current_password");

    let (status, _) = app
        .call(
            "POST",
            "/api/users/set_password",
            Some(&token),
            Some(json!({"current_password": "s3cret-pass", "new_password": "fresh-pass-1"})),
        )
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .call(
            "POST",
            "/api/auth/token/login",
            None,
            Some(json!({"email": "boris@example.com", "password": "fresh-pass-1"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn catalog_endpoints() {
    let app = setup().await;

    let (status, tags) = app.call("GET", "/api/tags", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(tags.as_array().unwrap().len(), 2);
    assert_eq!(tags[0]["slug"], "breakfast");

    let (status, _) = app.call("GET", "/api/tags/99", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, found) = app.call("GET", "/api/ingredients?name=FL", None, None).await;
    let found = found.as_array().unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0]["name"], "flour");
    assert_eq!(found[0]["measurement_unit"], "g");

    let (_, all) = app.call("GET", "/api/ingredients", None, None).await;
    assert_eq!(all.as_array().unwrap().len(), 3);

    let (status, one) = app.call("GET", "/api/ingredients/2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(one["name"], "egg");
}

#[tokio::test]
async fn recipe_validation_errors() {
    let app = setup().await;
    let (_, token) = app.user("chef").await;

    let base = json!({
        "name": "Pancakes",
        "text": "Whisk and fry.",
        "cooking_time": 0,
        "ingredients": [{"id": 1, "amount": 200}],
        "tags": [1],
    });
    let (status, body) = app
        .call("POST", "/api/recipes", Some(&token), Some(base.clone()))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["pointer"], "/cooking_time");

    let mut dup = base.clone();
    dup["cooking_time"] = json!(1);
    dup["ingredients"] = json!([{"id": 1, "amount": 200}, {"id": 1, "amount": 5}]);
    let (status, body) = app
        .call("POST", "/api/recipes", Some(&token), Some(dup))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["pointer"], "/ingredients");

    let mut unknown = base.clone();
    unknown["cooking_time"] = json!(1);
    unknown["tags"] = json!([42]);
    let (status, body) = app
        .call("POST", "/api/recipes", Some(&token), Some(unknown))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["pointer"], "/tags");

    let mut ok = base;
    ok["cooking_time"] = json!(1);
    let (status, body) = app
        .call("POST", "/api/recipes", Some(&token), Some(ok.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["cooking_time"], 1);
    assert!(body["image"].is_null());

    let (status, body) = app.call("POST", "/api/recipes", Some(&token), Some(ok)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["errors"][0]["pointer"], "/name");

    let (status, _) = app
        .call("POST", "/api/recipes", None, Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn recipe_crud_with_image_and_permissions() {
    let app = setup().await;
    let (_, author) = app.user("author").await;
    let (_, stranger) = app.user("stranger").await;

    let (status, created) = app
        .call(
            "POST",
            "/api/recipes",
            Some(&author),
            Some(json!({
                "name": "Omelette",
                "text": "Beat the eggs.",
                "cooking_time": 5,
                "ingredients": [{"id": 2, "amount": 3}, {"id": 3, "amount": 50}],
                "tags": [1],
                "image": "data:image/png;base64,iVBORw0KGgo=",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{created}");
    let id = created["id"].as_i64().unwrap();
    let image = created["image"].as_str().unwrap().to_string();
    assert!(image.starts_with("/media/recipes/") && image.ends_with(".png"));
    assert_eq!(created["tags"][0]["slug"], "breakfast");
    assert_eq!(created["ingredients"].as_array().unwrap().len(), 2);
    assert_eq!(created["author"]["username"], "author");

    let stored = app.media.path().join(image.trim_start_matches("/media/"));
    assert!(stored.exists());

    let (status, _, bytes) = app
        .raw(Request::builder().uri(&image).body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes.len(), 8);

    let update = json!({
        "name": "Fluffy omelette",
        "text": "Beat the eggs well.",
        "cooking_time": 7,
        "ingredients": [{"id": 2, "amount": 4}],
        "tags": [1, 2],
    });
    let uri = format!("/api/recipes/{id}");
    let (status, _) = app
        .call("PATCH", &uri, Some(&stranger), Some(update.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, updated) = app
        .call("PATCH", &uri, Some(&author), Some(update))
        .await;
    assert_eq!(status, StatusCode::OK, "{updated}");
    assert_eq!(updated["name"], "Fluffy omelette");
    assert_eq!(updated["image"], image.as_str());
    assert_eq!(updated["tags"].as_array().unwrap().len(), 2);
    assert_eq!(updated["ingredients"][0]["amount"], 4);

    let (status, _) = app.call("DELETE", &uri, Some(&stranger), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = app.call("DELETE", &uri, Some(&author), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(!stored.exists());
}

#[tokio::test]
async fn admin_may_edit_any_recipe() {
    let app = setup().await;
    let (_, author) = app.user("author").await;
    let (admin_id, admin) = app.user("admin").await;
    user::Entity::update_many()
        .col_expr(user::Column::Role, Expr::value("admin"))
        .filter(user::Column::Id.eq(admin_id))
        .exec(app.db.seaorm())
        .await
        .unwrap();

    let id = app
        .recipe(&author, "Porridge", json!([{"id": 3, "amount": 200}]), json!([1]))
        .await;
    let (status, _) = app
        .call("DELETE", &format!("/api/recipes/{id}"), Some(&admin), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn multipart_create() {
    let app = setup().await;
    let (_, token) = app.user("baker").await;

    let boundary = "foodgramboundary";
    let mut body = Vec::new();
    for (name, value) in [
        ("name", "Bread"),
        ("text", "Knead and bake."),
        ("cooking_time", "90"),
        ("tags", "1"),
        ("tags", "2"),
        ("ingredients", r#"[{"id": 1, "amount": 500}]"#),
    ] {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; filename=\"loaf.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(&[0xFF, 0xD8, 0xFF, 0xE0]);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());

    let req = Request::builder()
        .method("POST")
        .uri("/api/recipes")
        .header(header::AUTHORIZATION, format!("Token {token}"))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={boundary}"),
        )
        .body(Body::from(body))
        .unwrap();
    let (status, _, bytes) = app.raw(req).await;
    let created: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(status, StatusCode::CREATED, "{created}");
    assert_eq!(created["cooking_time"], 90);
    assert_eq!(created["tags"].as_array().unwrap().len(), 2);
    assert!(created["image"].as_str().unwrap().ends_with(".jpg"));
}

#[tokio::test]
async fn favorites_cart_and_shopping_list() {
    let app = setup().await;
    let (_, author) = app.user("author").await;
    let (me_id, me) = app.user("eater").await;

    let a = app
        .recipe(&author, "Cake", json!([{"id": 1, "amount": 200}]), json!([1]))
        .await;
    let b = app
        .recipe(
            &author,
            "Crepes",
            json!([{"id": 1, "amount": 100}, {"id": 2, "amount": 2}]),
            json!([2]),
        )
        .await;

    let fav = format!("/api/recipes/{a}/favorite");
    let (status, short) = app.call("POST", &fav, Some(&me), None).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(short["id"], a);
    assert_eq!(short["name"], "Cake");
    let (status, _) = app.call("POST", &fav, Some(&me), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let rows = favorite::Entity::find()
        .filter(favorite::Column::UserId.eq(me_id))
        .all(app.db.seaorm())
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);

    let (status, _) = app
        .call("DELETE", &format!("/api/recipes/{b}/favorite"), Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .call("POST", "/api/recipes/999/favorite", Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, detail) = app
        .call("GET", &format!("/api/recipes/{a}"), Some(&me), None)
        .await;
    assert_eq!(detail["is_favorited"], true);
    assert_eq!(detail["is_in_shopping_cart"], false);
    let (_, anon) = app
        .call("GET", &format!("/api/recipes/{a}"), None, None)
        .await;
    assert_eq!(anon["is_favorited"], false);

    for id in [a, b] {
        let (status, _) = app
            .call("POST", &format!("/api/recipes/{id}/shopping_cart"), Some(&me), None)
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let req = Request::builder()
        .uri("/api/recipes/download_shopping_cart")
        .header(header::AUTHORIZATION, format!("Token {me}"))
        .body(Body::empty())
        .unwrap();
    let (status, headers, bytes) = app.raw(req).await;
    assert_eq!(status, StatusCode::OK);
    assert!(headers[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(
        headers[header::CONTENT_DISPOSITION],
        "attachment; filename=shopping_cart.txt"
    );
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text, "Shopping list:\n\negg, 2 pcs\nflour, 300 g");

    let (status, _) = app
        .call("DELETE", &format!("/api/recipes/{b}/shopping_cart"), Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .call("DELETE", &format!("/api/recipes/{b}/shopping_cart"), Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .call("GET", "/api/recipes/download_shopping_cart", None, None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn recipe_list_filters_and_pagination() {
    let app = setup().await;
    let (author_id, author) = app.user("author").await;
    let (_, me) = app.user("reader").await;

    let first = app
        .recipe(&author, "Toast", json!([{"id": 1, "amount": 50}]), json!([1]))
        .await;
    let second = app
        .recipe(&author, "Soup", json!([{"id": 3, "amount": 300}]), json!([2]))
        .await;
    let third = app
        .recipe(&me, "Salad", json!([{"id": 2, "amount": 1}]), json!([1, 2]))
        .await;

    let (status, page) = app.call("GET", "/api/recipes", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 3);
    assert_eq!(page["results"].as_array().unwrap().len(), 2);
    assert_eq!(page["results"][0]["id"], third);
    assert_eq!(page["next"], "/api/recipes?page=2");
    assert!(page["previous"].is_null());

    let (_, page2) = app.call("GET", "/api/recipes?page=2", None, None).await;
    assert_eq!(page2["results"][0]["id"], first);
    assert_eq!(page2["previous"], "/api/recipes?page=1");
    assert!(page2["next"].is_null());

    let (status, _) = app.call("GET", "/api/recipes?page=9", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call("GET", "/api/recipes?page=9223372036854775809&limit=2", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app
        .call("GET", &format!("/api/recipes?page={}", u64::MAX), Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, by_tag) = app
        .call("GET", "/api/recipes?tags=lunch&limit=10", None, None)
        .await;
    assert_eq!(by_tag["count"], 2);

    // a recipe carrying several of the requested tags is listed once
    let (_, any_tag) = app
        .call("GET", "/api/recipes?tags=breakfast&tags=lunch&limit=10", None, None)
        .await;
    assert_eq!(any_tag["count"], 3);
    let mut ids: Vec<i64> = any_tag["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    ids.sort();
    let mut expected = vec![first, second, third];
    expected.sort();
    assert_eq!(ids, expected);

    let (_, by_author) = app
        .call("GET", &format!("/api/recipes?author={author_id}&limit=10"), None, None)
        .await;
    assert_eq!(by_author["count"], 2);

    app.call("POST", &format!("/api/recipes/{second}/favorite"), Some(&me), None)
        .await;
    let (_, favs) = app
        .call("GET", "/api/recipes?is_favorited=1", Some(&me), None)
        .await;
    assert_eq!(favs["count"], 1);
    assert_eq!(favs["results"][0]["id"], second);
    let (_, not_favs) = app
        .call("GET", "/api/recipes?is_favorited=false&limit=10", Some(&me), None)
        .await;
    assert_eq!(not_favs["count"], 2);

    app.call("POST", &format!("/api/recipes/{first}/shopping_cart"), Some(&me), None)
        .await;
    let (_, in_cart) = app
        .call("GET", "/api/recipes?is_in_shopping_cart=1", Some(&me), None)
        .await;
    assert_eq!(in_cart["count"], 1);
    assert_eq!(in_cart["results"][0]["id"], first);
    assert_eq!(in_cart["results"][0]["is_in_shopping_cart"], true);
    let (_, not_in_cart) = app
        .call("GET", "/api/recipes?is_in_shopping_cart=0&limit=10", Some(&me), None)
        .await;
    assert_eq!(not_in_cart["count"], 2);
    assert!(not_in_cart["results"]
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["id"] != first && r["is_in_shopping_cart"] == false));

    // relation filters are ignored for anonymous requests
    let (_, anon) = app
        .call("GET", "/api/recipes?is_favorited=1", None, None)
        .await;
    assert_eq!(anon["count"], 3);

    let (status, _) = app
        .call("GET", "/api/recipes?is_favorited=maybe", Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn relation_rows_follow_deleted_recipes_and_users() {
    let app = setup().await;
    let db = app.db.seaorm();
    let (author_id, author) = app.user("author").await;
    let (fan_id, fan) = app.user("fan").await;
    let cake = app
        .recipe(&author, "Cake", json!([{"id": 1, "amount": 200}]), json!([1]))
        .await;
    let pie = app
        .recipe(&author, "Pie", json!([{"id": 2, "amount": 3}]), json!([2]))
        .await;
    for id in [cake, pie] {
        for action in ["favorite", "shopping_cart"] {
            let (status, _) = app
                .call("POST", &format!("/api/recipes/{id}/{action}"), Some(&fan), None)
                .await;
            assert_eq!(status, StatusCode::CREATED);
        }
    }
    let (status, _) = app
        .call("POST", &format!("/api/users/{author_id}/subscribe"), Some(&fan), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = app
        .call("DELETE", &format!("/api/recipes/{cake}"), Some(&author), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let favs = favorite::Entity::find()
        .filter(favorite::Column::RecipeId.eq(cake))
        .count(db)
        .await
        .unwrap();
    let carts = shopping_cart::Entity::find()
        .filter(shopping_cart::Column::RecipeId.eq(cake))
        .count(db)
        .await
        .unwrap();
    assert_eq!((favs, carts), (0, 0));
    assert_eq!(favorite::Entity::find().count(db).await.unwrap(), 1);
    assert_eq!(shopping_cart::Entity::find().count(db).await.unwrap(), 1);

    user::Entity::delete_by_id(fan_id).exec(db).await.unwrap();
    assert_eq!(favorite::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(shopping_cart::Entity::find().count(db).await.unwrap(), 0);
    assert_eq!(subscription::Entity::find().count(db).await.unwrap(), 0);

    user::Entity::delete_by_id(author_id).exec(db).await.unwrap();
    assert_eq!(recipe::Entity::find().count(db).await.unwrap(), 0);
    let (status, _) = app
        .call("GET", &format!("/api/recipes/{pie}"), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn subscriptions_flow() {
    let app = setup().await;
    let (author_id, author) = app.user("author").await;
    let (me_id, me) = app.user("fan").await;
    for (i, name) in ["One", "Two", "Three"].into_iter().enumerate() {
        app.recipe(
            &author,
            name,
            json!([{"id": 1, "amount": 10 + i as i64}]),
            json!([1]),
        )
        .await;
    }

    let (status, _) = app
        .call("POST", &format!("/api/users/{me_id}/subscribe"), Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let sub = format!("/api/users/{author_id}/subscribe");
    let (status, body) = app
        .call("POST", &format!("{sub}?recipes_limit=2"), Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["id"], author_id);
    assert_eq!(body["is_subscribed"], true);
    assert_eq!(body["recipes"].as_array().unwrap().len(), 2);
    assert_eq!(body["recipes_count"], 3);

    let (status, _) = app.call("POST", &sub, Some(&me), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = app
        .call("POST", "/api/users/999/subscribe", Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, profile) = app
        .call("GET", &format!("/api/users/{author_id}"), Some(&me), None)
        .await;
    assert_eq!(profile["is_subscribed"], true);

    let (status, list) = app
        .call("GET", "/api/users/subscriptions?recipes_limit=1", Some(&me), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["count"], 1);
    assert_eq!(list["results"][0]["recipes"].as_array().unwrap().len(), 1);
    assert_eq!(list["results"][0]["recipes_count"], 3);

    let (status, _) = app.call("DELETE", &sub, Some(&me), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.call("DELETE", &sub, Some(&me), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app
        .call("GET", "/api/users/subscriptions", Some(&me), None)
        .await;
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn users_list_is_paginated() {
    let app = setup().await;
    for name in ["u1", "u2", "u3"] {
        app.user(name).await;
    }
    let (status, page) = app.call("GET", "/api/users?limit=2", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(page["count"], 3);
    assert_eq!(page["next"], "/api/users?limit=2&page=2");

    let (status, _) = app.call("GET", "/api/users?page=0", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn module_exposes_documents_and_client() {
    let app = setup().await;
    let paths = app.registry.0.lock().unwrap().clone();
    assert!(paths.contains(&"/api/recipes".to_string()));
    assert!(paths.contains(&"/api/recipes/download_shopping_cart".to_string()));

    let client = app.module.client().unwrap();
    let tags = client.list_tags().await.unwrap();
    assert_eq!(tags.len(), 2);
    let err = client.get_recipe(404, None).await.unwrap_err();
    assert_eq!(err, foodgram::FoodgramError::not_found("recipe", 404));
}
