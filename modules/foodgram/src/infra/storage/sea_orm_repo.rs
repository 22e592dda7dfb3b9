use std::collections::{BTreeSet, HashMap};

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use modkit::PageRequest;
use sea_orm::sea_query::{Expr, Func, Query};
use sea_orm::{
    ActiveModelTrait, ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DbErr, EntityTrait, FromQueryResult, JoinType, PaginatorTrait, QueryFilter, QueryOrder,
    QuerySelect, RelationTrait, Set, SqlErr, TransactionTrait,
};

use super::entity::{
    auth_token, favorite, ingredient, ingredient_amount, recipe, recipe_tag, shopping_cart,
    subscription, tag, user,
};
use super::recipe_query;
use crate::contract::model::{
    CurrentUser, Ingredient, IngredientAmountInput, Recipe, RecipeFilter, RecipeIngredient,
    RecipeShort, Role, Tag, User,
};
use crate::domain::repo::{
    CartLine, Credentials, FoodgramRepository, NewUserRecord, RecipeMeta, RecipeRecord,
    RecipeRelation, WriteOutcome,
};

/// SeaORM-backed implementation of the domain repository port.
pub struct SeaOrmRepository {
    db: DatabaseConnection,
}

impl SeaOrmRepository {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

fn is_unique_violation(err: &DbErr) -> bool {
    matches!(err.sql_err(), Some(SqlErr::UniqueConstraintViolation(_)))
}

#[derive(Debug, FromQueryResult)]
struct UserRow {
    id: i64,
    email: String,
    username: String,
    first_name: String,
    last_name: String,
    role: String,
    is_subscribed: bool,
}

impl From<UserRow> for User {
    fn from(r: UserRow) -> Self {
        User {
            id: r.id,
            email: r.email,
            username: r.username,
            first_name: r.first_name,
            last_name: r.last_name,
            role: Role::parse(&r.role),
            is_subscribed: r.is_subscribed,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct RecipeRow {
    id: i64,
    name: String,
    author_id: i64,
    text: String,
    image: String,
    cooking_time: i32,
    pub_date: DateTime<Utc>,
    is_favorited: bool,
    is_in_shopping_cart: bool,
}

#[derive(Debug, FromQueryResult)]
struct TagLinkRow {
    recipe_id: i64,
    id: i64,
    name: String,
    color: String,
    slug: String,
}

#[derive(Debug, FromQueryResult)]
struct AmountRow {
    recipe_id: i64,
    id: i64,
    name: String,
    measurement_unit: String,
    amount: i32,
}

#[derive(Debug, FromQueryResult)]
struct CartRow {
    name: String,
    measurement_unit: String,
    amount: i32,
}

fn tag_from(m: tag::Model) -> Tag {
    Tag {
        id: m.id,
        name: m.name,
        color: m.color,
        slug: m.slug,
    }
}

fn ingredient_from(m: ingredient::Model) -> Ingredient {
    Ingredient {
        id: m.id,
        name: m.name,
        measurement_unit: m.measurement_unit,
    }
}

fn short_from(m: recipe::Model) -> RecipeShort {
    RecipeShort {
        id: m.id,
        name: m.name,
        image: m.image,
        cooking_time: m.cooking_time,
    }
}

/// Replace the tag set and ingredient amounts of a recipe.
async fn replace_links<C: ConnectionTrait>(
    conn: &C,
    recipe_id: i64,
    tags: &[i64],
    ingredients: &[IngredientAmountInput],
) -> Result<(), DbErr> {
    recipe_tag::Entity::delete_many()
        .filter(recipe_tag::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;
    if !tags.is_empty() {
        recipe_tag::Entity::insert_many(tags.iter().map(|&tag_id| recipe_tag::ActiveModel {
            recipe_id: Set(recipe_id),
            tag_id: Set(tag_id),
            ..Default::default()
        }))
        .exec_without_returning(conn)
        .await?;
    }

    ingredient_amount::Entity::delete_many()
        .filter(ingredient_amount::Column::RecipeId.eq(recipe_id))
        .exec(conn)
        .await?;
    if !ingredients.is_empty() {
        ingredient_amount::Entity::insert_many(ingredients.iter().map(|item| {
            ingredient_amount::ActiveModel {
                recipe_id: Set(recipe_id),
                ingredient_id: Set(item.id),
                amount: Set(item.amount),
                ..Default::default()
            }
        }))
        .exec_without_returning(conn)
        .await?;
    }
    Ok(())
}

impl SeaOrmRepository {
    async fn users_by_id(
        &self,
        ids: impl IntoIterator<Item = i64>,
        viewer: Option<i64>,
    ) -> anyhow::Result<HashMap<i64, User>> {
        let rows = recipe_query::users(viewer)
            .filter(user::Column::Id.is_in(ids))
            .into_model::<UserRow>()
            .all(&self.db)
            .await
            .context("load users")?;
        Ok(rows.into_iter().map(|r| (r.id, User::from(r))).collect())
    }

    async fn tags_by_recipe(&self, ids: &[i64]) -> anyhow::Result<HashMap<i64, Vec<Tag>>> {
        let rows = recipe_tag::Entity::find()
            .select_only()
            .column_as(recipe_tag::Column::RecipeId, "recipe_id")
            .column_as(tag::Column::Id, "id")
            .column_as(tag::Column::Name, "name")
            .column_as(tag::Column::Color, "color")
            .column_as(tag::Column::Slug, "slug")
            .join(JoinType::InnerJoin, recipe_tag::Relation::Tag.def())
            .filter(recipe_tag::Column::RecipeId.is_in(ids.iter().copied()))
            .order_by_asc(tag::Column::Id)
            .into_model::<TagLinkRow>()
            .all(&self.db)
            .await
            .context("load recipe tags")?;

        let mut out: HashMap<i64, Vec<Tag>> = HashMap::new();
        for r in rows {
            out.entry(r.recipe_id).or_default().push(Tag {
                id: r.id,
                name: r.name,
                color: r.color,
                slug: r.slug,
            });
        }
        Ok(out)
    }

    async fn amounts_by_recipe(
        &self,
        ids: &[i64],
    ) -> anyhow::Result<HashMap<i64, Vec<RecipeIngredient>>> {
        let rows = ingredient_amount::Entity::find()
            .select_only()
            .column_as(ingredient_amount::Column::RecipeId, "recipe_id")
            .column_as(ingredient::Column::Id, "id")
            .column_as(ingredient::Column::Name, "name")
            .column_as(ingredient::Column::MeasurementUnit, "measurement_unit")
            .column_as(ingredient_amount::Column::Amount, "amount")
            .join(
                JoinType::InnerJoin,
                ingredient_amount::Relation::Ingredient.def(),
            )
            .filter(ingredient_amount::Column::RecipeId.is_in(ids.iter().copied()))
            .order_by_asc(ingredient_amount::Column::Id)
            .into_model::<AmountRow>()
            .all(&self.db)
            .await
            .context("load ingredient amounts")?;

        let mut out: HashMap<i64, Vec<RecipeIngredient>> = HashMap::new();
        for r in rows {
            out.entry(r.recipe_id).or_default().push(RecipeIngredient {
                id: r.id,
                name: r.name,
                measurement_unit: r.measurement_unit,
                amount: r.amount,
            });
        }
        Ok(out)
    }

    /// Attach authors, tags and ingredient amounts to annotated recipe rows.
    async fn hydrate(
        &self,
        rows: Vec<RecipeRow>,
        viewer: Option<i64>,
    ) -> anyhow::Result<Vec<Recipe>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();
        let author_ids: BTreeSet<i64> = rows.iter().map(|r| r.author_id).collect();

        let authors = self.users_by_id(author_ids, viewer).await?;
        let mut tags = self.tags_by_recipe(&ids).await?;
        let mut amounts = self.amounts_by_recipe(&ids).await?;

        rows.into_iter()
            .map(|r| -> anyhow::Result<Recipe> {
                let author = authors
                    .get(&r.author_id)
                    .cloned()
                    .with_context(|| {
                        format!("author {} of recipe {} is missing", r.author_id, r.id)
                    })?;
                Ok(Recipe {
                    id: r.id,
                    author,
                    name: r.name,
                    image: r.image,
                    text: r.text,
                    cooking_time: r.cooking_time,
                    pub_date: r.pub_date,
                    tags: tags.remove(&r.id).unwrap_or_default(),
                    ingredients: amounts.remove(&r.id).unwrap_or_default(),
                    is_favorited: r.is_favorited,
                    is_in_shopping_cart: r.is_in_shopping_cart,
                })
            })
            .collect()
    }

    /// Ids from `ids` with no row in `E`.
    async fn missing_ids<E>(&self, column: E::Column, ids: &[i64]) -> anyhow::Result<Vec<i64>>
    where
        E: EntityTrait,
    {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let found: Vec<i64> = E::find()
            .select_only()
            .column(column)
            .filter(column.is_in(ids.iter().copied()))
            .into_tuple::<i64>()
            .all(&self.db)
            .await?;
        Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
    }
}

#[async_trait]
impl FoodgramRepository for SeaOrmRepository {
    async fn find_user(&self, id: i64, viewer: Option<i64>) -> anyhow::Result<Option<User>> {
        let row = recipe_query::users(viewer)
            .filter(user::Column::Id.eq(id))
            .into_model::<UserRow>()
            .one(&self.db)
            .await
            .context("find user")?;
        Ok(row.map(User::from))
    }

    async fn list_users(
        &self,
        viewer: Option<i64>,
        page: PageRequest,
    ) -> anyhow::Result<(Vec<User>, u64)> {
        let paginator = recipe_query::users(viewer)
            .into_model::<UserRow>()
            .paginate(&self.db, page.limit);
        let total = paginator.num_items().await.context("count users")?;
        let rows = paginator.fetch_page(page.index()).await.context("list users")?;
        Ok((rows.into_iter().map(User::from).collect(), total))
    }

    async fn email_taken(&self, email: &str) -> anyhow::Result<bool> {
        let n = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .count(&self.db)
            .await?;
        Ok(n > 0)
    }

    async fn username_taken(&self, username: &str) -> anyhow::Result<bool> {
        let n = user::Entity::find()
            .filter(user::Column::Username.eq(username))
            .count(&self.db)
            .await?;
        Ok(n > 0)
    }

    async fn insert_user(&self, u: NewUserRecord) -> anyhow::Result<WriteOutcome<i64>> {
        let model = user::ActiveModel {
            email: Set(u.email),
            username: Set(u.username),
            first_name: Set(u.first_name),
            last_name: Set(u.last_name),
            password_hash: Set(u.password_hash),
            role: Set(u.role.as_str().to_string()),
            date_joined: Set(Utc::now()),
            ..Default::default()
        };
        match user::Entity::insert(model).exec(&self.db).await {
            Ok(res) => Ok(WriteOutcome::Written(res.last_insert_id)),
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Conflict),
            Err(e) => Err(e).context("insert user"),
        }
    }

    async fn find_credentials_by_email(&self, email: &str) -> anyhow::Result<Option<Credentials>> {
        let found = user::Entity::find()
            .filter(user::Column::Email.eq(email))
            .one(&self.db)
            .await?;
        Ok(found.map(|u| Credentials {
            user_id: u.id,
            password_hash: u.password_hash,
        }))
    }

    async fn find_password_hash(&self, user_id: i64) -> anyhow::Result<Option<String>> {
        let found = user::Entity::find_by_id(user_id).one(&self.db).await?;
        Ok(found.map(|u| u.password_hash))
    }

    async fn update_password_hash(&self, user_id: i64, hash: &str) -> anyhow::Result<()> {
        user::Entity::update_many()
            .col_expr(user::Column::PasswordHash, Expr::value(hash))
            .filter(user::Column::Id.eq(user_id))
            .exec(&self.db)
            .await
            .context("update password")?;
        Ok(())
    }

    async fn find_token(&self, user_id: i64) -> anyhow::Result<Option<String>> {
        let found = auth_token::Entity::find()
            .filter(auth_token::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(found.map(|t| t.key))
    }

    async fn insert_token(&self, user_id: i64, key: &str) -> anyhow::Result<WriteOutcome<()>> {
        let model = auth_token::ActiveModel {
            key: Set(key.to_string()),
            user_id: Set(user_id),
            created_at: Set(Utc::now()),
        };
        match auth_token::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
        {
            Ok(_) => Ok(WriteOutcome::Written(())),
            Err(e) if is_unique_violation(&e) => Ok(WriteOutcome::Conflict),
            Err(e) => Err(e).context("insert token"),
        }
    }

    async fn delete_tokens(&self, user_id: i64) -> anyhow::Result<u64> {
        let res = auth_token::Entity::delete_many()
            .filter(auth_token::Column::UserId.eq(user_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected)
    }

    async fn find_user_by_token(&self, key: &str) -> anyhow::Result<Option<CurrentUser>> {
        let found = auth_token::Entity::find_by_id(key.to_string())
            .find_also_related(user::Entity)
            .one(&self.db)
            .await
            .context("find token")?;
        Ok(found.and_then(|(_, u)| u).map(|u| CurrentUser {
            id: u.id,
            role: Role::parse(&u.role),
        }))
    }

    async fn add_subscription(&self, user_id: i64, author_id: i64) -> anyhow::Result<bool> {
        let model = subscription::ActiveModel {
            user_id: Set(user_id),
            author_id: Set(author_id),
            ..Default::default()
        };
        match subscription::Entity::insert(model)
            .exec_without_returning(&self.db)
            .await
        {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e).context("insert subscription"),
        }
    }

    async fn remove_subscription(&self, user_id: i64, author_id: i64) -> anyhow::Result<bool> {
        let res = subscription::Entity::delete_many()
            .filter(subscription::Column::UserId.eq(user_id))
            .filter(subscription::Column::AuthorId.eq(author_id))
            .exec(&self.db)
            .await?;
        Ok(res.rows_affected > 0)
    }

    async fn list_subscriptions(
        &self,
        user_id: i64,
        page: PageRequest,
    ) -> anyhow::Result<(Vec<User>, u64)> {
        let followed = Query::select()
            .column((subscription::Entity, subscription::Column::AuthorId))
            .from(subscription::Entity)
            .and_where(Expr::col((subscription::Entity, subscription::Column::UserId)).eq(user_id))
            .to_owned();
        let paginator = recipe_query::users(Some(user_id))
            .filter(user::Column::Id.in_subquery(followed))
            .into_model::<UserRow>()
            .paginate(&self.db, page.limit);
        let total = paginator.num_items().await.context("count subscriptions")?;
        let rows = paginator
            .fetch_page(page.index())
            .await
            .context("list subscriptions")?;
        Ok((rows.into_iter().map(User::from).collect(), total))
    }

    async fn author_recipes(
        &self,
        author_id: i64,
        limit: Option<u64>,
    ) -> anyhow::Result<(Vec<RecipeShort>, u64)> {
        let select = recipe::Entity::find()
            .filter(recipe::Column::AuthorId.eq(author_id))
            .order_by_desc(recipe::Column::PubDate)
            .order_by_desc(recipe::Column::Id);
        let total = select.clone().count(&self.db).await?;
        let select = match limit {
            Some(n) => select.limit(n),
            None => select,
        };
        let recipes = select.all(&self.db).await?;
        Ok((recipes.into_iter().map(short_from).collect(), total))
    }

    async fn list_tags(&self) -> anyhow::Result<Vec<Tag>> {
        let tags = tag::Entity::find()
            .order_by_asc(tag::Column::Id)
            .all(&self.db)
            .await?;
        Ok(tags.into_iter().map(tag_from).collect())
    }

    async fn find_tag(&self, id: i64) -> anyhow::Result<Option<Tag>> {
        Ok(tag::Entity::find_by_id(id).one(&self.db).await?.map(tag_from))
    }

    async fn search_ingredients(&self, prefix: Option<&str>) -> anyhow::Result<Vec<Ingredient>> {
        let mut select = ingredient::Entity::find();
        if let Some(prefix) = prefix {
            select = select.filter(
                Expr::expr(Func::lower(Expr::col((
                    ingredient::Entity,
                    ingredient::Column::Name,
                ))))
                .like(format!("{}%", prefix.to_lowercase())),
            );
        }
        let found = select
            .order_by_asc(ingredient::Column::Name)
            .order_by_asc(ingredient::Column::Id)
            .all(&self.db)
            .await?;
        Ok(found.into_iter().map(ingredient_from).collect())
    }

    async fn find_ingredient(&self, id: i64) -> anyhow::Result<Option<Ingredient>> {
        Ok(ingredient::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(ingredient_from))
    }

    async fn missing_tags(&self, ids: &[i64]) -> anyhow::Result<Vec<i64>> {
        self.missing_ids::<tag::Entity>(tag::Column::Id, ids).await
    }

    async fn missing_ingredients(&self, ids: &[i64]) -> anyhow::Result<Vec<i64>> {
        self.missing_ids::<ingredient::Entity>(ingredient::Column::Id, ids)
            .await
    }

    async fn list_recipes(
        &self,
        viewer: Option<i64>,
        filter: &RecipeFilter,
        page: PageRequest,
    ) -> anyhow::Result<(Vec<Recipe>, u64)> {
        let paginator = recipe_query::apply_filter(recipe_query::recipes(viewer), filter, viewer)
            .into_model::<RecipeRow>()
            .paginate(&self.db, page.limit);
        let total = paginator.num_items().await.context("count recipes")?;
        let rows = paginator.fetch_page(page.index()).await.context("list recipes")?;
        Ok((self.hydrate(rows, viewer).await?, total))
    }

    async fn find_recipe(&self, id: i64, viewer: Option<i64>) -> anyhow::Result<Option<Recipe>> {
        let row = recipe_query::recipes(viewer)
            .filter(recipe::Column::Id.eq(id))
            .into_model::<RecipeRow>()
            .one(&self.db)
            .await
            .context("find recipe")?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(self.hydrate(vec![row], viewer).await?.pop())
    }

    async fn find_recipe_short(&self, id: i64) -> anyhow::Result<Option<RecipeShort>> {
        Ok(recipe::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(short_from))
    }

    async fn find_recipe_meta(&self, id: i64) -> anyhow::Result<Option<RecipeMeta>> {
        Ok(recipe::Entity::find_by_id(id)
            .one(&self.db)
            .await?
            .map(|r| RecipeMeta {
                author_id: r.author_id,
                image: r.image,
            }))
    }

    async fn recipe_name_taken(&self, name: &str, exclude: Option<i64>) -> anyhow::Result<bool> {
        let mut select = recipe::Entity::find().filter(recipe::Column::Name.eq(name));
        if let Some(id) = exclude {
            select = select.filter(recipe::Column::Id.ne(id));
        }
        Ok(select.count(&self.db).await? > 0)
    }

    async fn insert_recipe(
        &self,
        author_id: i64,
        record: RecipeRecord,
    ) -> anyhow::Result<WriteOutcome<i64>> {
        let txn = self.db.begin().await?;
        let model = recipe::ActiveModel {
            name: Set(record.name),
            author_id: Set(author_id),
            text: Set(record.text),
            image: Set(record.image.unwrap_or_default()),
            cooking_time: Set(record.cooking_time),
            pub_date: Set(Utc::now()),
            ..Default::default()
        };
        let id = match recipe::Entity::insert(model).exec(&txn).await {
            Ok(res) => res.last_insert_id,
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                return Ok(WriteOutcome::Conflict);
            }
            Err(e) => return Err(e).context("insert recipe"),
        };
        replace_links(&txn, id, &record.tags, &record.ingredients)
            .await
            .context("insert recipe links")?;
        txn.commit().await?;
        Ok(WriteOutcome::Written(id))
    }

    async fn update_recipe(
        &self,
        id: i64,
        record: RecipeRecord,
    ) -> anyhow::Result<WriteOutcome<()>> {
        let txn = self.db.begin().await?;
        let model = recipe::ActiveModel {
            id: Set(id),
            name: Set(record.name),
            text: Set(record.text),
            cooking_time: Set(record.cooking_time),
            image: record.image.map_or(NotSet, Set),
            ..Default::default()
        };
        match model.update(&txn).await {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                txn.rollback().await?;
                return Ok(WriteOutcome::Conflict);
            }
            Err(e) => return Err(e).context("update recipe"),
        }
        replace_links(&txn, id, &record.tags, &record.ingredients)
            .await
            .context("replace recipe links")?;
        txn.commit().await?;
        Ok(WriteOutcome::Written(()))
    }

    async fn delete_recipe(&self, id: i64) -> anyhow::Result<bool> {
        let res = recipe::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(res.rows_affected > 0)
    }

    async fn add_relation(
        &self,
        kind: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> anyhow::Result<bool> {
        let res = match kind {
            RecipeRelation::Favorite => {
                favorite::Entity::insert(favorite::ActiveModel {
                    user_id: Set(user_id),
                    recipe_id: Set(recipe_id),
                    ..Default::default()
                })
                .exec_without_returning(&self.db)
                .await
            }
            RecipeRelation::ShoppingCart => {
                shopping_cart::Entity::insert(shopping_cart::ActiveModel {
                    user_id: Set(user_id),
                    recipe_id: Set(recipe_id),
                    ..Default::default()
                })
                .exec_without_returning(&self.db)
                .await
            }
        };
        match res {
            Ok(_) => Ok(true),
            Err(e) if is_unique_violation(&e) => Ok(false),
            Err(e) => Err(e).with_context(|| format!("insert {kind:?}")),
        }
    }

    async fn remove_relation(
        &self,
        kind: RecipeRelation,
        user_id: i64,
        recipe_id: i64,
    ) -> anyhow::Result<bool> {
        let res = match kind {
            RecipeRelation::Favorite => {
                favorite::Entity::delete_many()
                    .filter(favorite::Column::UserId.eq(user_id))
                    .filter(favorite::Column::RecipeId.eq(recipe_id))
                    .exec(&self.db)
                    .await?
            }
            RecipeRelation::ShoppingCart => {
                shopping_cart::Entity::delete_many()
                    .filter(shopping_cart::Column::UserId.eq(user_id))
                    .filter(shopping_cart::Column::RecipeId.eq(recipe_id))
                    .exec(&self.db)
                    .await?
            }
        };
        Ok(res.rows_affected > 0)
    }

    async fn cart_lines(&self, user_id: i64) -> anyhow::Result<Vec<CartLine>> {
        let in_cart = Query::select()
            .column((shopping_cart::Entity, shopping_cart::Column::RecipeId))
            .from(shopping_cart::Entity)
            .and_where(Expr::col((shopping_cart::Entity, shopping_cart::Column::UserId)).eq(user_id))
            .to_owned();
        let rows = ingredient_amount::Entity::find()
            .select_only()
            .column_as(ingredient::Column::Name, "name")
            .column_as(ingredient::Column::MeasurementUnit, "measurement_unit")
            .column_as(ingredient_amount::Column::Amount, "amount")
            .join(
                JoinType::InnerJoin,
                ingredient_amount::Relation::Ingredient.def(),
            )
            .filter(ingredient_amount::Column::RecipeId.in_subquery(in_cart))
            .into_model::<CartRow>()
            .all(&self.db)
            .await
            .context("load cart lines")?;
        Ok(rows
            .into_iter()
            .map(|r| CartLine {
                name: r.name,
                measurement_unit: r.measurement_unit,
                amount: i64::from(r.amount),
            })
            .collect())
    }
}
