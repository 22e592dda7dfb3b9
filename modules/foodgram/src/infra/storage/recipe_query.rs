//! Select builders: viewer-relative `EXISTS` annotations and recipe filters.

use sea_orm::sea_query::{Expr, IntoColumnRef, Query, SimpleExpr};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Select};

use super::entity::{favorite, recipe, recipe_tag, shopping_cart, subscription, tag, user};
use crate::contract::model::RecipeFilter;

/// `EXISTS (SELECT 1 FROM e WHERE e.owner = owner_id AND e.target = outer)`.
fn row_exists<E: EntityTrait>(
    owner: E::Column,
    target: E::Column,
    owner_id: i64,
    outer: impl IntoColumnRef,
) -> SimpleExpr {
    Expr::exists(
        Query::select()
            .expr(Expr::val(1))
            .from(E::default())
            .and_where(Expr::col((E::default(), owner)).eq(owner_id))
            .and_where(Expr::col((E::default(), target)).equals(outer))
            .to_owned(),
    )
}

pub fn is_favorited(viewer: i64) -> SimpleExpr {
    row_exists::<favorite::Entity>(
        favorite::Column::UserId,
        favorite::Column::RecipeId,
        viewer,
        (recipe::Entity, recipe::Column::Id),
    )
}

pub fn is_in_shopping_cart(viewer: i64) -> SimpleExpr {
    row_exists::<shopping_cart::Entity>(
        shopping_cart::Column::UserId,
        shopping_cart::Column::RecipeId,
        viewer,
        (recipe::Entity, recipe::Column::Id),
    )
}

pub fn is_subscribed(viewer: i64) -> SimpleExpr {
    row_exists::<subscription::Entity>(
        subscription::Column::UserId,
        subscription::Column::AuthorId,
        viewer,
        (user::Entity, user::Column::Id),
    )
}

/// Anonymous viewers get constant `false` columns.
fn annotation(viewer: Option<i64>, f: fn(i64) -> SimpleExpr) -> SimpleExpr {
    match viewer {
        Some(id) => f(id),
        None => Expr::value(false),
    }
}

/// Users with an `is_subscribed` column, ordered by id.
pub fn users(viewer: Option<i64>) -> Select<user::Entity> {
    user::Entity::find()
        .column_as(annotation(viewer, is_subscribed), "is_subscribed")
        .order_by_asc(user::Column::Id)
}

/// Recipes with `is_favorited` / `is_in_shopping_cart` columns, newest first.
pub fn recipes(viewer: Option<i64>) -> Select<recipe::Entity> {
    recipe::Entity::find()
        .column_as(annotation(viewer, is_favorited), "is_favorited")
        .column_as(annotation(viewer, is_in_shopping_cart), "is_in_shopping_cart")
        .order_by_desc(recipe::Column::PubDate)
        .order_by_desc(recipe::Column::Id)
}

/// Recipe ids carrying any of the given tag slugs.
fn tagged_with(slugs: impl IntoIterator<Item = String>) -> SimpleExpr {
    recipe::Column::Id.in_subquery(
        Query::select()
            .column((recipe_tag::Entity, recipe_tag::Column::RecipeId))
            .from(recipe_tag::Entity)
            .inner_join(
                tag::Entity,
                Expr::col((tag::Entity, tag::Column::Id))
                    .equals((recipe_tag::Entity, recipe_tag::Column::TagId)),
            )
            .and_where(Expr::col((tag::Entity, tag::Column::Slug)).is_in(slugs))
            .to_owned(),
    )
}

fn flag(
    select: Select<recipe::Entity>,
    wanted: Option<bool>,
    expr: SimpleExpr,
) -> Select<recipe::Entity> {
    match wanted {
        Some(true) => select.filter(expr),
        Some(false) => select.filter(expr.not()),
        None => select,
    }
}

/// Relation flags only apply to authenticated viewers.
pub fn apply_filter(
    mut select: Select<recipe::Entity>,
    filter: &RecipeFilter,
    viewer: Option<i64>,
) -> Select<recipe::Entity> {
    if !filter.tags.is_empty() {
        select = select.filter(tagged_with(filter.tags.iter().cloned()));
    }
    if let Some(author) = filter.author {
        select = select.filter(recipe::Column::AuthorId.eq(author));
    }
    if let Some(viewer) = viewer {
        select = flag(select, filter.is_favorited, is_favorited(viewer));
        select = flag(select, filter.is_in_shopping_cart, is_in_shopping_cart(viewer));
    }
    select
}
