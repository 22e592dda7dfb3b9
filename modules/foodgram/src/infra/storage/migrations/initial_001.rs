use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

fn pk(col: impl IntoIden + 'static) -> ColumnDef {
    ColumnDef::new(col)
        .big_integer()
        .not_null()
        .auto_increment()
        .primary_key()
        .to_owned()
}

fn fk(
    name: &str,
    from: (impl IntoIden + 'static, impl IntoIden + 'static),
    to: (impl IntoIden + 'static, impl IntoIden + 'static),
) -> ForeignKeyCreateStatement {
    ForeignKey::create()
        .name(name)
        .from(from.0, from.1)
        .to(to.0, to.1)
        .on_delete(ForeignKeyAction::Cascade)
        .on_update(ForeignKeyAction::Cascade)
        .to_owned()
}

/// `(user_id, recipe_id)` join table with a unique pair.
fn user_recipe_table(
    table: impl IntoIden + Copy + 'static,
    id: impl IntoIden + 'static,
    user: impl IntoIden + Copy + 'static,
    recipe: impl IntoIden + Copy + 'static,
    prefix: &str,
) -> TableCreateStatement {
    Table::create()
        .table(table)
        .if_not_exists()
        .col(pk(id))
        .col(ColumnDef::new(user).big_integer().not_null())
        .col(ColumnDef::new(recipe).big_integer().not_null())
        .index(
            Index::create()
                .name(format!("uidx_{prefix}_user_recipe"))
                .col(user)
                .col(recipe)
                .unique(),
        )
        .foreign_key(&mut fk(
            &format!("fk_{prefix}_user_id"),
            (table, user),
            (Users::Table, Users::Id),
        ))
        .foreign_key(&mut fk(
            &format!("fk_{prefix}_recipe_id"),
            (table, recipe),
            (Recipes::Table, Recipes::Id),
        ))
        .to_owned()
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Users::Table)
                    .if_not_exists()
                    .col(pk(Users::Id))
                    .col(ColumnDef::new(Users::Email).string_len(254).not_null().unique_key())
                    .col(ColumnDef::new(Users::Username).string_len(150).not_null().unique_key())
                    .col(ColumnDef::new(Users::FirstName).string_len(150).not_null())
                    .col(ColumnDef::new(Users::LastName).string_len(150).not_null())
                    .col(ColumnDef::new(Users::PasswordHash).string().not_null())
                    .col(ColumnDef::new(Users::Role).string_len(16).not_null())
                    .col(ColumnDef::new(Users::DateJoined).timestamp_with_time_zone().not_null())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(AuthTokens::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(AuthTokens::Key).string_len(40).not_null().primary_key())
                    .col(ColumnDef::new(AuthTokens::UserId).big_integer().not_null().unique_key())
                    .col(ColumnDef::new(AuthTokens::CreatedAt).timestamp_with_time_zone().not_null())
                    .foreign_key(&mut fk(
                        "fk_auth_tokens_user_id",
                        (AuthTokens::Table, AuthTokens::UserId),
                        (Users::Table, Users::Id),
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Tags::Table)
                    .if_not_exists()
                    .col(pk(Tags::Id))
                    .col(ColumnDef::new(Tags::Name).string_len(200).not_null().unique_key())
                    .col(ColumnDef::new(Tags::Color).string_len(7).not_null().unique_key())
                    .col(ColumnDef::new(Tags::Slug).string_len(200).not_null().unique_key())
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Ingredients::Table)
                    .if_not_exists()
                    .col(pk(Ingredients::Id))
                    .col(ColumnDef::new(Ingredients::Name).string_len(200).not_null())
                    .col(ColumnDef::new(Ingredients::MeasurementUnit).string_len(200).not_null())
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_ingredients_name")
                    .table(Ingredients::Table)
                    .col(Ingredients::Name)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Recipes::Table)
                    .if_not_exists()
                    .col(pk(Recipes::Id))
                    .col(ColumnDef::new(Recipes::Name).string_len(200).not_null().unique_key())
                    .col(ColumnDef::new(Recipes::AuthorId).big_integer().not_null())
                    .col(ColumnDef::new(Recipes::Text).text().not_null())
                    .col(ColumnDef::new(Recipes::Image).string().not_null().default(""))
                    .col(ColumnDef::new(Recipes::CookingTime).integer().not_null())
                    .col(ColumnDef::new(Recipes::PubDate).timestamp_with_time_zone().not_null())
                    .check(Expr::col(Recipes::CookingTime).gt(0))
                    .foreign_key(&mut fk(
                        "fk_recipes_author_id",
                        (Recipes::Table, Recipes::AuthorId),
                        (Users::Table, Users::Id),
                    ))
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .name("idx_recipes_pub_date")
                    .table(Recipes::Table)
                    .col(Recipes::PubDate)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(RecipeTags::Table)
                    .if_not_exists()
                    .col(pk(RecipeTags::Id))
                    .col(ColumnDef::new(RecipeTags::RecipeId).big_integer().not_null())
                    .col(ColumnDef::new(RecipeTags::TagId).big_integer().not_null())
                    .index(
                        Index::create()
                            .name("uidx_recipe_tags_recipe_tag")
                            .col(RecipeTags::RecipeId)
                            .col(RecipeTags::TagId)
                            .unique(),
                    )
                    .foreign_key(&mut fk(
                        "fk_recipe_tags_recipe_id",
                        (RecipeTags::Table, RecipeTags::RecipeId),
                        (Recipes::Table, Recipes::Id),
                    ))
                    .foreign_key(&mut fk(
                        "fk_recipe_tags_tag_id",
                        (RecipeTags::Table, RecipeTags::TagId),
                        (Tags::Table, Tags::Id),
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(IngredientAmounts::Table)
                    .if_not_exists()
                    .col(pk(IngredientAmounts::Id))
                    .col(ColumnDef::new(IngredientAmounts::IngredientId).big_integer().not_null())
                    .col(ColumnDef::new(IngredientAmounts::RecipeId).big_integer().not_null())
                    .col(ColumnDef::new(IngredientAmounts::Amount).integer().not_null())
                    .check(Expr::col(IngredientAmounts::Amount).gt(0))
                    .index(
                        Index::create()
                            .name("uidx_ingredient_amounts_recipe_ingredient")
                            .col(IngredientAmounts::RecipeId)
                            .col(IngredientAmounts::IngredientId)
                            .unique(),
                    )
                    .foreign_key(&mut fk(
                        "fk_ingredient_amounts_ingredient_id",
                        (IngredientAmounts::Table, IngredientAmounts::IngredientId),
                        (Ingredients::Table, Ingredients::Id),
                    ))
                    .foreign_key(&mut fk(
                        "fk_ingredient_amounts_recipe_id",
                        (IngredientAmounts::Table, IngredientAmounts::RecipeId),
                        (Recipes::Table, Recipes::Id),
                    ))
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(user_recipe_table(
                Favorites::Table,
                Favorites::Id,
                Favorites::UserId,
                Favorites::RecipeId,
                "favorites",
            ))
            .await?;
        manager
            .create_table(user_recipe_table(
                ShoppingCarts::Table,
                ShoppingCarts::Id,
                ShoppingCarts::UserId,
                ShoppingCarts::RecipeId,
                "shopping_carts",
            ))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Subscriptions::Table)
                    .if_not_exists()
                    .col(pk(Subscriptions::Id))
                    .col(ColumnDef::new(Subscriptions::UserId).big_integer().not_null())
                    .col(ColumnDef::new(Subscriptions::AuthorId).big_integer().not_null())
                    .check(Expr::col(Subscriptions::UserId).ne(Expr::col(Subscriptions::AuthorId)))
                    .index(
                        Index::create()
                            .name("uidx_subscriptions_user_author")
                            .col(Subscriptions::UserId)
                            .col(Subscriptions::AuthorId)
                            .unique(),
                    )
                    .foreign_key(&mut fk(
                        "fk_subscriptions_user_id",
                        (Subscriptions::Table, Subscriptions::UserId),
                        (Users::Table, Users::Id),
                    ))
                    .foreign_key(&mut fk(
                        "fk_subscriptions_author_id",
                        (Subscriptions::Table, Subscriptions::AuthorId),
                        (Users::Table, Users::Id),
                    ))
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        drop_table(manager, Subscriptions::Table).await?;
        drop_table(manager, ShoppingCarts::Table).await?;
        drop_table(manager, Favorites::Table).await?;
        drop_table(manager, IngredientAmounts::Table).await?;
        drop_table(manager, RecipeTags::Table).await?;
        drop_table(manager, Recipes::Table).await?;
        drop_table(manager, Ingredients::Table).await?;
        drop_table(manager, Tags::Table).await?;
        drop_table(manager, AuthTokens::Table).await?;
        drop_table(manager, Users::Table).await
    }
}

async fn drop_table(manager: &SchemaManager<'_>, table: impl IntoIden + 'static) -> Result<(), DbErr> {
    manager
        .drop_table(Table::drop().table(table).if_exists().to_owned())
        .await
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
    Email,
    Username,
    FirstName,
    LastName,
    PasswordHash,
    Role,
    DateJoined,
}

#[derive(DeriveIden)]
enum AuthTokens {
    Table,
    Key,
    UserId,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tags {
    Table,
    Id,
    Name,
    Color,
    Slug,
}

#[derive(DeriveIden)]
enum Ingredients {
    Table,
    Id,
    Name,
    MeasurementUnit,
}

#[derive(DeriveIden)]
enum Recipes {
    Table,
    Id,
    Name,
    AuthorId,
    Text,
    Image,
    CookingTime,
    PubDate,
}

#[derive(DeriveIden)]
enum RecipeTags {
    Table,
    Id,
    RecipeId,
    TagId,
}

#[derive(DeriveIden)]
enum IngredientAmounts {
    Table,
    Id,
    IngredientId,
    RecipeId,
    Amount,
}

#[derive(DeriveIden, Clone, Copy)]
enum Favorites {
    Table,
    Id,
    UserId,
    RecipeId,
}

#[derive(DeriveIden, Clone, Copy)]
enum ShoppingCarts {
    Table,
    Id,
    UserId,
    RecipeId,
}

#[derive(DeriveIden)]
enum Subscriptions {
    Table,
    Id,
    UserId,
    AuthorId,
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::SqliteQueryBuilder;

    #[test]
    fn join_table_has_unique_pair_and_cascading_keys() {
        let sql = user_recipe_table(
            Favorites::Table,
            Favorites::Id,
            Favorites::UserId,
            Favorites::RecipeId,
            "favorites",
        )
        .to_string(SqliteQueryBuilder);

        assert!(sql.contains("\"favorites\""), "{sql}");
        assert!(sql.contains("UNIQUE"), "{sql}");
        assert!(sql.contains("REFERENCES \"users\""), "{sql}");
        assert!(sql.contains("REFERENCES \"recipes\""), "{sql}");
        assert_eq!(sql.matches("ON DELETE CASCADE").count(), 2, "{sql}");
    }
}
