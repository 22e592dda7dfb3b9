use std::sync::Arc;

use modkit::{Page, PageRequest};
use tracing::{debug, info, instrument, warn};

use crate::config::FoodgramConfig;
use crate::contract::model::{
    CurrentUser, Ingredient, NewUser, PasswordChange, Recipe, RecipeDraft, RecipeFilter,
    RecipeShort, Role, Subscription, Tag, User,
};
use crate::domain::credentials::{generate_token_key, hash_password, verify_password};
use crate::domain::error::DomainError;
use crate::domain::repo::{
    FoodgramRepository, ImageStore, NewUserRecord, RecipeRecord, RecipeRelation, WriteOutcome,
};
use crate::domain::{shopping_list, validation};

type DomainResult<T> = Result<T, DomainError>;

/// Domain service: validation, permission checks and orchestration over the
/// repository and the image store.
pub struct Service {
    repo: Arc<dyn FoodgramRepository>,
    images: Arc<dyn ImageStore>,
    default_page_size: u64,
    max_page_size: u64,
}

impl Service {
    pub fn new(
        repo: Arc<dyn FoodgramRepository>,
        images: Arc<dyn ImageStore>,
        config: &FoodgramConfig,
    ) -> Self {
        Self {
            repo,
            images,
            default_page_size: config.default_page_size,
            max_page_size: config.max_page_size,
        }
    }

    pub fn page_request(&self, page: Option<u64>, limit: Option<u64>) -> PageRequest {
        PageRequest::new(page, limit, self.default_page_size, self.max_page_size)
    }

    fn ensure_addressable(req: PageRequest) -> DomainResult<()> {
        req.offset().map(|_| ()).ok_or(DomainError::PageNotFound)
    }

    fn ensure_page(req: PageRequest, total: u64) -> DomainResult<()> {
        if req.is_in_range(total) {
            Ok(())
        } else {
            Err(DomainError::PageNotFound)
        }
    }

    // ----- authentication -----

    pub async fn authenticate(&self, key: &str) -> DomainResult<CurrentUser> {
        self.repo
            .find_user_by_token(key)
            .await
            .map_err(DomainError::database)?
            .ok_or(DomainError::Unauthorized)
    }

    /// Returns the user's token, issuing one on first login.
    #[instrument(name = "foodgram.service.login", skip_all)]
    pub async fn login(&self, email: &str, password: &str) -> DomainResult<String> {
        let creds = self
            .repo
            .find_credentials_by_email(email)
            .await
            .map_err(DomainError::database)?
            .ok_or(DomainError::InvalidCredentials)?;
        if !verify_password(password, &creds.password_hash).map_err(DomainError::database)? {
            return Err(DomainError::InvalidCredentials);
        }

        if let Some(key) = self
            .repo
            .find_token(creds.user_id)
            .await
            .map_err(DomainError::database)?
        {
            return Ok(key);
        }
        let key = generate_token_key();
        match self
            .repo
            .insert_token(creds.user_id, &key)
            .await
            .map_err(DomainError::database)?
        {
            WriteOutcome::Written(()) => {
                info!(user_id = creds.user_id, "issued auth token");
                Ok(key)
            }
            // a concurrent login won the race; hand out its token
            WriteOutcome::Conflict => self
                .repo
                .find_token(creds.user_id)
                .await
                .map_err(DomainError::database)?
                .ok_or(DomainError::Unauthorized),
        }
    }

    #[instrument(name = "foodgram.service.logout", skip(self), fields(user_id = current.id))]
    pub async fn logout(&self, current: CurrentUser) -> DomainResult<()> {
        let removed = self
            .repo
            .delete_tokens(current.id)
            .await
            .map_err(DomainError::database)?;
        debug!(removed, "auth token deleted");
        Ok(())
    }

    // ----- users -----

    #[instrument(name = "foodgram.service.register", skip_all, fields(username = %new_user.username))]
    pub async fn register(&self, new_user: NewUser) -> DomainResult<User> {
        validation::validate_new_user(&new_user)?;
        if self
            .repo
            .email_taken(&new_user.email)
            .await
            .map_err(DomainError::database)?
        {
            return Err(DomainError::validation("email", "A user with that email already exists."));
        }
        if self
            .repo
            .username_taken(&new_user.username)
            .await
            .map_err(DomainError::database)?
        {
            return Err(DomainError::validation(
                "username",
                "A user with that username already exists.",
            ));
        }

        let password_hash = hash_password(&new_user.password).map_err(DomainError::database)?;
        let record = NewUserRecord {
            email: new_user.email,
            username: new_user.username,
            first_name: new_user.first_name,
            last_name: new_user.last_name,
            password_hash,
            role: Role::Authorized,
        };
        let id = match self
            .repo
            .insert_user(record)
            .await
            .map_err(DomainError::database)?
        {
            WriteOutcome::Written(id) => id,
            WriteOutcome::Conflict => {
                return Err(DomainError::validation("email", "A user with that email already exists."))
            }
        };
        info!(user_id = id, "user registered");
        self.get_user(id, None).await
    }

    pub async fn get_user(&self, id: i64, viewer: Option<i64>) -> DomainResult<User> {
        self.repo
            .find_user(id, viewer)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::user_not_found(id))
    }

    pub async fn list_users(&self, viewer: Option<i64>, req: PageRequest) -> DomainResult<Page<User>> {
        Self::ensure_addressable(req)?;
        let (users, total) = self
            .repo
            .list_users(viewer, req)
            .await
            .map_err(DomainError::database)?;
        Self::ensure_page(req, total)?;
        Ok(Page::new(users, total))
    }

    #[instrument(name = "foodgram.service.set_password", skip_all, fields(user_id = current.id))]
    pub async fn set_password(&self, current: CurrentUser, change: PasswordChange) -> DomainResult<()> {
        validation::validate_password("new_password", &change.new_password)?;
        let stored = self
            .repo
            .find_password_hash(current.id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::user_not_found(current.id))?;
        if !verify_password(&change.current_password, &stored).map_err(DomainError::database)? {
            return Err(DomainError::validation("current_password", "Wrong password."));
        }
        if change.current_password == change.new_password {
            return Err(DomainError::validation(
                "new_password",
                "The new password must be different from the current password.",
            ));
        }
        let hash = hash_password(&change.new_password).map_err(DomainError::database)?;
        self.repo
            .update_password_hash(current.id, &hash)
            .await
            .map_err(DomainError::database)?;
        info!("password changed");
        Ok(())
    }

    // ----- subscriptions -----

    async fn subscription_view(
        &self,
        author: User,
        recipes_limit: Option<u64>,
    ) -> DomainResult<Subscription> {
        let (recipes, recipes_count) = self
            .repo
            .author_recipes(author.id, recipes_limit)
            .await
            .map_err(DomainError::database)?;
        Ok(Subscription {
            author,
            recipes,
            recipes_count,
        })
    }

    #[instrument(name = "foodgram.service.subscribe", skip(self), fields(user_id = current.id))]
    pub async fn subscribe(
        &self,
        current: CurrentUser,
        author_id: i64,
        recipes_limit: Option<u64>,
    ) -> DomainResult<Subscription> {
        if current.id == author_id {
            return Err(DomainError::SelfSubscription);
        }
        // existence first so an unknown author is a 404, not a constraint error
        self.get_user(author_id, None).await?;
        if !self
            .repo
            .add_subscription(current.id, author_id)
            .await
            .map_err(DomainError::database)?
        {
            return Err(DomainError::AlreadySubscribed);
        }
        let author = self.get_user(author_id, Some(current.id)).await?;
        self.subscription_view(author, recipes_limit).await
    }

    #[instrument(name = "foodgram.service.unsubscribe", skip(self), fields(user_id = current.id))]
    pub async fn unsubscribe(&self, current: CurrentUser, author_id: i64) -> DomainResult<()> {
        self.get_user(author_id, None).await?;
        if !self
            .repo
            .remove_subscription(current.id, author_id)
            .await
            .map_err(DomainError::database)?
        {
            return Err(DomainError::NotSubscribed);
        }
        Ok(())
    }

    pub async fn subscriptions(
        &self,
        current: CurrentUser,
        req: PageRequest,
        recipes_limit: Option<u64>,
    ) -> DomainResult<Page<Subscription>> {
        Self::ensure_addressable(req)?;
        let (authors, total) = self
            .repo
            .list_subscriptions(current.id, req)
            .await
            .map_err(DomainError::database)?;
        Self::ensure_page(req, total)?;
        let mut views = Vec::with_capacity(authors.len());
        for author in authors {
            views.push(self.subscription_view(author, recipes_limit).await?);
        }
        Ok(Page::new(views, total))
    }

    // ----- tags and ingredients -----

    pub async fn list_tags(&self) -> DomainResult<Vec<Tag>> {
        self.repo.list_tags().await.map_err(DomainError::database)
    }

    pub async fn get_tag(&self, id: i64) -> DomainResult<Tag> {
        self.repo
            .find_tag(id)
            .await
            .map_err(DomainError::database)?
            .ok_or(DomainError::TagNotFound { id })
    }

    pub async fn search_ingredients(&self, prefix: Option<&str>) -> DomainResult<Vec<Ingredient>> {
        let prefix = prefix.map(str::trim).filter(|p| !p.is_empty());
        self.repo
            .search_ingredients(prefix)
            .await
            .map_err(DomainError::database)
    }

    pub async fn get_ingredient(&self, id: i64) -> DomainResult<Ingredient> {
        self.repo
            .find_ingredient(id)
            .await
            .map_err(DomainError::database)?
            .ok_or(DomainError::IngredientNotFound { id })
    }

    // ----- recipes -----

    pub async fn list_recipes(
        &self,
        viewer: Option<i64>,
        filter: RecipeFilter,
        req: PageRequest,
    ) -> DomainResult<Page<Recipe>> {
        Self::ensure_addressable(req)?;
        let (recipes, total) = self
            .repo
            .list_recipes(viewer, &filter, req)
            .await
            .map_err(DomainError::database)?;
        Self::ensure_page(req, total)?;
        Ok(Page::new(recipes, total))
    }

    pub async fn get_recipe(&self, id: i64, viewer: Option<i64>) -> DomainResult<Recipe> {
        self.repo
            .find_recipe(id, viewer)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::recipe_not_found(id))
    }

    /// Reference checks that need storage: tags, ingredients, unique name.
    async fn check_references(&self, draft: &RecipeDraft, exclude: Option<i64>) -> DomainResult<()> {
        let missing = self
            .repo
            .missing_tags(&draft.tags)
            .await
            .map_err(DomainError::database)?;
        if let Some(id) = missing.first() {
            return Err(DomainError::validation("tags", format!("Invalid pk \"{id}\" - object does not exist.")));
        }
        let ids: Vec<i64> = draft.ingredients.iter().map(|i| i.id).collect();
        let missing = self
            .repo
            .missing_ingredients(&ids)
            .await
            .map_err(DomainError::database)?;
        if let Some(id) = missing.first() {
            return Err(DomainError::validation(
                "ingredients",
                format!("Invalid pk \"{id}\" - object does not exist."),
            ));
        }
        if self
            .repo
            .recipe_name_taken(&draft.name, exclude)
            .await
            .map_err(DomainError::database)?
        {
            return Err(DomainError::validation("name", "A recipe with this name already exists."));
        }
        Ok(())
    }

    async fn store_image(&self, draft: &RecipeDraft) -> DomainResult<Option<String>> {
        match &draft.image {
            Some(image) => self
                .images
                .save(&image.ext, &image.bytes)
                .await
                .map(Some)
                .map_err(DomainError::storage),
            None => Ok(None),
        }
    }

    async fn discard_image(&self, path: &str) {
        if path.is_empty() {
            return;
        }
        if let Err(e) = self.images.remove(path).await {
            warn!(path, error = %e, "failed to remove image");
        }
    }

    fn record(draft: RecipeDraft, image: Option<String>) -> RecipeRecord {
        RecipeRecord {
            name: draft.name.trim().to_string(),
            text: draft.text,
            cooking_time: draft.cooking_time,
            image,
            tags: draft.tags,
            ingredients: draft.ingredients,
        }
    }

    #[instrument(name = "foodgram.service.create_recipe", skip(self, draft), fields(user_id = current.id))]
    pub async fn create_recipe(&self, current: CurrentUser, draft: RecipeDraft) -> DomainResult<Recipe> {
        validation::validate_recipe(&draft)?;
        self.check_references(&draft, None).await?;

        let image = self.store_image(&draft).await?;
        let stored = image.clone();
        let record = Self::record(draft, Some(image.unwrap_or_default()));
        let outcome = self.repo.insert_recipe(current.id, record).await;
        let id = match outcome {
            Ok(WriteOutcome::Written(id)) => id,
            other => {
                if let Some(path) = &stored {
                    self.discard_image(path).await;
                }
                return match other {
                    Ok(_) => Err(DomainError::validation("name", "A recipe with this name already exists.")),
                    Err(e) => Err(DomainError::database(e)),
                };
            }
        };
        info!(recipe_id = id, "recipe created");
        self.get_recipe(id, Some(current.id)).await
    }

    async fn authorize_write(&self, current: CurrentUser, id: i64) -> DomainResult<String> {
        let meta = self
            .repo
            .find_recipe_meta(id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::recipe_not_found(id))?;
        if meta.author_id != current.id && !current.is_admin() {
            return Err(DomainError::Forbidden);
        }
        Ok(meta.image)
    }

    #[instrument(name = "foodgram.service.update_recipe", skip(self, draft), fields(user_id = current.id))]
    pub async fn update_recipe(
        &self,
        current: CurrentUser,
        id: i64,
        draft: RecipeDraft,
    ) -> DomainResult<Recipe> {
        let old_image = self.authorize_write(current, id).await?;
        validation::validate_recipe(&draft)?;
        self.check_references(&draft, Some(id)).await?;

        let image = self.store_image(&draft).await?;
        let replaced = image.is_some();
        let stored = image.clone();
        let outcome = self.repo.update_recipe(id, Self::record(draft, image)).await;
        match outcome {
            Ok(WriteOutcome::Written(())) => {
                if replaced {
                    self.discard_image(&old_image).await;
                }
            }
            other => {
                if let Some(path) = &stored {
                    self.discard_image(path).await;
                }
                return match other {
                    Ok(_) => Err(DomainError::validation("name", "A recipe with this name already exists.")),
                    Err(e) => Err(DomainError::database(e)),
                };
            }
        }
        info!(recipe_id = id, "recipe updated");
        self.get_recipe(id, Some(current.id)).await
    }

    #[instrument(name = "foodgram.service.delete_recipe", skip(self), fields(user_id = current.id))]
    pub async fn delete_recipe(&self, current: CurrentUser, id: i64) -> DomainResult<()> {
        let image = self.authorize_write(current, id).await?;
        if !self.repo.delete_recipe(id).await.map_err(DomainError::database)? {
            return Err(DomainError::recipe_not_found(id));
        }
        self.discard_image(&image).await;
        info!(recipe_id = id, "recipe deleted");
        Ok(())
    }

    // ----- favorites and shopping cart -----

    async fn recipe_short(&self, id: i64) -> DomainResult<RecipeShort> {
        self.repo
            .find_recipe_short(id)
            .await
            .map_err(DomainError::database)?
            .ok_or_else(|| DomainError::recipe_not_found(id))
    }

    async fn add_relation(
        &self,
        kind: RecipeRelation,
        current: CurrentUser,
        recipe_id: i64,
    ) -> DomainResult<RecipeShort> {
        let short = self.recipe_short(recipe_id).await?;
        let inserted = self
            .repo
            .add_relation(kind, current.id, recipe_id)
            .await
            .map_err(DomainError::database)?;
        match (inserted, kind) {
            (true, _) => Ok(short),
            (false, RecipeRelation::Favorite) => Err(DomainError::AlreadyFavorited),
            (false, RecipeRelation::ShoppingCart) => Err(DomainError::AlreadyInCart),
        }
    }

    async fn remove_relation(
        &self,
        kind: RecipeRelation,
        current: CurrentUser,
        recipe_id: i64,
    ) -> DomainResult<()> {
        self.recipe_short(recipe_id).await?;
        let removed = self
            .repo
            .remove_relation(kind, current.id, recipe_id)
            .await
            .map_err(DomainError::database)?;
        match (removed, kind) {
            (true, _) => Ok(()),
            (false, RecipeRelation::Favorite) => Err(DomainError::NotFavorited),
            (false, RecipeRelation::ShoppingCart) => Err(DomainError::NotInCart),
        }
    }

    #[instrument(name = "foodgram.service.add_favorite", skip(self), fields(user_id = current.id))]
    pub async fn add_favorite(&self, current: CurrentUser, recipe_id: i64) -> DomainResult<RecipeShort> {
        self.add_relation(RecipeRelation::Favorite, current, recipe_id).await
    }

    #[instrument(name = "foodgram.service.remove_favorite", skip(self), fields(user_id = current.id))]
    pub async fn remove_favorite(&self, current: CurrentUser, recipe_id: i64) -> DomainResult<()> {
        self.remove_relation(RecipeRelation::Favorite, current, recipe_id).await
    }

    #[instrument(name = "foodgram.service.add_to_cart", skip(self), fields(user_id = current.id))]
    pub async fn add_to_cart(&self, current: CurrentUser, recipe_id: i64) -> DomainResult<RecipeShort> {
        self.add_relation(RecipeRelation::ShoppingCart, current, recipe_id).await
    }

    #[instrument(name = "foodgram.service.remove_from_cart", skip(self), fields(user_id = current.id))]
    pub async fn remove_from_cart(&self, current: CurrentUser, recipe_id: i64) -> DomainResult<()> {
        self.remove_relation(RecipeRelation::ShoppingCart, current, recipe_id).await
    }

    #[instrument(name = "foodgram.service.shopping_list", skip(self))]
    pub async fn shopping_list(&self, user_id: i64) -> DomainResult<String> {
        let lines = self
            .repo
            .cart_lines(user_id)
            .await
            .map_err(DomainError::database)?;
        let aggregated = shopping_list::aggregate(lines);
        debug!(items = aggregated.len(), "shopping list aggregated");
        Ok(shopping_list::render(&aggregated))
    }
}
