use std::path::PathBuf;
use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use axum::Router;
use modkit::contracts::{DbModule, Module, OpenApiRegistry, RestfulModule};
use modkit::ModuleCtx;
use sea_orm_migration::MigratorTrait;
use tracing::{debug, info};

use crate::api::rest::routes;
use crate::config::FoodgramConfig;
use crate::contract::client::FoodgramApi;
use crate::domain::service::Service;
use crate::gateways::local::FoodgramLocalClient;
use crate::infra::media::LocalMediaStore;
use crate::infra::storage::{Migrator, SeaOrmRepository};

pub const MODULE_NAME: &str = "foodgram";

/// Recipes, users, subscriptions and the shopping cart.
pub struct FoodgramModule {
    service: ArcSwapOption<Service>,
    config: ArcSwap<FoodgramConfig>,
}

impl Default for FoodgramModule {
    fn default() -> Self {
        Self {
            service: ArcSwapOption::from(None),
            config: ArcSwap::from_pointee(FoodgramConfig::default()),
        }
    }
}

impl FoodgramModule {
    pub fn config(&self) -> FoodgramConfig {
        (**self.config.load()).clone()
    }

    fn service(&self) -> anyhow::Result<Arc<Service>> {
        self.service
            .load_full()
            .ok_or_else(|| anyhow::anyhow!("{MODULE_NAME} module is not initialized"))
    }

    /// In-process client for other modules; available after `init`.
    pub fn client(&self) -> anyhow::Result<Arc<dyn FoodgramApi>> {
        Ok(Arc::new(FoodgramLocalClient::new(self.service()?)))
    }
}

#[async_trait]
impl Module for FoodgramModule {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        let cfg = ctx.module_config::<FoodgramConfig>();
        anyhow::ensure!(
            cfg.default_page_size > 0 && cfg.default_page_size <= cfg.max_page_size,
            "default_page_size must be between 1 and max_page_size"
        );
        let db = ctx.db_required()?;

        let repo = Arc::new(SeaOrmRepository::new(db.sea()));
        let images = Arc::new(LocalMediaStore::new(&cfg.media_root));
        let service = Service::new(repo, images, &cfg);

        debug!(media_root = %cfg.media_root, page_size = cfg.default_page_size, "foodgram configured");
        self.service.store(Some(Arc::new(service)));
        self.config.store(Arc::new(cfg));
        info!("foodgram module initialized");
        Ok(())
    }
}

#[async_trait]
impl DbModule for FoodgramModule {
    async fn migrate(&self, db: &modkit_db::DbHandle) -> anyhow::Result<()> {
        info!("running foodgram migrations");
        Migrator::up(db.seaorm(), None).await?;
        Ok(())
    }
}

impl RestfulModule for FoodgramModule {
    fn register_rest(
        &self,
        _ctx: &ModuleCtx,
        router: Router,
        openapi: &dyn OpenApiRegistry,
    ) -> anyhow::Result<Router> {
        let service = self.service()?;
        let media_root = PathBuf::from(self.config().media_root);
        routes::register_routes(router, openapi, service, media_root)
    }
}

/// Adds the module to a registry; depends on the REST host.
pub fn register(builder: &mut modkit::RegistryBuilder) {
    let module = Arc::new(FoodgramModule::default());
    builder
        .register_core(MODULE_NAME, &["api_ingress"], module.clone())
        .register_db(MODULE_NAME, module.clone())
        .register_rest(MODULE_NAME, module);
}
