//! HTTP host module: owns the listener, the global middleware stack and the
//! merged OpenAPI document. Every other module only contributes routes.

use async_trait::async_trait;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use arc_swap::ArcSwap;
use axum::{
    extract::DefaultBodyLimit, http::header, middleware::from_fn, response::IntoResponse,
    routing::get, Router,
};
use modkit::contracts::OpenApiRegistry;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::CorsLayer,
    limit::RequestBodyLimitLayer,
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
};
use utoipa::openapi::{InfoBuilder, OpenApiBuilder};

mod config;
pub mod request_id;
mod web;

pub use config::ApiIngressConfig;

pub const MODULE_NAME: &str = "api_ingress";

const STOP_TIMEOUT: Duration = Duration::from_secs(30);

pub struct ApiIngress {
    config: ArcSwap<ApiIngressConfig>,
    /// Documents contributed by modules, merged as they arrive.
    openapi: Mutex<utoipa::openapi::OpenApi>,
    /// Router built by the REST phase; taken by `start`.
    final_router: Mutex<Option<Router>>,
    server: Mutex<Option<JoinHandle<Result<()>>>>,
}

impl Default for ApiIngress {
    fn default() -> Self {
        Self::new(ApiIngressConfig::default())
    }
}

impl ApiIngress {
    pub fn new(config: ApiIngressConfig) -> Self {
        let base = OpenApiBuilder::new()
            .info(
                InfoBuilder::new()
                    .title("Foodgram API")
                    .version(env!("CARGO_PKG_VERSION"))
                    .description(Some("Recipe sharing: recipes, favorites, shopping cart and subscriptions"))
                    .build(),
            )
            .build();
        Self {
            config: ArcSwap::from_pointee(config),
            openapi: Mutex::new(base),
            final_router: Mutex::new(None),
            server: Mutex::new(None),
        }
    }

    pub fn get_config(&self) -> ApiIngressConfig {
        (**self.config.load()).clone()
    }

    /// Snapshot of the merged document.
    pub fn openapi(&self) -> utoipa::openapi::OpenApi {
        self.openapi.lock().clone()
    }

    /// Outermost to innermost:
    /// PropagateRequestId -> SetRequestId -> push_req_id_to_extensions -> Trace -> Timeout -> CORS -> BodyLimit
    fn apply_middleware(&self, mut router: Router) -> Router {
        let config = self.get_config();
        let x_request_id = request_id::header();

        // axum's own 2 MiB extractor cap would otherwise shadow the configured limit
        router = router
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(
                config.body_limit_mb.saturating_mul(1024 * 1024),
            ));
        if config.cors_enabled {
            router = router.layer(CorsLayer::permissive());
        }
        router = router
            .layer(TimeoutLayer::new(Duration::from_secs(
                config.request_timeout_sec.max(1),
            )))
            .layer(request_id::create_trace_layer())
            .layer(from_fn(request_id::push_req_id_to_extensions))
            .layer(SetRequestIdLayer::new(
                x_request_id.clone(),
                request_id::MakeReqId,
            ))
            .layer(PropagateRequestIdLayer::new(x_request_id));
        router
    }

    async fn serve(listener: tokio::net::TcpListener, router: Router, cancel: CancellationToken) -> Result<()> {
        let shutdown = async move {
            cancel.cancelled().await;
            tracing::info!("HTTP server shutting down gracefully (cancellation)");
        };
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|e| anyhow::anyhow!(e))
    }
}

#[async_trait]
impl modkit::Module for ApiIngress {
    async fn init(&self, ctx: &modkit::ModuleCtx) -> Result<()> {
        let cfg = ctx.module_config::<ApiIngressConfig>();
        tracing::debug!(bind_addr = %cfg.bind_addr, docs = cfg.enable_docs, "api_ingress configured");
        self.config.store(Arc::new(cfg));
        Ok(())
    }
}

impl modkit::contracts::RestHostModule for ApiIngress {
    fn rest_prepare(&self, _ctx: &modkit::ModuleCtx, router: Router) -> Result<Router> {
        Ok(router.route("/health", get(web::health_check)))
    }

    fn rest_finalize(&self, _ctx: &modkit::ModuleCtx, mut router: Router) -> Result<Router> {
        if self.get_config().enable_docs {
            // Serialized once; the document is complete after the REST phase.
            let doc = Arc::new(serde_json::to_value(self.openapi())?);
            tracing::info!(
                paths = self.openapi.lock().paths.paths.len(),
                "serving OpenAPI document"
            );
            router = router
                .route(
                    "/openapi.json",
                    get(move || {
                        let doc = doc.clone();
                        async move {
                            (
                                [(header::CACHE_CONTROL, "no-store")],
                                axum::Json((*doc).clone()),
                            )
                                .into_response()
                        }
                    }),
                )
                .route("/docs", get(web::serve_docs));
        }

        let router = self.apply_middleware(router);
        *self.final_router.lock() = Some(router.clone());
        tracing::debug!("REST host finalized router");
        Ok(router)
    }

    fn as_registry(&self) -> &dyn OpenApiRegistry {
        self
    }
}

impl OpenApiRegistry for ApiIngress {
    fn register_document(&self, doc: utoipa::openapi::OpenApi) {
        let mut merged = self.openapi.lock();
        let before = merged.paths.paths.len();
        merged.merge(doc);
        tracing::debug!(
            added = merged.paths.paths.len() - before,
            total = merged.paths.paths.len(),
            "merged OpenAPI paths"
        );
    }
}

#[async_trait]
impl modkit::contracts::StatefulModule for ApiIngress {
    /// Binds before returning so address errors fail the start phase.
    async fn start(&self, cancel: CancellationToken) -> Result<()> {
        let cfg = self.get_config();
        let addr: SocketAddr = cfg
            .bind_addr
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid bind address '{}': {}", cfg.bind_addr, e))?;

        let stored = self.final_router.lock().take();
        let router = match stored {
            Some(r) => r,
            None => {
                tracing::debug!("No router from REST phase, serving health check only");
                self.apply_middleware(Router::new().route("/health", get(web::health_check)))
            }
        };

        let listener = tokio::net::TcpListener::bind(addr).await?;
        tracing::info!("HTTP server bound on {}", listener.local_addr()?);

        let handle = tokio::spawn(Self::serve(listener, router, cancel.child_token()));
        *self.server.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self, cancel: CancellationToken) -> Result<()> {
        cancel.cancel();
        let handle = self.server.lock().take();
        if let Some(handle) = handle {
            match tokio::time::timeout(STOP_TIMEOUT, handle).await {
                Ok(joined) => joined??,
                Err(_) => tracing::warn!("HTTP server did not stop within {:?}", STOP_TIMEOUT),
            }
        }
        Ok(())
    }
}

/// Adds the ingress to a registry as the REST host.
pub fn register(builder: &mut modkit::RegistryBuilder) {
    let module = Arc::new(ApiIngress::default());
    builder
        .register_core(MODULE_NAME, &[], module.clone())
        .register_rest_host(MODULE_NAME, module.clone())
        .register_stateful(MODULE_NAME, module);
}
