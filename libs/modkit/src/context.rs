use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Provider of module-specific configuration (raw JSON sections only).
pub trait ConfigProvider: Send + Sync {
    fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value>;
}

#[derive(Clone)]
pub struct ModuleCtx {
    pub(crate) db: Option<Arc<modkit_db::DbHandle>>,
    pub(crate) config_provider: Option<Arc<dyn ConfigProvider>>,
    pub(crate) cancellation_token: CancellationToken,
    pub(crate) module_name: Option<Arc<str>>,
}

pub struct ModuleCtxBuilder {
    inner: ModuleCtx,
}

impl ModuleCtxBuilder {
    pub fn new(token: CancellationToken) -> Self {
        Self {
            inner: ModuleCtx {
                db: None,
                config_provider: None,
                cancellation_token: token,
                module_name: None,
            },
        }
    }

    pub fn with_db(mut self, db: Arc<modkit_db::DbHandle>) -> Self {
        self.inner.db = Some(db);
        self
    }

    pub fn with_config_provider(mut self, p: Arc<dyn ConfigProvider>) -> Self {
        self.inner.config_provider = Some(p);
        self
    }

    pub fn build(self) -> ModuleCtx {
        self.inner
    }
}

impl ModuleCtx {
    /// Scope the context to one module; used by the registry for every phase call.
    pub fn for_module(mut self, name: &str) -> Self {
        self.module_name = Some(Arc::<str>::from(name));
        self
    }

    pub fn db(&self) -> Option<Arc<modkit_db::DbHandle>> {
        self.db.clone()
    }

    pub fn db_required(&self) -> anyhow::Result<Arc<modkit_db::DbHandle>> {
        self.db
            .clone()
            .ok_or_else(|| anyhow::anyhow!("module requires a database but none is configured"))
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancellation_token
    }

    pub fn current_module(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    /// Best-effort: missing or invalid section falls back to `T::default()`.
    pub fn module_config<T: DeserializeOwned + Default>(&self) -> T {
        match self.module_config_required() {
            Ok(cfg) => cfg,
            Err(e) => {
                tracing::debug!(module = ?self.module_name, error = %e, "using default module config");
                T::default()
            }
        }
    }

    /// Strict variant with a pathful error.
    pub fn module_config_required<T: DeserializeOwned>(&self) -> anyhow::Result<T> {
        let name = self
            .module_name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("context is not scoped to a module"))?;

        let prov = self
            .config_provider
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("no ConfigProvider"))?;

        let val = prov
            .get_module_config(name)
            .ok_or_else(|| anyhow::anyhow!("missing module config: {name}"))?;

        serde_json::from_value(val.clone()).map_err(|e| anyhow::anyhow!("invalid {name} config: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::collections::HashMap;

    struct MapProvider(HashMap<String, serde_json::Value>);

    impl ConfigProvider for MapProvider {
        fn get_module_config(&self, module_name: &str) -> Option<&serde_json::Value> {
            self.0.get(module_name)
        }
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct Cfg {
        #[serde(default = "five")]
        size: u32,
    }

    fn five() -> u32 {
        5
    }

    impl Default for Cfg {
        fn default() -> Self {
            Self { size: 99 }
        }
    }

    fn ctx_with(values: serde_json::Value) -> ModuleCtx {
        let mut map = HashMap::new();
        map.insert("m".to_string(), values);
        ModuleCtxBuilder::new(CancellationToken::new())
            .with_config_provider(Arc::new(MapProvider(map)))
            .build()
    }

    #[test]
    fn scoped_context_reads_its_section() {
        let ctx = ctx_with(serde_json::json!({"size": 7})).for_module("m");
        assert_eq!(ctx.current_module(), Some("m"));
        assert_eq!(ctx.module_config::<Cfg>(), Cfg { size: 7 });
    }

    #[test]
    fn missing_section_falls_back_to_default() {
        let ctx = ctx_with(serde_json::json!({})).for_module("other");
        assert_eq!(ctx.module_config::<Cfg>(), Cfg { size: 99 });
        assert!(ctx.module_config_required::<Cfg>().is_err());
    }

    #[test]
    fn invalid_section_is_reported_by_strict_reader() {
        let ctx = ctx_with(serde_json::json!({"size": "big"})).for_module("m");
        let err = ctx.module_config_required::<Cfg>().unwrap_err();
        assert!(err.to_string().contains("invalid m config"));
        assert!(ctx.db_required().is_err());
    }
}
