use axum::Router;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::context::ModuleCtx;
use crate::contracts::{DbModule, Module, RestHostModule, RestfulModule, StatefulModule};

struct ModuleEntry {
    name: &'static str,
    deps: &'static [&'static str],
    core: Arc<dyn Module>,
    rest: Option<Arc<dyn RestfulModule>>,
    rest_host: Option<Arc<dyn RestHostModule>>,
    db: Option<Arc<dyn DbModule>>,
    stateful: Option<Arc<dyn StatefulModule>>,
}

impl ModuleEntry {
    fn new(name: &'static str, deps: &'static [&'static str], core: Arc<dyn Module>) -> Self {
        Self {
            name,
            deps,
            core,
            rest: None,
            rest_host: None,
            db: None,
            stateful: None,
        }
    }
}

/// Modules in dependency order, ready to be driven by the runner.
pub struct ModuleRegistry {
    modules: Vec<ModuleEntry>,
}

impl std::fmt::Debug for ModuleRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.modules.iter().map(|m| m.name))
            .finish()
    }
}

impl ModuleRegistry {
    pub async fn run_init_phase(&self, base_ctx: &ModuleCtx) -> Result<(), RegistryError> {
        for e in &self.modules {
            let ctx = base_ctx.clone().for_module(e.name);
            e.core
                .init(&ctx)
                .await
                .map_err(|source| RegistryError::Init {
                    module: e.name,
                    source,
                })?;
        }
        Ok(())
    }

    pub async fn run_db_phase(&self, db: &modkit_db::DbHandle) -> Result<(), RegistryError> {
        for e in &self.modules {
            let Some(dbm) = &e.db else { continue };
            tracing::info!(module = e.name, "running migrations");
            dbm.migrate(db)
                .await
                .map_err(|source| RegistryError::DbMigrate {
                    module: e.name,
                    source,
                })?;
        }
        Ok(())
    }

    /// Host prepares the router, every module adds its routes, host finalizes.
    pub fn run_rest_phase(
        &self,
        base_ctx: &ModuleCtx,
        router: Router,
    ) -> Result<Router, RegistryError> {
        let host = self
            .modules
            .iter()
            .find_map(|e| e.rest_host.as_ref().map(|h| (e.name, h)));
        let Some((host_name, host)) = host else {
            if self.modules.iter().any(|e| e.rest.is_some()) {
                return Err(RegistryError::RestRequiresHost);
            }
            return Ok(router);
        };
        let host_ctx = base_ctx.clone().for_module(host_name);

        let mut router = host
            .rest_prepare(&host_ctx, router)
            .map_err(|source| RegistryError::RestPrepare {
                module: host_name,
                source,
            })?;
        for e in &self.modules {
            let Some(rest) = &e.rest else { continue };
            let ctx = base_ctx.clone().for_module(e.name);
            router = rest
                .register_rest(&ctx, router, host.as_registry())
                .map_err(|source| RegistryError::RestRegister {
                    module: e.name,
                    source,
                })?;
        }
        host.rest_finalize(&host_ctx, router)
            .map_err(|source| RegistryError::RestFinalize {
                module: host_name,
                source,
            })
    }

    pub async fn run_start_phase(&self, cancel: CancellationToken) -> Result<(), RegistryError> {
        for e in &self.modules {
            let Some(s) = &e.stateful else { continue };
            s.start(cancel.clone())
                .await
                .map_err(|source| RegistryError::Start {
                    module: e.name,
                    source,
                })?;
        }
        Ok(())
    }

    /// Reverse dependency order. Errors are logged and the remaining modules still stop.
    pub async fn run_stop_phase(&self, cancel: CancellationToken) {
        for e in self.modules.iter().rev() {
            let Some(s) = &e.stateful else { continue };
            if let Err(err) = s.stop(cancel.clone()).await {
                tracing::warn!(module = e.name, error = %err, "module stop failed");
            }
        }
    }
}

enum Capability {
    Rest(Arc<dyn RestfulModule>),
    RestHost(Arc<dyn RestHostModule>),
    Db(Arc<dyn DbModule>),
    Stateful(Arc<dyn StatefulModule>),
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: Vec<ModuleEntry>,
    capabilities: Vec<(&'static str, Capability)>,
    host: Option<&'static str>,
    errors: Vec<String>,
}

impl RegistryBuilder {
    pub fn register_core(
        &mut self,
        name: &'static str,
        deps: &'static [&'static str],
        m: Arc<dyn Module>,
    ) -> &mut Self {
        if self.entries.iter().any(|e| e.name == name) {
            self.errors.push(format!("module '{name}' registered twice"));
        } else {
            self.entries.push(ModuleEntry::new(name, deps, m));
        }
        self
    }

    pub fn register_rest(&mut self, name: &'static str, m: Arc<dyn RestfulModule>) -> &mut Self {
        self.capabilities.push((name, Capability::Rest(m)));
        self
    }

    /// At most one host may be registered.
    pub fn register_rest_host(
        &mut self,
        name: &'static str,
        m: Arc<dyn RestHostModule>,
    ) -> &mut Self {
        match self.host {
            Some(existing) => self.errors.push(format!(
                "REST host already provided by '{existing}', rejected '{name}'"
            )),
            None => {
                self.host = Some(name);
                self.capabilities.push((name, Capability::RestHost(m)));
            }
        }
        self
    }

    pub fn register_db(&mut self, name: &'static str, m: Arc<dyn DbModule>) -> &mut Self {
        self.capabilities.push((name, Capability::Db(m)));
        self
    }

    pub fn register_stateful(&mut self, name: &'static str, m: Arc<dyn StatefulModule>) -> &mut Self {
        self.capabilities.push((name, Capability::Stateful(m)));
        self
    }

    /// Attach capabilities to their modules and order modules so that
    /// dependencies come first. Independent modules keep registration order.
    pub fn build_topo_sorted(self) -> Result<ModuleRegistry, RegistryError> {
        if !self.errors.is_empty() {
            return Err(RegistryError::InvalidRegistryConfiguration {
                errors: self.errors,
            });
        }

        let mut entries = self.entries;
        let index: HashMap<&'static str, usize> =
            entries.iter().enumerate().map(|(i, e)| (e.name, i)).collect();

        for (name, cap) in self.capabilities {
            let i = *index
                .get(name)
                .ok_or_else(|| RegistryError::UnknownModule(name.to_string()))?;
            let entry = &mut entries[i];
            match cap {
                Capability::Rest(m) => entry.rest = Some(m),
                Capability::RestHost(m) => entry.rest_host = Some(m),
                Capability::Db(m) => entry.db = Some(m),
                Capability::Stateful(m) => entry.stateful = Some(m),
            }
        }

        let order = dependency_order(&entries, &index)?;
        let mut slots: Vec<Option<ModuleEntry>> = entries.into_iter().map(Some).collect();
        let modules: Vec<ModuleEntry> = order.into_iter().filter_map(|i| slots[i].take()).collect();

        tracing::info!(
            modules = ?modules.iter().map(|e| e.name).collect::<Vec<_>>(),
            "module order resolved"
        );
        Ok(ModuleRegistry { modules })
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    New,
    OnPath,
    Done,
}

/// Depth-first post-order over the declared dependencies.
fn dependency_order(
    entries: &[ModuleEntry],
    index: &HashMap<&'static str, usize>,
) -> Result<Vec<usize>, RegistryError> {
    fn visit(
        i: usize,
        entries: &[ModuleEntry],
        index: &HashMap<&'static str, usize>,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
        out: &mut Vec<usize>,
    ) -> Result<(), RegistryError> {
        match marks[i] {
            Mark::Done => return Ok(()),
            Mark::OnPath => {
                let start = path.iter().position(|&p| p == i).unwrap_or(0);
                return Err(RegistryError::CycleDetected {
                    modules: path[start..].iter().map(|&p| entries[p].name).collect(),
                });
            }
            Mark::New => {}
        }
        marks[i] = Mark::OnPath;
        path.push(i);
        for &dep in entries[i].deps {
            let d = *index
                .get(dep)
                .ok_or_else(|| RegistryError::UnknownDependency {
                    module: entries[i].name.to_string(),
                    depends_on: dep.to_string(),
                })?;
            visit(d, entries, index, marks, path, out)?;
        }
        path.pop();
        marks[i] = Mark::Done;
        out.push(i);
        Ok(())
    }

    let mut marks = vec![Mark::New; entries.len()];
    let mut path = Vec::new();
    let mut out = Vec::with_capacity(entries.len());
    for i in 0..entries.len() {
        visit(i, entries, index, &mut marks, &mut path, &mut out)?;
    }
    Ok(out)
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("module '{module}' failed to initialize")]
    Init {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("module '{module}' failed to start")]
    Start {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("migrations of module '{module}' failed")]
    DbMigrate {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("REST host '{module}' failed to prepare the router")]
    RestPrepare {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("module '{module}' failed to register routes")]
    RestRegister {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("REST host '{module}' failed to finalize the router")]
    RestFinalize {
        module: &'static str,
        #[source]
        source: anyhow::Error,
    },
    #[error("modules expose REST routes but no REST host is registered")]
    RestRequiresHost,
    #[error("capability registered for unknown module '{0}'")]
    UnknownModule(String),
    #[error("module '{module}' depends on unknown module '{depends_on}'")]
    UnknownDependency { module: String, depends_on: String },
    #[error("dependency cycle: {modules:?}")]
    CycleDetected { modules: Vec<&'static str> },
    #[error("invalid module registration: {errors:?}")]
    InvalidRegistryConfiguration { errors: Vec<String> },
}
