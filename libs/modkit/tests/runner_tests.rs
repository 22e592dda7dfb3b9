//! Lifecycle ordering, dependency resolution and failure handling of the runner.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::Router;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use modkit::{
    context::{ConfigProvider, ModuleCtx},
    contracts::{DbModule, Module, OpenApiRegistry, RestHostModule, RestfulModule, StatefulModule},
    registry::{RegistryBuilder, RegistryError},
    runtime::{run, DbOptions, RunOptions, ShutdownOptions, StopSignal},
};

type CallTracker = Arc<Mutex<Vec<String>>>;

struct EmptyConfig;

impl ConfigProvider for EmptyConfig {
    fn get_module_config(&self, _module_name: &str) -> Option<&serde_json::Value> {
        None
    }
}

#[derive(Clone)]
struct TestModule {
    name: &'static str,
    calls: CallTracker,
    fail_init: bool,
    fail_start: bool,
}

impl TestModule {
    fn new(name: &'static str, calls: &CallTracker) -> Self {
        Self {
            name,
            calls: calls.clone(),
            fail_init: false,
            fail_start: false,
        }
    }

    fn record(&self, phase: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(format!("{}.{phase}", self.name));
    }
}

#[async_trait::async_trait]
impl Module for TestModule {
    async fn init(&self, ctx: &ModuleCtx) -> anyhow::Result<()> {
        assert_eq!(ctx.current_module(), Some(self.name));
        self.record("init");
        if self.fail_init {
            anyhow::bail!("init failed for {}", self.name);
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl DbModule for TestModule {
    async fn migrate(&self, _db: &modkit_db::DbHandle) -> anyhow::Result<()> {
        self.record("migrate");
        Ok(())
    }
}

impl RestfulModule for TestModule {
    fn register_rest(
        &self,
        _ctx: &ModuleCtx,
        router: Router,
        openapi: &dyn OpenApiRegistry,
    ) -> anyhow::Result<Router> {
        self.record("rest");
        openapi.register_document(utoipa::openapi::OpenApi::default());
        Ok(router)
    }
}

#[async_trait::async_trait]
impl StatefulModule for TestModule {
    async fn start(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        self.record("start");
        if self.fail_start {
            anyhow::bail!("start failed for {}", self.name);
        }
        Ok(())
    }

    async fn stop(&self, _cancel: CancellationToken) -> anyhow::Result<()> {
        self.record("stop");
        Ok(())
    }
}

struct TestHost {
    calls: CallTracker,
    documents: Mutex<usize>,
}

impl OpenApiRegistry for TestHost {
    fn register_document(&self, _doc: utoipa::openapi::OpenApi) {
        *self.documents.lock().unwrap() += 1;
    }
}

#[async_trait::async_trait]
impl Module for TestHost {
    async fn init(&self, _ctx: &ModuleCtx) -> anyhow::Result<()> {
        self.calls.lock().unwrap().push("host.init".into());
        Ok(())
    }
}

impl RestHostModule for TestHost {
    fn rest_prepare(&self, _ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router> {
        self.calls.lock().unwrap().push("host.prepare".into());
        Ok(router)
    }

    fn rest_finalize(&self, _ctx: &ModuleCtx, router: Router) -> anyhow::Result<Router> {
        let docs = *self.documents.lock().unwrap();
        self.calls
            .lock()
            .unwrap()
            .push(format!("host.finalize({docs})"));
        Ok(router)
    }

    fn as_registry(&self) -> &dyn OpenApiRegistry {
        self
    }
}

fn register_full(b: &mut RegistryBuilder, name: &'static str, deps: &'static [&'static str], m: TestModule) {
    let m = Arc::new(m);
    b.register_core(name, deps, m.clone())
        .register_db(name, m.clone())
        .register_rest(name, m.clone())
        .register_stateful(name, m);
}

fn opts(registry: modkit::ModuleRegistry, db: DbOptions, token: CancellationToken) -> RunOptions {
    RunOptions {
        modules_cfg: Arc::new(EmptyConfig),
        db,
        registry,
        shutdown: ShutdownOptions::Token(token),
    }
}

#[tokio::test]
async fn phases_run_in_dependency_order_and_stop_in_reverse() {
    let calls: CallTracker = Arc::default();
    let mut b = RegistryBuilder::default();
    // Registered before its dependency on purpose.
    register_full(&mut b, "recipes", &["host"], TestModule::new("recipes", &calls));
    let host = Arc::new(TestHost {
        calls: calls.clone(),
        documents: Mutex::new(0),
    });
    b.register_core("host", &[], host.clone())
        .register_rest_host("host", host);
    let registry = b.build_topo_sorted().unwrap();

    let db = modkit_db::DbHandle::connect("sqlite::memory:", modkit_db::ConnectOpts::default())
        .await
        .unwrap();
    let token = CancellationToken::new();
    let handle = tokio::spawn(run(opts(registry, DbOptions::Handle(Arc::new(db)), token.clone())));

    tokio::time::sleep(Duration::from_millis(50)).await;
    token.cancel();
    timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec![
            "host.init",
            "recipes.init",
            "recipes.migrate",
            "host.prepare",
            "recipes.rest",
            "host.finalize(1)",
            "recipes.start",
            "recipes.stop",
        ]
    );
}

#[tokio::test]
async fn db_phase_is_skipped_without_database() {
    let calls: CallTracker = Arc::default();
    let mut b = RegistryBuilder::default();
    let m = Arc::new(TestModule::new("solo", &calls));
    b.register_core("solo", &[], m.clone()).register_db("solo", m);
    let token = CancellationToken::new();
    token.cancel();

    run(opts(b.build_topo_sorted().unwrap(), DbOptions::None, token))
        .await
        .unwrap();
    assert_eq!(*calls.lock().unwrap(), vec!["solo.init"]);
}

#[tokio::test]
async fn init_failure_aborts_the_run() {
    let calls: CallTracker = Arc::default();
    let mut failing = TestModule::new("broken", &calls);
    failing.fail_init = true;
    let mut b = RegistryBuilder::default();
    b.register_core("broken", &[], Arc::new(failing));

    let err = run(opts(
        b.build_topo_sorted().unwrap(),
        DbOptions::None,
        CancellationToken::new(),
    ))
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<RegistryError>(),
        Some(RegistryError::Init { module: "broken", .. })
    ));
}

#[tokio::test]
async fn start_failure_stops_already_started_modules() {
    let calls: CallTracker = Arc::default();
    let mut b = RegistryBuilder::default();
    let first = Arc::new(TestModule::new("first", &calls));
    b.register_core("first", &[], first.clone())
        .register_stateful("first", first);
    let mut second = TestModule::new("second", &calls);
    second.fail_start = true;
    let second = Arc::new(second);
    b.register_core("second", &["first"], second.clone())
        .register_stateful("second", second);

    let res = run(opts(
        b.build_topo_sorted().unwrap(),
        DbOptions::None,
        CancellationToken::new(),
    ))
    .await;
    assert!(res.is_err());
    let calls = calls.lock().unwrap();
    assert!(calls.contains(&"first.stop".to_string()));
}

#[test]
fn rest_without_host_is_rejected_at_run_time() {
    let calls: CallTracker = Arc::default();
    let mut b = RegistryBuilder::default();
    let m = Arc::new(TestModule::new("orphan", &calls));
    b.register_core("orphan", &[], m.clone()).register_rest("orphan", m);
    let registry = b.build_topo_sorted().unwrap();
    let ctx = modkit::ModuleCtxBuilder::new(CancellationToken::new()).build();
    assert!(matches!(
        registry.run_rest_phase(&ctx, Router::new()),
        Err(RegistryError::RestRequiresHost)
    ));
}

#[test]
fn unknown_dependency_and_cycles_are_reported() {
    let calls: CallTracker = Arc::default();

    let mut b = RegistryBuilder::default();
    b.register_core("a", &["ghost"], Arc::new(TestModule::new("a", &calls)));
    assert!(matches!(
        b.build_topo_sorted(),
        Err(RegistryError::UnknownDependency { .. })
    ));

    let mut b = RegistryBuilder::default();
    b.register_core("a", &["b"], Arc::new(TestModule::new("a", &calls)));
    b.register_core("b", &["a"], Arc::new(TestModule::new("b", &calls)));
    match b.build_topo_sorted() {
        Err(RegistryError::CycleDetected { modules }) => assert_eq!(modules, vec!["a", "b"]),
        other => panic!("expected cycle, got {other:?}"),
    }
}

#[test]
fn duplicate_names_and_second_host_are_configuration_errors() {
    let calls: CallTracker = Arc::default();
    let mut b = RegistryBuilder::default();
    b.register_core("a", &[], Arc::new(TestModule::new("a", &calls)));
    b.register_core("a", &[], Arc::new(TestModule::new("a", &calls)));
    let h1 = Arc::new(TestHost {
        calls: calls.clone(),
        documents: Mutex::new(0),
    });
    b.register_rest_host("a", h1.clone()).register_rest_host("a", h1);
    match b.build_topo_sorted() {
        Err(RegistryError::InvalidRegistryConfiguration { errors }) => assert_eq!(errors.len(), 2),
        other => panic!("expected configuration error, got {other:?}"),
    }
}

#[test]
fn capability_without_core_is_unknown_module() {
    let calls: CallTracker = Arc::default();
    let mut b = RegistryBuilder::default();
    b.register_stateful("nobody", Arc::new(TestModule::new("nobody", &calls)));
    assert!(matches!(
        b.build_topo_sorted(),
        Err(RegistryError::UnknownModule(name)) if name == "nobody"
    ));
}

#[tokio::test]
async fn completed_future_stops_stateful_modules() {
    let calls: CallTracker = Arc::default();
    let mut b = RegistryBuilder::default();
    let m = Arc::new(TestModule::new("worker", &calls));
    b.register_core("worker", &[], m.clone()).register_stateful("worker", m);
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let handle = tokio::spawn(run(RunOptions {
        modules_cfg: Arc::new(EmptyConfig),
        db: DbOptions::None,
        registry: b.build_topo_sorted().unwrap(),
        shutdown: ShutdownOptions::Future(Box::pin(async move {
            let _ = rx.await;
        })),
    }));
    tokio::time::sleep(Duration::from_millis(50)).await;
    tx.send(()).unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(
        *calls.lock().unwrap(),
        vec!["worker.init", "worker.start", "worker.stop"]
    );
}

#[test]
fn stop_signals_have_conventional_names() {
    assert_eq!(StopSignal::Interrupt.as_str(), "SIGINT");
    assert_eq!(StopSignal::Terminate.as_str(), "SIGTERM");
}

#[test]
fn independent_modules_keep_registration_order() {
    let calls: CallTracker = Arc::default();
    let mut b = RegistryBuilder::default();
    for name in ["c", "a", "b"] {
        b.register_core(name, &[], Arc::new(TestModule::new(name, &calls)));
    }
    b.register_core("d", &["b", "c"], Arc::new(TestModule::new("d", &calls)));
    let registry = b.build_topo_sorted().unwrap();
    assert_eq!(format!("{registry:?}"), r#"["c", "a", "b", "d"]"#);
}
