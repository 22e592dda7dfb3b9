//! Drives registered modules through init, db, rest, start, wait and stop
//! with a single shared `ModuleCtx`.

use crate::context::{ConfigProvider, ModuleCtxBuilder};
use crate::registry::ModuleRegistry;
use std::{future::Future, pin::Pin, sync::Arc};
use tokio_util::sync::CancellationToken;

/// How the runtime should provide a database to modules.
pub enum DbOptions {
    /// `ModuleCtx::db()` is `None`; the migration phase is skipped.
    None,
    /// A connected handle shared by every module.
    Handle(Arc<modkit_db::DbHandle>),
}

/// How the runtime should decide when to stop.
pub enum ShutdownOptions {
    /// Stop on SIGINT or SIGTERM (Ctrl+C elsewhere).
    Signals,
    /// Stop when the token is cancelled.
    Token(CancellationToken),
    /// Stop when the future completes.
    Future(Pin<Box<dyn Future<Output = ()> + Send>>),
}

pub struct RunOptions {
    /// Provider of module config sections (raw JSON by module name).
    pub modules_cfg: Arc<dyn ConfigProvider>,
    pub db: DbOptions,
    /// Modules already resolved into dependency order.
    pub registry: ModuleRegistry,
    pub shutdown: ShutdownOptions,
}

/// Full cycle: init → db → rest (sync) → start → wait → stop.
pub async fn run(opts: RunOptions) -> anyhow::Result<()> {
    let cancel = match &opts.shutdown {
        ShutdownOptions::Token(t) => t.clone(),
        _ => CancellationToken::new(),
    };

    match opts.shutdown {
        ShutdownOptions::Signals => {
            let c = cancel.clone();
            tokio::spawn(async move {
                match wait_for_stop_signal().await {
                    Ok(sig) => tracing::info!(signal = sig.as_str(), "stop signal received"),
                    Err(e) => {
                        tracing::warn!(error = %e, "signal handlers unavailable, waiting for ctrl_c");
                        let _ = tokio::signal::ctrl_c().await;
                    }
                }
                c.cancel();
            });
        }
        ShutdownOptions::Future(waiter) => {
            let c = cancel.clone();
            tokio::spawn(async move {
                waiter.await;
                tracing::info!("stop requested by caller");
                c.cancel();
            });
        }
        ShutdownOptions::Token(_) => {
            tracing::debug!("lifecycle bound to caller token");
        }
    }

    let registry = opts.registry;

    let mut ctx_builder =
        ModuleCtxBuilder::new(cancel.clone()).with_config_provider(opts.modules_cfg.clone());
    if let DbOptions::Handle(ref db) = opts.db {
        ctx_builder = ctx_builder.with_db(db.clone());
    }
    let base_ctx = ctx_builder.build();

    tracing::info!("Phase: init");
    registry.run_init_phase(&base_ctx).await?;

    match &opts.db {
        DbOptions::Handle(db) => {
            tracing::info!(engine = ?db.engine(), "Phase: db");
            registry.run_db_phase(db).await?;
        }
        DbOptions::None => tracing::debug!("Phase: db skipped (no database)"),
    }

    // The host keeps the finalized router for serving in its start phase.
    tracing::info!("Phase: rest (sync)");
    let _ = registry.run_rest_phase(&base_ctx, axum::Router::new())?;

    tracing::info!("Phase: start");
    if let Err(e) = registry.run_start_phase(cancel.clone()).await {
        cancel.cancel();
        registry.run_stop_phase(cancel).await;
        return Err(e.into());
    }

    cancel.cancelled().await;

    tracing::info!("Phase: stop");
    registry.run_stop_phase(cancel).await;
    Ok(())
}

/// Signal that ended a [`ShutdownOptions::Signals`] run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopSignal {
    Interrupt,
    Terminate,
}

impl StopSignal {
    pub fn as_str(self) -> &'static str {
        match self {
            StopSignal::Interrupt => "SIGINT",
            StopSignal::Terminate => "SIGTERM",
        }
    }
}

#[cfg(unix)]
async fn wait_for_stop_signal() -> std::io::Result<StopSignal> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut term = signal(SignalKind::terminate())?;
    let mut int = signal(SignalKind::interrupt())?;
    Ok(tokio::select! {
        _ = term.recv() => StopSignal::Terminate,
        _ = int.recv() => StopSignal::Interrupt,
    })
}

#[cfg(not(unix))]
async fn wait_for_stop_signal() -> std::io::Result<StopSignal> {
    tokio::signal::ctrl_c().await?;
    Ok(StopSignal::Interrupt)
}
