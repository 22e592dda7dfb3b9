//! # ModKit - module system
//!
//! Modules implement a subset of the capability traits in [`contracts`] and are
//! registered into a [`RegistryBuilder`]. The runner drives them through ordered
//! phases: init → DB migrations → REST wiring → start → wait → stop.
//!
//! ```rust,ignore
//! let mut builder = modkit::RegistryBuilder::default();
//! api_ingress::register(&mut builder);
//! foodgram::register(&mut builder);
//! let registry = builder.build_topo_sorted()?;
//! ```

pub use anyhow::Result;
pub use async_trait::async_trait;

pub mod api;
pub mod context;
pub mod contracts;
pub mod registry;
pub mod runtime;

pub use api::page::{Page, PageRequest};
pub use api::problem::{
    bad_request, internal_error, unauthorized, Problem, ProblemResponse, ValidationError,
};
pub use context::{ConfigProvider, ModuleCtx, ModuleCtxBuilder};
pub use contracts::*;
pub use registry::{ModuleRegistry, RegistryBuilder, RegistryError};
pub use runtime::{run, DbOptions, RunOptions, ShutdownOptions, StopSignal};
