//! HTTP-facing building blocks shared by REST modules.

pub mod page;
pub mod problem;
