pub mod auth;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod image;
pub mod payload;
pub mod routes;
