//! HTTP API: configuration, routing, authentication and access checks.

pub mod app;
pub mod authz;
pub mod config;
pub mod context;
pub mod middleware;

pub use app::{App, build_app};
pub use config::AppConfig;
