//! HTTP application wiring (axum router + services + delivery workers).
//!
//! - `services.rs`: store, notification dispatcher and worker construction
//! - `routes/`: HTTP handlers (one file per resource)
//! - `store.rs`: in-memory tables and units of work
//! - `dto.rs`: request bodies and parsing helpers
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{Extension, Router, routing::get};
use tower::ServiceBuilder;

use jobboard_auth::Hs256JwtValidator;
use jobboard_notifications::WorkerPool;

use crate::config::AppConfig;
use crate::middleware;

pub mod dto;
pub mod errors;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

pub use services::{AppServices, BootstrapError};

/// A running application: the router plus the delivery workers behind it.
pub struct App {
    pub router: Router,
    pub services: Arc<AppServices>,
    pub workers: WorkerPool,
}

/// Build the router and start the delivery workers.
///
/// Must be called from within a tokio runtime.
pub fn build_app(config: &AppConfig) -> Result<App, BootstrapError> {
    let jwt = Arc::new(Hs256JwtValidator::new(config.jwt_secret.as_bytes()));
    let auth_state = middleware::AuthState { jwt };

    let (services, worker) = services::build_services(config)?;
    let services = Arc::new(services);
    let workers = WorkerPool::spawn(&worker, config.workers);

    let protected = routes::router().layer(
        ServiceBuilder::new()
            .layer(axum::middleware::from_fn_with_state(
                auth_state,
                middleware::auth_middleware,
            ))
            .layer(Extension(services.clone())),
    );

    let router = Router::new()
        .route("/health", get(routes::system::health))
        .merge(protected);

    Ok(App {
        router,
        services,
        workers,
    })
}
