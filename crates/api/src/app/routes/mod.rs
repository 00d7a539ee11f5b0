use axum::{
    Router,
    routing::{get, post},
};

pub mod admin;
pub mod applications;
pub mod auth;
pub mod categories;
pub mod industries;
pub mod jobs;
pub mod system;

/// Router for every endpoint behind the auth middleware.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/auth/register", post(auth::register))
        .nest("/industries", industries::router())
        .nest("/categories", categories::router())
        .nest("/jobs", jobs::router())
        .nest("/applications", applications::router())
        .nest("/admin", admin::router())
}
