//! Operator endpoints: the effective policy matrix and the notification queue.

use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;

use jobboard_core::DomainError;
use jobboard_notifications::{DeliveryId, QueueError, StateKind};

use crate::app::errors::ApiError;
use crate::app::services::AppServices;
use crate::authz::require_admin;
use crate::context::ActorContext;

const DEFAULT_LIMIT: usize = 50;
const MAX_LIMIT: usize = 500;

pub fn router() -> Router {
    Router::new()
        .route("/policy", get(policy_matrix))
        .route("/notifications", get(list_notifications))
        .route("/notifications/:id", get(get_notification))
        .route("/outbox", get(outbox))
}

pub async fn policy_matrix(Extension(ctx): Extension<ActorContext>) -> Result<Response, ApiError> {
    require_admin(&ctx)?;
    let rows = jobboard_auth::policy::global().matrix()?;
    Ok(Json(serde_json::json!({ "rows": rows })).into_response())
}

#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilter {
    pub state: Option<StateKind>,
    pub limit: Option<usize>,
}

/// Queue statistics plus the matching deliveries, oldest first.
pub async fn list_notifications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(filter): Query<NotificationFilter>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;

    let limit = filter.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let stats = services.notifications.stats()?;
    let items = services
        .notifications
        .queue()
        .list_by_state(filter.state, limit)?;
    Ok(Json(serde_json::json!({ "stats": stats, "items": items })).into_response())
}

pub async fn get_notification(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<DeliveryId>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;

    let delivery = services
        .notifications
        .queue()
        .get(id)?
        .ok_or(QueueError::NotFound(id))?;
    Ok(Json(delivery).into_response())
}

/// Mail captured by the in-memory transport.
pub async fn outbox(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Result<Response, ApiError> {
    require_admin(&ctx)?;

    let outbox = services.outbox.as_ref().ok_or(DomainError::NotFound)?;
    Ok(Json(serde_json::json!({ "items": outbox.sent() })).into_response())
}
