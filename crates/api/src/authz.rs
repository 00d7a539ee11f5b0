//! Access checks at the HTTP boundary.
//!
//! Every mutation asks the decision engine first; a denial becomes 403 and a
//! policy error becomes 500.

use tracing::info;

use jobboard_auth::{Decision, ResourceDescriptor, Role};

use crate::app::errors::ApiError;
use crate::context::ActorContext;

/// Check that the request's actor may perform `resource.action` on `resource`.
pub fn authorize(ctx: &ActorContext, resource: &ResourceDescriptor) -> Result<(), ApiError> {
    match jobboard_auth::decide(ctx.actor(), resource)? {
        Decision::Allow => Ok(()),
        Decision::Deny => {
            let reason = jobboard_auth::explain(ctx.actor(), resource)
                .map(|e| e.reason)
                .unwrap_or_else(|_| "access denied".to_string());
            info!(
                role = %ctx.role(),
                actor_id = ?ctx.user_id(),
                resource_type = %resource.resource_type,
                action = %resource.action,
                reason = %reason,
                "access denied"
            );
            Err(ApiError::Forbidden(reason))
        }
    }
}

/// Admin-only endpoints outside the resource model.
pub fn require_admin(ctx: &ActorContext) -> Result<(), ApiError> {
    if ctx.role() == Role::Admin && !ctx.actor().is_anonymous() {
        Ok(())
    } else {
        Err(ApiError::Forbidden("admin only".to_string()))
    }
}
