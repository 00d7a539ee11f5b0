use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;
use tracing::debug;

use jobboard_auth::JwtValidator;

use crate::app::errors::json_error;
use crate::context::ActorContext;

#[derive(Clone)]
pub struct AuthState {
    pub jwt: Arc<dyn JwtValidator>,
}

/// Resolve the request's actor.
///
/// No `Authorization` header means the anonymous actor; a header that is not
/// a valid bearer token is rejected with 401.
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    let context = match extract_bearer(req.headers()) {
        Ok(None) => ActorContext::anonymous(),
        Ok(Some(token)) => match state.jwt.validate(token, Utc::now()) {
            Ok(claims) => ActorContext::new(claims.actor(), claims.email.clone()),
            Err(e) => {
                debug!(error = %e, "rejected bearer token");
                return json_error(StatusCode::UNAUTHORIZED, "unauthorized", e.to_string());
            }
        },
        Err(message) => return json_error(StatusCode::UNAUTHORIZED, "unauthorized", message),
    };

    req.extensions_mut().insert(context);
    next.run(req).await
}

fn extract_bearer(headers: &HeaderMap) -> Result<Option<&str>, &'static str> {
    let Some(header) = headers.get(axum::http::header::AUTHORIZATION) else {
        return Ok(None);
    };

    let header = header
        .to_str()
        .map_err(|_| "authorization header is not valid text")?;

    let token = header
        .strip_prefix("Bearer ")
        .ok_or("expected a bearer token")?
        .trim();

    if token.is_empty() {
        return Err("empty bearer token");
    }

    Ok(Some(token))
}
