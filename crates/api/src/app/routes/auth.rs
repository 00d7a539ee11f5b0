use std::sync::Arc;

use axum::{
    Extension, Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;

use jobboard_auth::Role;
use jobboard_core::{DomainError, EmailAddress, UserId};
use jobboard_events::{AccountKind, LifecycleEvent};

use crate::app::dto::{self, RegisterRequest};
use crate::app::errors::ApiError;
use crate::app::models::User;
use crate::app::services::AppServices;

/// Create a job seeker or employer account and send the matching welcome e-mail.
///
/// Credentials and token issuance belong to the identity provider.
pub async fn register(
    Extension(services): Extension<Arc<AppServices>>,
    Json(body): Json<RegisterRequest>,
) -> Result<Response, ApiError> {
    let account = match body.role {
        Role::JobSeeker => AccountKind::JobSeeker,
        Role::Employer => AccountKind::Employer,
        other => {
            return Err(ApiError::BadRequest(format!(
                "cannot register an account with role '{other}'"
            )));
        }
    };

    let email = EmailAddress::parse(&body.email)?;
    let company_name = body
        .company_name
        .as_deref()
        .map(|name| dto::required_text("company_name", name))
        .transpose()?;
    if account == AccountKind::Employer && company_name.is_none() {
        return Err(DomainError::validation("company_name is required for employers").into());
    }

    let mut uow = services.store.transaction();
    if uow.tables().user_by_email(email.as_str()).is_some() {
        return Err(DomainError::conflict("an account with this email already exists").into());
    }
    if let Some(company) = &company_name {
        let taken = uow
            .tables()
            .users
            .iter()
            .any(|u| u.company_name.as_deref() == Some(company.as_str()));
        if taken {
            return Err(DomainError::conflict("company name is already registered").into());
        }
    }

    let user = User {
        id: UserId::new(),
        email: email.clone(),
        role: body.role,
        first_name: body.first_name,
        last_name: body.last_name,
        company_name,
        created_at: Utc::now(),
    };
    uow.tables_mut().users.insert(user.clone())?;
    uow.on_commit(LifecycleEvent::UserRegistered {
        user_id: user.id,
        email,
        account,
        first_name: user.first_name.clone(),
        company_name: user.company_name.clone(),
        occurred_at: user.created_at,
    });
    services.commit(uow);

    Ok((
        StatusCode::CREATED,
        Json(serde_json::json!({
            "message": "Account created successfully. A welcome email has been sent.",
            "user": user,
        })),
    )
        .into_response())
}
