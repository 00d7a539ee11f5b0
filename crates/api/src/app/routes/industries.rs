use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;

use jobboard_auth::{Action, ResourceDescriptor};
use jobboard_core::{DomainError, IndustryId};

use crate::app::dto::{self, CreateIndustryRequest, UpdateIndustryRequest};
use crate::app::errors::ApiError;
use crate::app::models::Industry;
use crate::app::services::AppServices;
use crate::authz::authorize;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_industries).post(create_industry))
        .route(
            "/:id",
            get(get_industry).patch(update_industry).delete(delete_industry),
        )
}

pub async fn list_industries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Result<Response, ApiError> {
    authorize(&ctx, &ResourceDescriptor::industry(Action::Read))?;

    let mut items = services.store.read(|t| t.industries.iter().cloned().collect::<Vec<_>>());
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}

pub async fn get_industry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: IndustryId = dto::parse_id(&id)?;
    authorize(&ctx, &ResourceDescriptor::industry(Action::Read))?;

    let industry = services.store.read(|t| t.industries.require(&id).cloned())?;
    Ok(Json(industry).into_response())
}

pub async fn create_industry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<CreateIndustryRequest>,
) -> Result<Response, ApiError> {
    authorize(&ctx, &ResourceDescriptor::industry(Action::Create))?;
    let created_by = ctx
        .user_id()
        .ok_or_else(|| ApiError::Forbidden("an account is required".to_string()))?;
    let name = dto::required_text("name", &body.name)?;

    let mut uow = services.store.transaction();
    ensure_unique_name(uow.tables().industries.iter(), &name, None)?;

    let industry = Industry {
        id: IndustryId::new(),
        name,
        description: body.description,
        created_by,
        created_at: Utc::now(),
    };
    uow.tables_mut().industries.insert(industry.clone())?;
    services.commit(uow);

    Ok((StatusCode::CREATED, Json(industry)).into_response())
}

pub async fn update_industry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateIndustryRequest>,
) -> Result<Response, ApiError> {
    let id: IndustryId = dto::parse_id(&id)?;
    authorize(&ctx, &ResourceDescriptor::industry(Action::Update))?;

    let mut uow = services.store.transaction();
    uow.tables().industries.require(&id)?;
    if let Some(name) = &body.name {
        let name = dto::required_text("name", name)?;
        ensure_unique_name(uow.tables().industries.iter(), &name, Some(id))?;
    }

    let industry = uow.tables_mut().industries.require_mut(&id)?;
    if let Some(name) = body.name {
        industry.name = name.trim().to_string();
    }
    if let Some(description) = body.description {
        industry.description = Some(description);
    }
    let industry = industry.clone();
    services.commit(uow);

    Ok(Json(industry).into_response())
}

pub async fn delete_industry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: IndustryId = dto::parse_id(&id)?;
    authorize(&ctx, &ResourceDescriptor::industry(Action::Delete))?;

    let mut uow = services.store.transaction();
    let tables = uow.tables_mut();
    tables.industries.remove(&id)?;
    // Dependents keep existing without the link.
    for category in tables.categories.iter().map(|c| c.id).collect::<Vec<_>>() {
        let category = tables.categories.require_mut(&category)?;
        if category.industry_id == Some(id) {
            category.industry_id = None;
        }
    }
    for job in tables.jobs.iter().map(|j| j.id).collect::<Vec<_>>() {
        let job = tables.jobs.require_mut(&job)?;
        if job.industry_id == Some(id) {
            job.industry_id = None;
        }
    }
    services.commit(uow);

    Ok(StatusCode::NO_CONTENT.into_response())
}

fn ensure_unique_name<'a>(
    existing: impl Iterator<Item = &'a Industry>,
    name: &str,
    except: Option<IndustryId>,
) -> Result<(), ApiError> {
    let taken = existing
        .filter(|i| Some(i.id) != except)
        .any(|i| i.name.eq_ignore_ascii_case(name));
    if taken {
        return Err(DomainError::conflict(format!("industry '{name}' already exists")).into());
    }
    Ok(())
}
