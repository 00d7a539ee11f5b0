use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::{Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use serde::Deserialize;

use jobboard_auth::{Action, ResourceDescriptor};
use jobboard_core::{CategoryId, DomainError, IndustryId};

use crate::app::dto::{self, CreateCategoryRequest, UpdateCategoryRequest};
use crate::app::errors::ApiError;
use crate::app::models::Category;
use crate::app::services::AppServices;
use crate::app::store::Tables;
use crate::authz::authorize;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_categories).post(create_category))
        .route(
            "/:id",
            get(get_category).patch(update_category).delete(delete_category),
        )
        .route("/:id/jobs", get(list_category_jobs))
}

#[derive(Debug, Default, Deserialize)]
pub struct CategoryFilter {
    pub industry_id: Option<IndustryId>,
}

pub async fn list_categories(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Query(filter): Query<CategoryFilter>,
) -> Result<Response, ApiError> {
    authorize(&ctx, &ResourceDescriptor::category(Action::Read))?;

    let mut items = services.store.read(|t| {
        t.categories
            .iter()
            .filter(|c| filter.industry_id.is_none_or(|id| c.industry_id == Some(id)))
            .cloned()
            .collect::<Vec<_>>()
    });
    items.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}

pub async fn get_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: CategoryId = dto::parse_id(&id)?;
    authorize(&ctx, &ResourceDescriptor::category(Action::Read))?;

    let category = services.store.read(|t| t.categories.require(&id).cloned())?;
    Ok(Json(category).into_response())
}

/// Jobs filed under one category, newest first.
pub async fn list_category_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: CategoryId = dto::parse_id(&id)?;
    authorize(&ctx, &ResourceDescriptor::category(Action::Read))?;
    authorize(&ctx, &ResourceDescriptor::job(Action::Read, None))?;

    let mut items = services.store.read(|t| {
        t.categories.require(&id)?;
        Ok::<_, DomainError>(
            t.jobs
                .iter()
                .filter(|j| j.category_id == Some(id))
                .cloned()
                .collect::<Vec<_>>(),
        )
    })?;
    items.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
    Ok(Json(serde_json::json!({
        "category_id": id,
        "count": items.len(),
        "items": items,
    }))
    .into_response())
}

pub async fn create_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<CreateCategoryRequest>,
) -> Result<Response, ApiError> {
    authorize(&ctx, &ResourceDescriptor::category(Action::Create))?;
    let created_by = ctx
        .user_id()
        .ok_or_else(|| ApiError::Forbidden("an account is required".to_string()))?;
    let name = dto::required_text("name", &body.name)?;

    let mut uow = services.store.transaction();
    ensure_industry_exists(uow.tables(), body.industry_id)?;
    ensure_unique_name(uow.tables(), &name, None)?;

    let category = Category {
        id: CategoryId::new(),
        name,
        description: body.description,
        industry_id: body.industry_id,
        created_by,
        created_at: Utc::now(),
    };
    uow.tables_mut().categories.insert(category.clone())?;
    services.commit(uow);

    Ok((StatusCode::CREATED, Json(category)).into_response())
}

pub async fn update_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCategoryRequest>,
) -> Result<Response, ApiError> {
    let id: CategoryId = dto::parse_id(&id)?;
    authorize(&ctx, &ResourceDescriptor::category(Action::Update))?;

    let mut uow = services.store.transaction();
    uow.tables().categories.require(&id)?;
    let name = body
        .name
        .as_deref()
        .map(|name| dto::required_text("name", name))
        .transpose()?;
    if let Some(name) = &name {
        ensure_unique_name(uow.tables(), name, Some(id))?;
    }
    ensure_industry_exists(uow.tables(), body.industry_id)?;

    let category = uow.tables_mut().categories.require_mut(&id)?;
    if let Some(name) = name {
        category.name = name;
    }
    if let Some(description) = body.description {
        category.description = Some(description);
    }
    if let Some(industry_id) = body.industry_id {
        category.industry_id = Some(industry_id);
    }
    let category = category.clone();
    services.commit(uow);

    Ok(Json(category).into_response())
}

pub async fn delete_category(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: CategoryId = dto::parse_id(&id)?;
    authorize(&ctx, &ResourceDescriptor::category(Action::Delete))?;

    let mut uow = services.store.transaction();
    let tables = uow.tables_mut();
    tables.categories.remove(&id)?;
    for job in tables.jobs.iter().map(|j| j.id).collect::<Vec<_>>() {
        let job = tables.jobs.require_mut(&job)?;
        if job.category_id == Some(id) {
            job.category_id = None;
        }
    }
    services.commit(uow);

    Ok(StatusCode::NO_CONTENT.into_response())
}

fn ensure_industry_exists(tables: &Tables, industry_id: Option<IndustryId>) -> Result<(), ApiError> {
    match industry_id {
        Some(id) if tables.industries.get(&id).is_none() => {
            Err(DomainError::validation(format!("industry {id} does not exist")).into())
        }
        _ => Ok(()),
    }
}

fn ensure_unique_name(tables: &Tables, name: &str, except: Option<CategoryId>) -> Result<(), ApiError> {
    let taken = tables
        .categories
        .iter()
        .filter(|c| Some(c.id) != except)
        .any(|c| c.name.eq_ignore_ascii_case(name));
    if taken {
        return Err(DomainError::conflict(format!("category '{name}' already exists")).into());
    }
    Ok(())
}
