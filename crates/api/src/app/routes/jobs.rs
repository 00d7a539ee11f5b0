use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use chrono::Utc;
use tracing::warn;

use jobboard_auth::{Action, ApplicationScope, ResourceDescriptor};
use jobboard_core::{CategoryId, DomainError, EmailAddress, IndustryId, JobId};
use jobboard_events::LifecycleEvent;

use crate::app::dto::{self, CreateJobRequest, UpdateJobRequest};
use crate::app::errors::ApiError;
use crate::app::models::Job;
use crate::app::services::AppServices;
use crate::app::store::Tables;
use crate::authz::authorize;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_jobs).post(create_job))
        .route("/:id", get(get_job).patch(update_job).delete(delete_job))
        .route("/:id/applicants", get(list_applicants))
}

pub async fn list_jobs(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Result<Response, ApiError> {
    authorize(&ctx, &ResourceDescriptor::job(Action::Read, None))?;

    let mut items = services.store.read(|t| t.jobs.iter().cloned().collect::<Vec<_>>());
    items.sort_by(|a, b| b.posted_at.cmp(&a.posted_at));
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}

pub async fn get_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: JobId = dto::parse_id(&id)?;
    let job = services.store.read(|t| t.jobs.require(&id).cloned())?;
    authorize(&ctx, &ResourceDescriptor::job(Action::Read, Some(job.posted_by)))?;

    Ok(Json(job).into_response())
}

/// Applications filed to one job, for the employer who posted it or an admin.
pub async fn list_applicants(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: JobId = dto::parse_id(&id)?;
    let job = services.store.read(|t| t.jobs.require(&id).cloned())?;
    authorize(
        &ctx,
        &ResourceDescriptor::application(Action::Read, ctx.user_id(), Some(job.posted_by)),
    )?;
    match ApplicationScope::for_actor(ctx.actor()) {
        ApplicationScope::All => {}
        ApplicationScope::PostedBy(employer) if employer == job.posted_by => {}
        _ => {
            return Err(ApiError::Forbidden(
                "only the employer who posted this job can see its applicants".to_string(),
            ));
        }
    }

    let mut items = services.store.read(|t| {
        t.applications
            .iter()
            .filter(|a| a.job_id == job.id)
            .cloned()
            .collect::<Vec<_>>()
    });
    items.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
    Ok(Json(serde_json::json!({
        "job_id": job.id,
        "count": items.len(),
        "items": items,
    }))
    .into_response())
}

/// Post a job as the calling employer and notify them that it is live.
pub async fn create_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<CreateJobRequest>,
) -> Result<Response, ApiError> {
    authorize(&ctx, &ResourceDescriptor::job(Action::Create, ctx.user_id()))?;
    let posted_by = ctx
        .user_id()
        .ok_or_else(|| ApiError::Forbidden("an account is required".to_string()))?;
    let title = dto::required_text("title", &body.title)?;
    let location = dto::required_text("location", &body.location)?;

    let mut uow = services.store.transaction();
    ensure_links(uow.tables(), body.industry_id, body.category_id)?;

    let poster = uow.tables().users.get(&posted_by).cloned();
    let company = match (body.company.as_deref(), poster.as_ref().and_then(|u| u.company_name.clone())) {
        (Some(company), _) => dto::required_text("company", company)?,
        (None, Some(company)) => company,
        (None, None) => return Err(DomainError::validation("company is required").into()),
    };

    let job = Job {
        id: JobId::new(),
        title,
        company,
        location,
        wage: body.wage,
        description: body.description,
        industry_id: body.industry_id,
        category_id: body.category_id,
        posted_by,
        posted_at: Utc::now(),
        is_active: true,
    };
    uow.tables_mut().jobs.insert(job.clone())?;

    let employer_email = poster
        .map(|u| u.email)
        .or_else(|| ctx.email().and_then(|e| EmailAddress::parse(e).ok()));
    match employer_email {
        Some(employer_email) => uow.on_commit(LifecycleEvent::JobPosted {
            job_id: job.id,
            title: job.title.clone(),
            company: job.company.clone(),
            posted_by,
            employer_email,
            occurred_at: job.posted_at,
        }),
        None => warn!(job_id = %job.id, posted_by = %posted_by, "no e-mail on file for employer; skipping job posted notice"),
    }
    services.commit(uow);

    Ok((StatusCode::CREATED, Json(job)).into_response())
}

pub async fn update_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateJobRequest>,
) -> Result<Response, ApiError> {
    let id: JobId = dto::parse_id(&id)?;

    let mut uow = services.store.transaction();
    let posted_by = uow.tables().jobs.require(&id)?.posted_by;
    authorize(&ctx, &ResourceDescriptor::job(Action::Update, Some(posted_by)))?;
    ensure_links(uow.tables(), body.industry_id, body.category_id)?;

    let job = uow.tables_mut().jobs.require_mut(&id)?;
    if let Some(title) = body.title {
        job.title = dto::required_text("title", &title)?;
    }
    if let Some(company) = body.company {
        job.company = dto::required_text("company", &company)?;
    }
    if let Some(location) = body.location {
        job.location = dto::required_text("location", &location)?;
    }
    if body.wage.is_some() {
        job.wage = body.wage;
    }
    if let Some(description) = body.description {
        job.description = description;
    }
    if body.industry_id.is_some() {
        job.industry_id = body.industry_id;
    }
    if body.category_id.is_some() {
        job.category_id = body.category_id;
    }
    if let Some(is_active) = body.is_active {
        job.is_active = is_active;
    }
    let job = job.clone();
    services.commit(uow);

    Ok(Json(job).into_response())
}

/// Remove a job together with the applications filed against it.
pub async fn delete_job(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: JobId = dto::parse_id(&id)?;

    let mut uow = services.store.transaction();
    let posted_by = uow.tables().jobs.require(&id)?.posted_by;
    authorize(&ctx, &ResourceDescriptor::job(Action::Delete, Some(posted_by)))?;

    let tables = uow.tables_mut();
    tables.jobs.remove(&id)?;
    let orphaned: Vec<_> = tables
        .applications
        .iter()
        .filter(|a| a.job_id == id)
        .map(|a| a.id)
        .collect();
    for application in orphaned {
        tables.applications.remove(&application)?;
    }
    services.commit(uow);

    Ok(StatusCode::NO_CONTENT.into_response())
}

fn ensure_links(
    tables: &Tables,
    industry_id: Option<IndustryId>,
    category_id: Option<CategoryId>,
) -> Result<(), ApiError> {
    if let Some(id) = industry_id {
        if tables.industries.get(&id).is_none() {
            return Err(DomainError::validation(format!("industry {id} does not exist")).into());
        }
    }
    if let Some(id) = category_id {
        if tables.categories.get(&id).is_none() {
            return Err(DomainError::validation(format!("category {id} does not exist")).into());
        }
    }
    Ok(())
}
