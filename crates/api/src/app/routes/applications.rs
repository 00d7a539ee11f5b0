use std::sync::Arc;

use axum::{
    Extension, Json, Router,
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch},
};
use chrono::Utc;
use tracing::warn;

use jobboard_auth::{Action, ApplicationScope, ResourceDescriptor};
use jobboard_core::{ApplicationId, ApplicationStatus, DomainError, EmailAddress, UserId};
use jobboard_events::LifecycleEvent;

use crate::app::dto::{self, CreateApplicationRequest, UpdateApplicationRequest, UpdateStatusRequest};
use crate::app::errors::ApiError;
use crate::app::models::{Application, Job};
use crate::app::services::AppServices;
use crate::app::store::Tables;
use crate::authz::authorize;
use crate::context::ActorContext;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_applications).post(create_application))
        .route(
            "/:id",
            get(get_application)
                .patch(update_application)
                .delete(delete_application),
        )
        .route("/:id/status", patch(update_application_status))
}

/// Applications visible to the caller: all for admins, those to their own
/// jobs for employers, their own for job seekers.
pub async fn list_applications(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
) -> Result<Response, ApiError> {
    authorize(
        &ctx,
        &ResourceDescriptor::application(Action::Read, ctx.user_id(), None),
    )?;
    let scope = ApplicationScope::for_actor(ctx.actor());

    let mut items = services.store.read(|t| {
        t.applications
            .iter()
            .filter(|a| {
                t.jobs
                    .get(&a.job_id)
                    .is_some_and(|job| scope.includes(a.applicant_id, job.posted_by))
            })
            .cloned()
            .collect::<Vec<_>>()
    });
    items.sort_by(|a, b| b.applied_at.cmp(&a.applied_at));
    Ok(Json(serde_json::json!({ "items": items })).into_response())
}

pub async fn get_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: ApplicationId = dto::parse_id(&id)?;
    let (application, job) = services.store.read(|t| with_job(t, &id))?;
    authorize(
        &ctx,
        &ResourceDescriptor::application(Action::Read, Some(application.applicant_id), Some(job.posted_by)),
    )?;

    // Outside the caller's scope reads as absent.
    let scope = ApplicationScope::for_actor(ctx.actor());
    if !scope.includes(application.applicant_id, job.posted_by) {
        return Err(DomainError::NotFound.into());
    }
    Ok(Json(application).into_response())
}

/// File an application to a job as the calling job seeker.
pub async fn create_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Json(body): Json<CreateApplicationRequest>,
) -> Result<Response, ApiError> {
    // The applicant owns the new application; the job is looked up only
    // once the caller may apply at all.
    authorize(
        &ctx,
        &ResourceDescriptor::application(Action::Create, ctx.user_id(), None),
    )?;
    let applicant_id = ctx
        .user_id()
        .ok_or_else(|| ApiError::Forbidden("an account is required".to_string()))?;

    let mut uow = services.store.transaction();
    let job = uow
        .tables()
        .jobs
        .get(&body.job_id)
        .cloned()
        .ok_or_else(|| DomainError::validation(format!("job {} does not exist", body.job_id)))?;
    if !job.is_active {
        return Err(DomainError::invariant("job is no longer accepting applications").into());
    }

    let duplicate = uow
        .tables()
        .applications
        .iter()
        .any(|a| a.job_id == job.id && a.applicant_id == applicant_id);
    if duplicate {
        return Err(DomainError::conflict("you have already applied to this job").into());
    }

    let application = Application {
        id: ApplicationId::new(),
        job_id: job.id,
        applicant_id,
        cover_letter: body.cover_letter,
        resume_link: body.resume_link,
        status: ApplicationStatus::Submitted,
        applied_at: Utc::now(),
    };
    uow.tables_mut().applications.insert(application.clone())?;

    match applicant_contact(uow.tables(), applicant_id, ctx.email()) {
        Some((applicant_email, applicant_first_name)) => {
            uow.on_commit(LifecycleEvent::ApplicationSubmitted {
                application_id: application.id,
                job_title: job.title.clone(),
                company: job.company.clone(),
                applicant_email,
                applicant_first_name,
                occurred_at: application.applied_at,
            })
        }
        None => warn!(application_id = %application.id, "no e-mail on file for applicant; skipping submission notice"),
    }
    services.commit(uow);

    Ok((StatusCode::CREATED, Json(application)).into_response())
}

pub async fn update_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateApplicationRequest>,
) -> Result<Response, ApiError> {
    let id: ApplicationId = dto::parse_id(&id)?;

    let mut uow = services.store.transaction();
    let (application, job) = with_job(uow.tables(), &id)?;
    authorize(
        &ctx,
        &ResourceDescriptor::application(Action::Update, Some(application.applicant_id), Some(job.posted_by)),
    )?;

    let application = uow.tables_mut().applications.require_mut(&id)?;
    if body.cover_letter.is_some() {
        application.cover_letter = body.cover_letter;
    }
    if body.resume_link.is_some() {
        application.resume_link = body.resume_link;
    }
    let application = application.clone();
    services.commit(uow);

    Ok(Json(application).into_response())
}

/// Move an application through review; only the employer who posted the job
/// (or an admin) may do this. The applicant is told when the status changes.
pub async fn update_application_status(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Response, ApiError> {
    let id: ApplicationId = dto::parse_id(&id)?;

    let mut uow = services.store.transaction();
    let (application, job) = with_job(uow.tables(), &id)?;
    authorize(
        &ctx,
        &ResourceDescriptor::application(
            Action::UpdateStatusOnly,
            Some(application.applicant_id),
            Some(job.posted_by),
        ),
    )?;

    let previous = application.status;
    let current = body.status;
    if previous != current {
        let contact = applicant_contact(uow.tables(), application.applicant_id, None);
        uow.tables_mut().applications.require_mut(&id)?.status = current;
        match contact {
            Some((applicant_email, applicant_first_name)) => {
                uow.on_commit(LifecycleEvent::ApplicationStatusChanged {
                    application_id: id,
                    job_title: job.title.clone(),
                    company: job.company.clone(),
                    applicant_email,
                    applicant_first_name,
                    previous,
                    current,
                    occurred_at: Utc::now(),
                })
            }
            None => warn!(application_id = %id, "no e-mail on file for applicant; skipping status notice"),
        }
    }
    let application = uow.tables().applications.require(&id)?.clone();
    services.commit(uow);

    Ok(Json(application).into_response())
}

pub async fn delete_application(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<ActorContext>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id: ApplicationId = dto::parse_id(&id)?;

    let mut uow = services.store.transaction();
    let (application, job) = with_job(uow.tables(), &id)?;
    authorize(
        &ctx,
        &ResourceDescriptor::application(Action::Delete, Some(application.applicant_id), Some(job.posted_by)),
    )?;
    uow.tables_mut().applications.remove(&id)?;
    services.commit(uow);

    Ok(StatusCode::NO_CONTENT.into_response())
}

fn with_job(tables: &Tables, id: &ApplicationId) -> Result<(Application, Job), DomainError> {
    let application = tables.applications.require(id)?.clone();
    let job = tables.jobs.require(&application.job_id)?.clone();
    Ok((application, job))
}

/// Recipient for applicant-facing notices: the stored account, else the
/// e-mail carried by the applicant's own token.
fn applicant_contact(
    tables: &Tables,
    applicant_id: UserId,
    token_email: Option<&str>,
) -> Option<(EmailAddress, Option<String>)> {
    match tables.users.get(&applicant_id) {
        Some(user) => Some((user.email.clone(), user.first_name.clone())),
        None => token_email
            .and_then(|e| EmailAddress::parse(e).ok())
            .map(|email| (email, None)),
    }
}
