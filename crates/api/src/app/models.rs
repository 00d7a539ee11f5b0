//! Records kept by the in-memory store.

use chrono::{DateTime, Utc};
use serde::Serialize;

use jobboard_auth::Role;
use jobboard_core::{
    ApplicationId, ApplicationStatus, CategoryId, EmailAddress, Entity, IndustryId, JobId, UserId,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: EmailAddress,
    pub role: Role,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub company_name: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Industry {
    pub id: IndustryId,
    pub name: String,
    pub description: Option<String>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub description: Option<String>,
    pub industry_id: Option<IndustryId>,
    pub created_by: UserId,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: JobId,
    pub title: String,
    pub company: String,
    pub location: String,
    pub wage: Option<i64>,
    pub description: String,
    pub industry_id: Option<IndustryId>,
    pub category_id: Option<CategoryId>,
    pub posted_by: UserId,
    pub posted_at: DateTime<Utc>,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Application {
    pub id: ApplicationId,
    pub job_id: JobId,
    pub applicant_id: UserId,
    pub cover_letter: Option<String>,
    pub resume_link: Option<String>,
    pub status: ApplicationStatus,
    pub applied_at: DateTime<Utc>,
}

macro_rules! impl_entity {
    ($($ty:ty => $id:ty),* $(,)?) => {
        $(
            impl Entity for $ty {
                type Id = $id;

                fn id(&self) -> &Self::Id {
                    &self.id
                }
            }
        )*
    };
}

impl_entity!(
    User => UserId,
    Industry => IndustryId,
    Category => CategoryId,
    Job => JobId,
    Application => ApplicationId,
);
