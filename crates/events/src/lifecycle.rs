use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use jobboard_core::{ApplicationId, ApplicationStatus, EmailAddress, JobId, UserId};

use crate::Event;

/// Kind of account that was registered.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountKind {
    JobSeeker,
    Employer,
}

/// Account and job lifecycle transitions that other parts of the system react to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    UserRegistered {
        user_id: UserId,
        email: EmailAddress,
        account: AccountKind,
        first_name: Option<String>,
        company_name: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    JobPosted {
        job_id: JobId,
        title: String,
        company: String,
        posted_by: UserId,
        employer_email: EmailAddress,
        occurred_at: DateTime<Utc>,
    },
    ApplicationSubmitted {
        application_id: ApplicationId,
        job_title: String,
        company: String,
        applicant_email: EmailAddress,
        applicant_first_name: Option<String>,
        occurred_at: DateTime<Utc>,
    },
    ApplicationStatusChanged {
        application_id: ApplicationId,
        job_title: String,
        company: String,
        applicant_email: EmailAddress,
        applicant_first_name: Option<String>,
        previous: ApplicationStatus,
        current: ApplicationStatus,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for LifecycleEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LifecycleEvent::UserRegistered { .. } => "users.user.registered",
            LifecycleEvent::JobPosted { .. } => "jobs.job.posted",
            LifecycleEvent::ApplicationSubmitted { .. } => "applications.application.submitted",
            LifecycleEvent::ApplicationStatusChanged { .. } => "applications.application.status_changed",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LifecycleEvent::UserRegistered { occurred_at, .. }
            | LifecycleEvent::JobPosted { occurred_at, .. }
            | LifecycleEvent::ApplicationSubmitted { occurred_at, .. }
            | LifecycleEvent::ApplicationStatusChanged { occurred_at, .. } => *occurred_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_type_tag() {
        let event = LifecycleEvent::UserRegistered {
            user_id: UserId::from_u128(1),
            email: EmailAddress::parse("ada@example.com").unwrap(),
            account: AccountKind::JobSeeker,
            first_name: Some("Ada".to_string()),
            company_name: None,
            occurred_at: Utc::now(),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "user_registered");
        assert_eq!(json["account"], "job_seeker");
        assert_eq!(event.event_type(), "users.user.registered");
    }
}
