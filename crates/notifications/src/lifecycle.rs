//! Lifecycle event to notification mapping.

use jobboard_events::{AccountKind, LifecycleEvent};

use crate::types::{EventType, NotificationEvent};

impl From<&LifecycleEvent> for NotificationEvent {
    fn from(event: &LifecycleEvent) -> Self {
        match event {
            LifecycleEvent::UserRegistered {
                email,
                account: AccountKind::JobSeeker,
                first_name,
                ..
            } => NotificationEvent::new(EventType::UserWelcome, email.clone())
                .with("first_name", first_name.clone().unwrap_or_default()),

            LifecycleEvent::UserRegistered {
                email,
                account: AccountKind::Employer,
                company_name,
                first_name,
                ..
            } => NotificationEvent::new(EventType::EmployerWelcome, email.clone())
                .with("company_name", company_name.clone().unwrap_or_default())
                .with_opt("first_name", first_name.clone()),

            LifecycleEvent::JobPosted {
                job_id,
                title,
                company,
                employer_email,
                ..
            } => NotificationEvent::new(EventType::JobPosted, employer_email.clone())
                .with("job_id", job_id.to_string())
                .with("job_title", title.clone())
                .with("company", company.clone()),

            LifecycleEvent::ApplicationSubmitted {
                application_id,
                job_title,
                company,
                applicant_email,
                applicant_first_name,
                ..
            } => NotificationEvent::new(EventType::ApplicationSubmitted, applicant_email.clone())
                .with("application_id", application_id.to_string())
                .with("job_title", job_title.clone())
                .with("company", company.clone())
                .with("first_name", applicant_first_name.clone().unwrap_or_default()),

            LifecycleEvent::ApplicationStatusChanged {
                application_id,
                job_title,
                company,
                applicant_email,
                applicant_first_name,
                previous,
                current,
                ..
            } => NotificationEvent::new(EventType::ApplicationStatusChanged, applicant_email.clone())
                .with("application_id", application_id.to_string())
                .with("job_title", job_title.clone())
                .with("company", company.clone())
                .with("first_name", applicant_first_name.clone().unwrap_or_default())
                .with("previous_status", previous.as_str())
                .with("status", current.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use jobboard_core::{ApplicationId, ApplicationStatus, EmailAddress, JobId, UserId};

    use super::*;

    fn email(s: &str) -> EmailAddress {
        EmailAddress::parse(s).unwrap()
    }

    #[test]
    fn registrations_pick_the_welcome_by_account_kind() {
        let seeker = LifecycleEvent::UserRegistered {
            user_id: UserId::new(),
            email: email("ada@example.com"),
            account: AccountKind::JobSeeker,
            first_name: Some("Ada".to_string()),
            company_name: None,
            occurred_at: Utc::now(),
        };
        let n = NotificationEvent::from(&seeker);
        assert_eq!(n.event_type, EventType::UserWelcome);
        assert_eq!(n.recipient_email.as_str(), "ada@example.com");
        assert_eq!(n.template_context["first_name"], "Ada");

        let employer = LifecycleEvent::UserRegistered {
            user_id: UserId::new(),
            email: email("hr@acme.test"),
            account: AccountKind::Employer,
            first_name: None,
            company_name: Some("Acme".to_string()),
            occurred_at: Utc::now(),
        };
        let n = NotificationEvent::from(&employer);
        assert_eq!(n.event_type, EventType::EmployerWelcome);
        assert_eq!(n.template_context["company_name"], "Acme");
        assert!(!n.template_context.contains_key("first_name"));
    }

    #[test]
    fn status_change_goes_to_the_applicant() {
        let event = LifecycleEvent::ApplicationStatusChanged {
            application_id: ApplicationId::new(),
            job_title: "Backend Engineer".to_string(),
            company: "Acme".to_string(),
            applicant_email: email("x@y.com"),
            applicant_first_name: None,
            previous: ApplicationStatus::Pending,
            current: ApplicationStatus::Accepted,
            occurred_at: Utc::now(),
        };
        let n = NotificationEvent::from(&event);
        assert_eq!(n.event_type, EventType::ApplicationStatusChanged);
        assert_eq!(n.recipient_email.as_str(), "x@y.com");
        assert_eq!(n.template_context["status"], "accepted");
        assert_eq!(n.template_context["previous_status"], "pending");
        assert_eq!(n.template_context["first_name"], "");
    }

    #[test]
    fn job_posted_goes_to_the_employer() {
        let event = LifecycleEvent::JobPosted {
            job_id: JobId::new(),
            title: "SRE".to_string(),
            company: "Acme".to_string(),
            posted_by: UserId::new(),
            employer_email: email("hr@acme.test"),
            occurred_at: Utc::now(),
        };
        let n = NotificationEvent::from(&event);
        assert_eq!(n.event_type, EventType::JobPosted);
        assert_eq!(n.recipient_email.as_str(), "hr@acme.test");
        assert_eq!(n.template_context["job_title"], "SRE");
    }
}
