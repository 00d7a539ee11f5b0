use serde::Serialize;

use jobboard_core::UserId;

use crate::{Actor, Role};

/// Which applications an actor may list.
///
/// Reading a single application is governed by the policy table; listing is
/// additionally narrowed so employers only see applicants to their own jobs
/// and job seekers only see what they filed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "scope", content = "user_id")]
pub enum ApplicationScope {
    All,
    PostedBy(UserId),
    AppliedBy(UserId),
    Nothing,
}

impl ApplicationScope {
    pub fn for_actor(actor: &Actor) -> Self {
        if actor.is_anonymous() {
            return ApplicationScope::Nothing;
        }

        match (actor.role, actor.id) {
            (Role::Admin, _) => ApplicationScope::All,
            (Role::Employer, Some(id)) => ApplicationScope::PostedBy(id),
            (Role::JobSeeker, Some(id)) => ApplicationScope::AppliedBy(id),
            _ => ApplicationScope::Nothing,
        }
    }

    /// Whether an application with the given applicant and job poster is visible.
    pub fn includes(&self, applicant: UserId, job_posted_by: UserId) -> bool {
        match self {
            ApplicationScope::All => true,
            ApplicationScope::PostedBy(id) => *id == job_posted_by,
            ApplicationScope::AppliedBy(id) => *id == applicant,
            ApplicationScope::Nothing => false,
        }
    }
}
