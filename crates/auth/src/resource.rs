use core::str::FromStr;

use serde::{Deserialize, Serialize};

use jobboard_core::UserId;

use crate::policy::PolicyError;

/// Kind of entity a request acts on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceType {
    Industry,
    Category,
    Job,
    Application,
}

impl ResourceType {
    pub const ALL: [ResourceType; 4] = [
        ResourceType::Industry,
        ResourceType::Category,
        ResourceType::Job,
        ResourceType::Application,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceType::Industry => "industry",
            ResourceType::Category => "category",
            ResourceType::Job => "job",
            ResourceType::Application => "application",
        }
    }

    /// Actions that are meaningful for this resource type.
    pub fn actions(&self) -> &'static [Action] {
        const COMMON: &[Action] = &[Action::Read, Action::Create, Action::Update, Action::Delete];
        const APPLICATION: &[Action] = &[
            Action::Read,
            Action::Create,
            Action::Update,
            Action::UpdateStatusOnly,
            Action::Delete,
        ];

        match self {
            ResourceType::Application => APPLICATION,
            _ => COMMON,
        }
    }

    pub fn supports(&self, action: Action) -> bool {
        self.actions().contains(&action)
    }
}

impl core::fmt::Display for ResourceType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ResourceType {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ResourceType::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| PolicyError::InvalidResourceType(s.to_string()))
    }
}

/// Operation requested on a resource.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Read,
    Create,
    Update,
    UpdateStatusOnly,
    Delete,
}

impl Action {
    pub const ALL: [Action; 5] = [
        Action::Read,
        Action::Create,
        Action::Update,
        Action::UpdateStatusOnly,
        Action::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Read => "read",
            Action::Create => "create",
            Action::Update => "update",
            Action::UpdateStatusOnly => "update_status_only",
            Action::Delete => "delete",
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, Action::Read)
    }

    /// Parse an action name in the context of a resource type.
    pub fn parse_for(resource_type: ResourceType, name: &str) -> Result<Self, PolicyError> {
        let action = Action::ALL
            .into_iter()
            .find(|a| a.as_str() == name)
            .ok_or_else(|| PolicyError::InvalidAction {
                resource_type,
                action: name.to_string(),
            })?;

        if resource_type.supports(action) {
            Ok(action)
        } else {
            Err(PolicyError::InvalidAction {
                resource_type,
                action: name.to_string(),
            })
        }
    }
}

impl core::fmt::Display for Action {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Abstract reference to the entity and operation of a request.
///
/// `owner_id` is the controlling actor supplied by the persistence layer
/// (`None` for industries and categories, which have no per-instance owner).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub resource_type: ResourceType,
    pub owner_id: Option<UserId>,
    pub action: Action,
}

impl ResourceDescriptor {
    pub fn new(resource_type: ResourceType, action: Action, owner_id: Option<UserId>) -> Self {
        Self {
            resource_type,
            owner_id,
            action,
        }
    }

    pub fn industry(action: Action) -> Self {
        Self::new(ResourceType::Industry, action, None)
    }

    pub fn category(action: Action) -> Self {
        Self::new(ResourceType::Category, action, None)
    }

    /// A job, owned by the employer who posted it.
    pub fn job(action: Action, posted_by: Option<UserId>) -> Self {
        Self::new(ResourceType::Job, action, posted_by)
    }

    /// An application.
    ///
    /// Status-only updates are controlled by the employer who posted the job;
    /// every other action is controlled by the applicant.
    pub fn application(action: Action, applicant: Option<UserId>, job_posted_by: Option<UserId>) -> Self {
        let owner_id = match action {
            Action::UpdateStatusOnly => job_posted_by,
            _ => applicant,
        };
        Self::new(ResourceType::Application, action, owner_id)
    }

    /// Whether `action` is valid for `resource_type`.
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.resource_type.supports(self.action) {
            Ok(())
        } else {
            Err(PolicyError::InvalidAction {
                resource_type: self.resource_type,
                action: self.action.as_str().to_string(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_only_updates_exist_only_for_applications() {
        assert!(ResourceType::Application.supports(Action::UpdateStatusOnly));
        for rt in [ResourceType::Industry, ResourceType::Category, ResourceType::Job] {
            assert!(!rt.supports(Action::UpdateStatusOnly));
            assert!(ResourceDescriptor::new(rt, Action::UpdateStatusOnly, None).validate().is_err());
        }
    }

    #[test]
    fn unknown_names_produce_policy_errors() {
        assert!(matches!(
            "user".parse::<ResourceType>(),
            Err(PolicyError::InvalidResourceType(name)) if name == "user"
        ));
        assert!(matches!(
            Action::parse_for(ResourceType::Job, "update_status_only"),
            Err(PolicyError::InvalidAction { resource_type: ResourceType::Job, .. })
        ));
        assert!(matches!(
            Action::parse_for(ResourceType::Application, "approve"),
            Err(PolicyError::InvalidAction { .. })
        ));
        assert_eq!(
            Action::parse_for(ResourceType::Application, "update_status_only").unwrap(),
            Action::UpdateStatusOnly
        );
    }

    #[test]
    fn application_owner_depends_on_action() {
        let applicant = Some(UserId::from_u128(3));
        let employer = Some(UserId::from_u128(7));

        let status = ResourceDescriptor::application(Action::UpdateStatusOnly, applicant, employer);
        assert_eq!(status.owner_id, employer);

        let create = ResourceDescriptor::application(Action::Create, applicant, employer);
        assert_eq!(create.owner_id, applicant);
    }
}
