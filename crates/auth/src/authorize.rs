use serde::Serialize;
use tracing::error;

use crate::policy::{self, Effect, PolicyError, PolicyTable};
use crate::{Action, Actor, ResourceDescriptor, ResourceType, Role};

/// Outcome of an access decision.
///
/// `Deny` is an ordinary result, not an error: the HTTP layer maps it to 403.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Decision::Allow)
    }
}

impl PolicyTable {
    /// Decide whether `actor` may perform `resource.action` on `resource`.
    ///
    /// - No IO
    /// - No panics
    /// - No shared mutable state
    pub fn decide(&self, actor: &Actor, resource: &ResourceDescriptor) -> Result<Decision, PolicyError> {
        let effect = self.effect_for(
            actor.role,
            !actor.is_anonymous(),
            resource.resource_type,
            resource.action,
        )?;

        Ok(match effect {
            Effect::Allowed => Decision::Allow,
            Effect::Denied => Decision::Deny,
            Effect::AllowedIfOwner if actor.owns(resource.owner_id) => Decision::Allow,
            Effect::AllowedIfOwner => Decision::Deny,
        })
    }

    /// Explain why a decision was (or would be) made.
    pub fn explain(&self, actor: &Actor, resource: &ResourceDescriptor) -> Result<DecisionExplanation, PolicyError> {
        let authenticated = !actor.is_anonymous();
        let effect = self.effect_for(actor.role, authenticated, resource.resource_type, resource.action)?;
        let decision = self.decide(actor, resource)?;

        let owner_match = match effect {
            Effect::AllowedIfOwner => Some(actor.owns(resource.owner_id)),
            _ => None,
        };

        let reason = match (authenticated, actor.role, effect, owner_match) {
            (false, _, Effect::Denied, _) if !resource.action.is_read() => {
                "unauthenticated callers may only read".to_string()
            }
            (false, _, Effect::Denied, _) => format!(
                "{} resources are not readable without authentication",
                resource.resource_type
            ),
            (false, _, _, _) => "public read".to_string(),
            (true, Role::Admin, _, _) => "admin may perform every action".to_string(),
            (true, role, Effect::Allowed, _) => {
                format!("{role} may {} any {}", resource.action, resource.resource_type)
            }
            (true, role, Effect::Denied, _) => {
                format!("{role} may not {} {}", resource.action, resource.resource_type)
            }
            (true, role, Effect::AllowedIfOwner, Some(true)) => format!(
                "{role} may {} own {} and owns this one",
                resource.action, resource.resource_type
            ),
            (true, role, Effect::AllowedIfOwner, _) => format!(
                "{role} may only {} own {}; owner does not match",
                resource.action, resource.resource_type
            ),
        };

        Ok(DecisionExplanation {
            decision,
            role: actor.role,
            authenticated,
            resource_type: resource.resource_type,
            action: resource.action,
            effect,
            owner_match,
            reason,
        })
    }
}

/// Auditable description of a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecisionExplanation {
    pub decision: Decision,
    pub role: Role,
    pub authenticated: bool,
    pub resource_type: ResourceType,
    pub action: Action,
    /// Effective rule after admin/unauthenticated handling.
    pub effect: Effect,
    /// Set only for owner-conditional rules.
    pub owner_match: Option<bool>,
    pub reason: String,
}

/// Decide against the process-wide policy table.
///
/// Configuration errors are logged with the full request context before being
/// returned; translating them into a response is the caller's job.
pub fn decide(actor: &Actor, resource: &ResourceDescriptor) -> Result<Decision, PolicyError> {
    policy::global().decide(actor, resource).inspect_err(|e| {
        error!(
            role = %actor.role,
            actor_id = ?actor.id,
            authenticated = actor.is_authenticated,
            resource_type = %resource.resource_type,
            action = %resource.action,
            owner_id = ?resource.owner_id,
            error = %e,
            "policy evaluation failed"
        );
    })
}

/// Explain a decision against the process-wide policy table.
pub fn explain(actor: &Actor, resource: &ResourceDescriptor) -> Result<DecisionExplanation, PolicyError> {
    policy::global().explain(actor, resource)
}
