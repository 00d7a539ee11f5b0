use jobboard_auth::{Actor, Role};
use jobboard_core::UserId;

/// Who is making the request.
///
/// Inserted by the auth middleware for every request; requests without a
/// bearer token carry the anonymous actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorContext {
    actor: Actor,
    email: Option<String>,
}

impl ActorContext {
    pub fn new(actor: Actor, email: Option<String>) -> Self {
        Self { actor, email }
    }

    pub fn anonymous() -> Self {
        Self::new(Actor::anonymous(), None)
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.actor.id
    }

    pub fn role(&self) -> Role {
        self.actor.role
    }

    /// E-mail from the token, if the issuer included one.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }
}
