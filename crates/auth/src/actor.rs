use serde::{Deserialize, Serialize};

use jobboard_core::UserId;

use crate::Role;

/// Identity evaluated for a single request.
///
/// Built by the authentication layer and never mutated afterwards.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Actor {
    pub role: Role,
    pub id: Option<UserId>,
    pub is_authenticated: bool,
}

impl Actor {
    /// The identity of a request that carried no credentials.
    pub fn anonymous() -> Self {
        Self {
            role: Role::Anonymous,
            id: None,
            is_authenticated: false,
        }
    }

    pub fn authenticated(id: UserId, role: Role) -> Self {
        Self {
            role,
            id: Some(id),
            is_authenticated: true,
        }
    }

    pub fn admin(id: UserId) -> Self {
        Self::authenticated(id, Role::Admin)
    }

    pub fn employer(id: UserId) -> Self {
        Self::authenticated(id, Role::Employer)
    }

    pub fn job_seeker(id: UserId) -> Self {
        Self::authenticated(id, Role::JobSeeker)
    }

    /// Whether the actor must be evaluated under unauthenticated rules.
    ///
    /// An `Anonymous` role is treated as unauthenticated even if the flag says
    /// otherwise.
    pub fn is_anonymous(&self) -> bool {
        !self.is_authenticated || self.role == Role::Anonymous
    }

    /// Ownership check used by `ALLOWED_IF_OWNER` rules. Absent ids never match.
    pub fn owns(&self, owner_id: Option<UserId>) -> bool {
        matches!((self.id, owner_id), (Some(me), Some(owner)) if me == owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_role_is_never_authenticated() {
        let forged = Actor {
            role: Role::Anonymous,
            id: Some(UserId::from_u128(1)),
            is_authenticated: true,
        };
        assert!(forged.is_anonymous());
        assert!(Actor::anonymous().is_anonymous());
        assert!(!Actor::employer(UserId::from_u128(1)).is_anonymous());
    }

    #[test]
    fn missing_ids_never_own_anything() {
        assert!(!Actor::anonymous().owns(None));
        assert!(!Actor::anonymous().owns(Some(UserId::from_u128(3))));
        assert!(!Actor::job_seeker(UserId::from_u128(3)).owns(None));
        assert!(Actor::job_seeker(UserId::from_u128(3)).owns(Some(UserId::from_u128(3))));
    }
}
