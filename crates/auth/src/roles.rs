use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::policy::PolicyError;

/// Role identifier used for RBAC.
///
/// `Anonymous` is the role of an unauthenticated request; it never appears in
/// a valid token.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Employer,
    #[serde(alias = "user")]
    JobSeeker,
    Anonymous,
}

impl Role {
    pub const ALL: [Role; 4] = [Role::Admin, Role::Employer, Role::JobSeeker, Role::Anonymous];

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Employer => "employer",
            Role::JobSeeker => "job_seeker",
            Role::Anonymous => "anonymous",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = PolicyError;

    /// Accepts the legacy account role name `user` for job seekers.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "admin" => Ok(Role::Admin),
            "employer" => Ok(Role::Employer),
            "job_seeker" | "user" => Ok(Role::JobSeeker),
            "anonymous" => Ok(Role::Anonymous),
            other => Err(PolicyError::InvalidRole(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_user_role_maps_to_job_seeker() {
        assert_eq!("user".parse::<Role>().unwrap(), Role::JobSeeker);
        let role: Role = serde_json::from_str("\"user\"").unwrap();
        assert_eq!(role, Role::JobSeeker);
    }

    #[test]
    fn display_matches_wire_name() {
        for role in Role::ALL {
            let wire = serde_json::to_string(&role).unwrap();
            assert_eq!(wire, format!("\"{role}\""));
            assert_eq!(role.as_str().parse::<Role>().unwrap(), role);
        }
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(matches!(
            "superuser".parse::<Role>(),
            Err(PolicyError::InvalidRole(name)) if name == "superuser"
        ));
    }
}
