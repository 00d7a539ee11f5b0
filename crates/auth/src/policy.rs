//! Static policy rule table.
//!
//! The table is data: a JSON document mapping
//! `role → resource_type → action → effect`. It is loaded once per process
//! and never mutated afterwards, so concurrent request handlers share it
//! without synchronization.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::OnceLock;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::error;

use crate::{Action, ResourceType, Role};

/// Built-in policy document, compiled into the binary.
pub const DEFAULT_POLICY_JSON: &str = include_str!("../policy/default_policy.json");

static GLOBAL: OnceLock<PolicyTable> = OnceLock::new();

/// Outcome a rule assigns to `(role, resource_type, action)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    Allowed,
    AllowedIfOwner,
    Denied,
}

/// Policy configuration errors.
///
/// These signal caller misuse or a corrupt table, never an ordinary denial.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid role '{0}'")]
    InvalidRole(String),

    #[error("invalid resource type '{0}'")]
    InvalidResourceType(String),

    #[error("invalid action '{action}' for resource type '{resource_type}'")]
    InvalidAction {
        resource_type: ResourceType,
        action: String,
    },

    #[error("no policy rule for ({role}, {resource_type}, {action})")]
    MissingRule {
        role: Role,
        resource_type: ResourceType,
        action: Action,
    },

    #[error("malformed policy document: {0}")]
    Malformed(String),

    #[error("failed to load policy from {path}: {message}")]
    Load { path: String, message: String },

    #[error("a process-wide policy table is already installed")]
    AlreadyInstalled,
}

/// One cell of the effective policy matrix (for audit/display).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PolicyMatrixRow {
    pub role: Role,
    pub resource_type: ResourceType,
    pub action: Action,
    pub effect: Effect,
}

type RawPolicy = BTreeMap<String, BTreeMap<String, BTreeMap<String, Effect>>>;

/// Immutable `(role, resource_type, action) → effect` table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicyTable {
    rules: HashMap<(Role, ResourceType, Action), Effect>,
}

impl PolicyTable {
    /// The table shipped with the crate.
    pub fn builtin() -> Result<Self, PolicyError> {
        Self::from_json(DEFAULT_POLICY_JSON)
    }

    /// Load a policy document from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| PolicyError::Load {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&raw)
    }

    /// Parse and validate a policy document.
    ///
    /// - `admin` rows are rejected (admins are always allowed).
    /// - `anonymous` rows may only describe `read`.
    /// - `employer` and `job_seeker` must cover every valid action of every
    ///   resource type.
    pub fn from_json(doc: &str) -> Result<Self, PolicyError> {
        let raw: RawPolicy =
            serde_json::from_str(doc).map_err(|e| PolicyError::Malformed(e.to_string()))?;

        let mut rules = HashMap::new();
        for (role_name, resources) in raw {
            let role: Role = role_name.parse()?;
            if role == Role::Admin {
                return Err(PolicyError::Malformed(
                    "admin rules are implicit and must not be listed".to_string(),
                ));
            }

            for (resource_name, actions) in resources {
                let resource_type: ResourceType = resource_name.parse()?;
                for (action_name, effect) in actions {
                    let action = Action::parse_for(resource_type, &action_name)?;
                    if role == Role::Anonymous && !action.is_read() {
                        return Err(PolicyError::Malformed(format!(
                            "anonymous rules may only cover read (found {resource_type}.{action})"
                        )));
                    }
                    rules.insert((role, resource_type, action), effect);
                }
            }
        }

        let table = Self { rules };
        table.check_complete()?;
        Ok(table)
    }

    fn check_complete(&self) -> Result<(), PolicyError> {
        for role in [Role::Employer, Role::JobSeeker] {
            for resource_type in ResourceType::ALL {
                for &action in resource_type.actions() {
                    if !self.rules.contains_key(&(role, resource_type, action)) {
                        return Err(PolicyError::MissingRule {
                            role,
                            resource_type,
                            action,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    /// Raw rule lookup (no admin/anonymous semantics applied).
    pub fn rule(&self, role: Role, resource_type: ResourceType, action: Action) -> Option<Effect> {
        self.rules.get(&(role, resource_type, action)).copied()
    }

    /// Effective effect for a role, applying the admin bypass and the
    /// unauthenticated defaults.
    ///
    /// Unauthenticated callers may only read; a read with no `anonymous` row
    /// falls back to `Allowed`.
    pub fn effect_for(
        &self,
        role: Role,
        authenticated: bool,
        resource_type: ResourceType,
        action: Action,
    ) -> Result<Effect, PolicyError> {
        if !resource_type.supports(action) {
            return Err(PolicyError::InvalidAction {
                resource_type,
                action: action.as_str().to_string(),
            });
        }

        if !authenticated || role == Role::Anonymous {
            if !action.is_read() {
                return Ok(Effect::Denied);
            }
            return Ok(self
                .rule(Role::Anonymous, resource_type, action)
                .unwrap_or(Effect::Allowed));
        }

        if role == Role::Admin {
            return Ok(Effect::Allowed);
        }

        self.rule(role, resource_type, action)
            .ok_or(PolicyError::MissingRule {
                role,
                resource_type,
                action,
            })
    }

    /// Every `(role, resource_type, action)` cell with its effective effect.
    pub fn matrix(&self) -> Result<Vec<PolicyMatrixRow>, PolicyError> {
        let mut rows = Vec::new();
        for role in Role::ALL {
            for resource_type in ResourceType::ALL {
                for &action in resource_type.actions() {
                    let authenticated = role != Role::Anonymous;
                    rows.push(PolicyMatrixRow {
                        role,
                        resource_type,
                        action,
                        effect: self.effect_for(role, authenticated, resource_type, action)?,
                    });
                }
            }
        }
        Ok(rows)
    }
}

/// Install the process-wide policy table.
///
/// Must be called at most once, before the first decision is made; later
/// calls fail with `AlreadyInstalled`.
pub fn install(table: PolicyTable) -> Result<&'static PolicyTable, PolicyError> {
    GLOBAL.set(table).map_err(|_| PolicyError::AlreadyInstalled)?;
    Ok(global())
}

/// The process-wide policy table (the built-in one unless `install` ran first).
pub fn global() -> &'static PolicyTable {
    GLOBAL.get_or_init(|| {
        PolicyTable::builtin().unwrap_or_else(|e| {
            // Empty table: every authenticated lookup fails with `MissingRule`.
            error!(error = %e, "built-in policy table failed to load");
            PolicyTable::default()
        })
    })
}
