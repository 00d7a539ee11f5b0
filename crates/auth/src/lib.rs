//! `jobboard-auth`: pure authentication/authorization boundary.
//!
//! Holds the role-based access decision engine and the JWT claim model.
//! This crate is intentionally decoupled from HTTP and storage.

pub mod actor;
pub mod authorize;
pub mod claims;
pub mod policy;
pub mod resource;
pub mod roles;
pub mod scope;

pub use actor::Actor;
pub use authorize::{Decision, DecisionExplanation, decide, explain};
pub use claims::{Hs256JwtValidator, JwtClaims, JwtValidator, TokenValidationError, validate_claims};
pub use policy::{Effect, PolicyError, PolicyMatrixRow, PolicyTable};
pub use resource::{Action, ResourceDescriptor, ResourceType};
pub use roles::Role;
pub use scope::ApplicationScope;
