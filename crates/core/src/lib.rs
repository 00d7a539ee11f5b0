//! `jobboard-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives shared by the job board
//! crates (no infrastructure concerns).

pub mod entity;
pub mod error;
pub mod id;
pub mod status;
pub mod value_object;

pub use entity::Entity;
pub use error::{DomainError, DomainResult};
pub use id::{ApplicationId, CategoryId, IndustryId, JobId, UserId};
pub use status::ApplicationStatus;
pub use value_object::{EmailAddress, ValueObject};
