//! Lifecycle events and transactional release.
//!
//! Request handlers stage lifecycle facts while a unit of work is open; they
//! are handed to consumers (the notification dispatcher) only after the unit
//! of work commits.

pub mod commit;
pub mod event;
pub mod lifecycle;

pub use commit::CommitHooks;
pub use event::Event;
pub use lifecycle::{AccountKind, LifecycleEvent};
