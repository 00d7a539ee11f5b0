//! Notification error model.

use std::time::Duration;

use thiserror::Error;

use crate::queue::QueueError;
use crate::transport::TransportError;
use crate::types::{EventType, StateKind};

/// Why a single delivery attempt did not succeed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DeliveryError {
    /// No template is configured for the event type (not retryable).
    #[error("no template for event type '{0}'")]
    MissingTemplate(EventType),

    #[error("mail transport failed: {0}")]
    Transport(#[from] TransportError),

    #[error("mail transport timed out after {0:?}")]
    Timeout(Duration),

    /// Rendering or the transport panicked mid-attempt.
    #[error("delivery attempt panicked: {0}")]
    Panicked(String),
}

impl DeliveryError {
    /// Transport failures and timeouts are retried; configuration errors are not.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DeliveryError::MissingTemplate(_))
    }
}

/// Failure to hand an event to the queue.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    #[error("failed to enqueue notification: {0}")]
    Queue(#[from] QueueError),
}

/// An illegal delivery state transition.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("illegal delivery transition {from:?} -> {to:?}")]
pub struct StateError {
    pub from: StateKind,
    pub to: StateKind,
}
