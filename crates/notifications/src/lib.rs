//! Asynchronous notification delivery with retry, backoff and terminal failure.
//!
//! ## Design
//!
//! - Request handlers `enqueue` a notification event and return immediately
//! - Deliveries are stored in a queue and claimed by one worker at a time
//! - Failed sends are retried with exponential backoff up to a total attempt cap
//! - Exhausted deliveries end `FailedTerminal`, are logged, and never retried
//!
//! ## Components
//!
//! - `NotificationEvent` / `Delivery`: the fact to announce and its queued task
//! - `NotificationQueue`: storage for deliveries (in-memory here)
//! - `NotificationDispatcher`: non-blocking `enqueue`
//! - `DeliveryWorker`: `render_and_send` plus the polling worker loop
//! - `TemplateStore` / `MailTransport`: collaborators for content and sending

pub mod dispatcher;
pub mod error;
pub mod lifecycle;
pub mod queue;
pub mod retry;
pub mod templates;
pub mod transport;
pub mod types;
pub mod worker;

pub use dispatcher::{NotificationDispatcher, TaskHandle};
pub use error::{DeliveryError, DispatchError, StateError};
pub use queue::{InMemoryNotificationQueue, NotificationQueue, QueueError, QueueStats};
pub use retry::{BackoffStrategy, RetryPolicy};
pub use templates::{BuiltinTemplates, DirectoryTemplates, RenderDefaults, Template, TemplateStore, render};
pub use transport::{LogTransport, MailTransport, MemoryTransport, OutgoingMail, TransportError};
pub use types::{AttemptRecord, Delivery, DeliveryId, DeliveryState, EventType, NotificationEvent, StateKind};
pub use worker::{DeliveryWorker, WorkerConfig, WorkerHandle, WorkerPool, WorkerStats};
