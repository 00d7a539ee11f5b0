//! Non-blocking hand-off of notification events to the queue.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{debug, error};

use jobboard_events::{Event, LifecycleEvent};

use crate::error::DispatchError;
use crate::queue::{NotificationQueue, QueueError, QueueStats};
use crate::retry::RetryPolicy;
use crate::templates::{RenderDefaults, TemplateStore};
use crate::transport::MailTransport;
use crate::types::{Delivery, DeliveryId, DeliveryState, NotificationEvent};
use crate::worker::{DeliveryWorker, WorkerConfig};

/// Reference to an enqueued delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TaskHandle {
    pub id: DeliveryId,
}

/// Entry point used by request handlers.
///
/// `enqueue` only stores the delivery and wakes a worker; rendering and
/// sending happen on the worker tasks.
#[derive(Clone)]
pub struct NotificationDispatcher {
    queue: Arc<dyn NotificationQueue>,
    retry_policy: RetryPolicy,
    wake: Arc<Notify>,
}

impl NotificationDispatcher {
    pub fn new(queue: Arc<dyn NotificationQueue>, retry_policy: RetryPolicy) -> Self {
        Self {
            queue,
            retry_policy,
            wake: Arc::new(Notify::new()),
        }
    }

    /// Store a delivery for `event` and return without waiting for it to be sent.
    pub fn enqueue(&self, event: NotificationEvent) -> Result<TaskHandle, DispatchError> {
        let event_type = event.event_type;
        let delivery = Delivery::new(event, self.retry_policy.clone());
        let id = self.queue.enqueue(delivery)?;
        self.wake.notify_one();

        debug!(delivery_id = %id, event_type = %event_type, "notification enqueued");
        Ok(TaskHandle { id })
    }

    /// Enqueue the notification a lifecycle event calls for.
    pub fn notify(&self, event: &LifecycleEvent) -> Result<TaskHandle, DispatchError> {
        self.enqueue(NotificationEvent::from(event))
    }

    /// Enqueue every event, logging failures instead of returning them.
    ///
    /// Used after a commit, when the mutation can no longer be undone.
    pub fn notify_all<'a>(&self, events: impl IntoIterator<Item = &'a LifecycleEvent>) -> Vec<TaskHandle> {
        events
            .into_iter()
            .filter_map(|event| {
                self.notify(event)
                    .inspect_err(|e| {
                        error!(
                            lifecycle_event = event.event_type(),
                            error = %e,
                            "failed to enqueue notification after commit"
                        )
                    })
                    .ok()
            })
            .collect()
    }

    /// Current state of an enqueued delivery.
    pub fn status(&self, handle: TaskHandle) -> Result<Option<DeliveryState>, QueueError> {
        Ok(self.queue.get(handle.id)?.map(|d| d.state))
    }

    pub fn stats(&self) -> Result<QueueStats, QueueError> {
        self.queue.stats()
    }

    pub fn queue(&self) -> &Arc<dyn NotificationQueue> {
        &self.queue
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry_policy
    }

    /// Build a worker that drains this dispatcher's queue and is woken by its `enqueue`.
    pub fn worker(
        &self,
        transport: Arc<dyn MailTransport>,
        templates: Arc<dyn TemplateStore>,
        defaults: RenderDefaults,
        config: WorkerConfig,
    ) -> DeliveryWorker {
        DeliveryWorker::new(
            self.queue.clone(),
            transport,
            templates,
            defaults,
            self.wake.clone(),
            config,
        )
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("retry_policy", &self.retry_policy)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use jobboard_core::EmailAddress;

    use super::*;
    use crate::queue::InMemoryNotificationQueue;
    use crate::types::EventType;

    #[test]
    fn enqueue_stores_a_pending_delivery() {
        let queue = InMemoryNotificationQueue::arc();
        let dispatcher = NotificationDispatcher::new(queue.clone(), RetryPolicy::default());

        let handle = dispatcher
            .enqueue(NotificationEvent::new(
                EventType::UserWelcome,
                EmailAddress::parse("ada@example.com").unwrap(),
            ))
            .unwrap();

        assert_eq!(dispatcher.status(handle).unwrap(), Some(DeliveryState::Pending));
        let stored = queue.get(handle.id).unwrap().unwrap();
        assert_eq!(stored.retry_policy, RetryPolicy::default());
        assert_eq!(dispatcher.stats().unwrap().pending, 1);
    }

    #[test]
    fn unknown_handle_has_no_status() {
        let dispatcher = NotificationDispatcher::new(InMemoryNotificationQueue::arc(), RetryPolicy::default());
        assert_eq!(dispatcher.status(TaskHandle { id: DeliveryId::new() }).unwrap(), None);
    }
}
