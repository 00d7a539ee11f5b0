//! Delivery storage.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::types::{Delivery, DeliveryId, DeliveryState, StateKind};

/// Queue of notification deliveries.
pub trait NotificationQueue: Send + Sync {
    /// Store a new delivery.
    fn enqueue(&self, delivery: Delivery) -> Result<DeliveryId, QueueError>;

    /// Get a delivery by ID.
    fn get(&self, id: DeliveryId) -> Result<Option<Delivery>, QueueError>;

    /// Replace a stored delivery. Terminal records cannot be changed.
    fn update(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Claim the oldest delivery that is ready at `now`, moving it to `InFlight`.
    /// Returns None if nothing is ready.
    fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Delivery>, QueueError>;

    /// Fail every `InFlight` delivery claimed before `claimed_before`.
    ///
    /// An attempt whose worker never reported back counts as a failed
    /// attempt, so the delivery is retried or ends terminally like any other
    /// failure. Returns how many were reclaimed.
    fn reclaim_stale(&self, claimed_before: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize, QueueError>;

    /// List deliveries, oldest first, optionally filtered by state.
    fn list_by_state(&self, state: Option<StateKind>, limit: usize) -> Result<Vec<Delivery>, QueueError>;

    /// Count deliveries per state.
    fn stats(&self) -> Result<QueueStats, QueueError>;

    /// Drop terminal deliveries last updated before `before`. Returns how many were removed.
    fn purge_terminal(&self, before: DateTime<Utc>) -> Result<usize, QueueError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("delivery not found: {0}")]
    NotFound(DeliveryId),
    #[error("delivery already exists: {0}")]
    AlreadyExists(DeliveryId),
    #[error("delivery {0} is terminal and cannot change")]
    Terminal(DeliveryId),
    #[error("storage error: {0}")]
    Storage(String),
}

/// Delivery counts per state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct QueueStats {
    pub pending: usize,
    pub in_flight: usize,
    pub retry_scheduled: usize,
    pub delivered: usize,
    pub failed_terminal: usize,
}

impl QueueStats {
    pub fn total(&self) -> usize {
        self.pending + self.in_flight + self.retry_scheduled + self.delivered + self.failed_terminal
    }
}

/// In-memory queue for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryNotificationQueue {
    deliveries: RwLock<HashMap<DeliveryId, Delivery>>,
}

impl InMemoryNotificationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, HashMap<DeliveryId, Delivery>>, QueueError> {
        self.deliveries
            .read()
            .map_err(|_| QueueError::Storage("queue lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, HashMap<DeliveryId, Delivery>>, QueueError> {
        self.deliveries
            .write()
            .map_err(|_| QueueError::Storage("queue lock poisoned".to_string()))
    }
}

impl NotificationQueue for InMemoryNotificationQueue {
    fn enqueue(&self, delivery: Delivery) -> Result<DeliveryId, QueueError> {
        let mut deliveries = self.write()?;
        if deliveries.contains_key(&delivery.id) {
            return Err(QueueError::AlreadyExists(delivery.id));
        }
        let id = delivery.id;
        deliveries.insert(id, delivery);
        Ok(id)
    }

    fn get(&self, id: DeliveryId) -> Result<Option<Delivery>, QueueError> {
        Ok(self.read()?.get(&id).cloned())
    }

    fn update(&self, delivery: &Delivery) -> Result<(), QueueError> {
        let mut deliveries = self.write()?;
        let stored = deliveries
            .get_mut(&delivery.id)
            .ok_or(QueueError::NotFound(delivery.id))?;
        if stored.state.is_terminal() {
            return Err(QueueError::Terminal(delivery.id));
        }
        *stored = delivery.clone();
        Ok(())
    }

    fn claim_next(&self, now: DateTime<Utc>) -> Result<Option<Delivery>, QueueError> {
        let mut deliveries = self.write()?;

        // Oldest ready delivery first
        let next = deliveries
            .values()
            .filter(|d| d.is_ready(now))
            .min_by_key(|d| (d.created_at, d.id))
            .map(|d| d.id);

        let Some(id) = next else {
            return Ok(None);
        };
        let Some(delivery) = deliveries.get_mut(&id) else {
            return Ok(None);
        };
        delivery
            .mark_in_flight(now)
            .map_err(|e| QueueError::Storage(e.to_string()))?;
        Ok(Some(delivery.clone()))
    }

    fn reclaim_stale(&self, claimed_before: DateTime<Utc>, now: DateTime<Utc>) -> Result<usize, QueueError> {
        let mut deliveries = self.write()?;
        let mut reclaimed = 0;
        for delivery in deliveries.values_mut() {
            if delivery.state != DeliveryState::InFlight || delivery.updated_at >= claimed_before {
                continue;
            }
            let claimed_at = delivery.updated_at;
            delivery
                .mark_failed("attempt abandoned without an outcome".to_string(), claimed_at, now)
                .map_err(|e| QueueError::Storage(e.to_string()))?;
            reclaimed += 1;
        }
        Ok(reclaimed)
    }

    fn list_by_state(&self, state: Option<StateKind>, limit: usize) -> Result<Vec<Delivery>, QueueError> {
        let deliveries = self.read()?;
        let mut result: Vec<_> = deliveries
            .values()
            .filter(|d| state.is_none_or(|s| d.state.kind() == s))
            .cloned()
            .collect();

        result.sort_by_key(|d| (d.created_at, d.id));
        result.truncate(limit);
        Ok(result)
    }

    fn stats(&self) -> Result<QueueStats, QueueError> {
        let deliveries = self.read()?;
        let mut stats = QueueStats::default();
        for delivery in deliveries.values() {
            match delivery.state.kind() {
                StateKind::Pending => stats.pending += 1,
                StateKind::InFlight => stats.in_flight += 1,
                StateKind::RetryScheduled => stats.retry_scheduled += 1,
                StateKind::Delivered => stats.delivered += 1,
                StateKind::FailedTerminal => stats.failed_terminal += 1,
            }
        }
        Ok(stats)
    }

    fn purge_terminal(&self, before: DateTime<Utc>) -> Result<usize, QueueError> {
        let mut deliveries = self.write()?;
        let before_len = deliveries.len();
        deliveries.retain(|_, d| !(d.state.is_terminal() && d.updated_at < before));
        Ok(before_len - deliveries.len())
    }
}

#[cfg(test)]
mod tests {
    use jobboard_core::EmailAddress;

    use super::*;
    use crate::retry::RetryPolicy;
    use crate::types::{DeliveryState, EventType, NotificationEvent};

    fn delivery(policy: RetryPolicy) -> Delivery {
        Delivery::new(
            NotificationEvent::new(EventType::UserWelcome, EmailAddress::parse("a@b.com").unwrap()),
            policy,
        )
    }

    #[test]
    fn enqueue_and_claim_in_fifo_order() {
        let queue = InMemoryNotificationQueue::new();
        let first = delivery(RetryPolicy::default());
        let mut second = delivery(RetryPolicy::default());
        second.created_at = first.created_at + chrono::Duration::milliseconds(1);

        let first_id = queue.enqueue(first.clone()).unwrap();
        let second_id = queue.enqueue(second).unwrap();
        assert_eq!(queue.enqueue(first), Err(QueueError::AlreadyExists(first_id)));

        let now = Utc::now();
        let claimed = queue.claim_next(now).unwrap().unwrap();
        assert_eq!(claimed.id, first_id);
        assert_eq!(claimed.state, DeliveryState::InFlight);
        assert_eq!(claimed.attempt, 1);

        assert_eq!(queue.claim_next(now).unwrap().unwrap().id, second_id);
        assert!(queue.claim_next(now).unwrap().is_none());
    }

    #[test]
    fn retry_waits_for_its_time() {
        let queue = InMemoryNotificationQueue::new();
        queue.enqueue(delivery(RetryPolicy::default())).unwrap();

        let t0 = Utc::now();
        let mut claimed = queue.claim_next(t0).unwrap().unwrap();
        claimed.mark_failed("boom".to_string(), t0, t0).unwrap();
        queue.update(&claimed).unwrap();

        assert!(queue.claim_next(t0 + chrono::Duration::seconds(29)).unwrap().is_none());
        let again = queue.claim_next(t0 + chrono::Duration::seconds(30)).unwrap().unwrap();
        assert_eq!(again.attempt, 2);
    }

    #[test]
    fn terminal_records_are_frozen() {
        let queue = InMemoryNotificationQueue::new();
        queue.enqueue(delivery(RetryPolicy::no_retry())).unwrap();

        let now = Utc::now();
        let mut claimed = queue.claim_next(now).unwrap().unwrap();
        let in_flight = claimed.clone();
        claimed.mark_failed("boom".to_string(), now, now).unwrap();
        queue.update(&claimed).unwrap();

        assert_eq!(queue.update(&in_flight), Err(QueueError::Terminal(claimed.id)));
        assert!(queue.claim_next(now + chrono::Duration::days(1)).unwrap().is_none());
    }

    #[test]
    fn stats_list_and_purge() {
        let queue = InMemoryNotificationQueue::new();
        for _ in 0..3 {
            queue.enqueue(delivery(RetryPolicy::default())).unwrap();
        }
        let now = Utc::now();
        let mut claimed = queue.claim_next(now).unwrap().unwrap();
        claimed.mark_delivered(now, now).unwrap();
        queue.update(&claimed).unwrap();

        let stats = queue.stats().unwrap();
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.delivered, 1);
        assert_eq!(stats.total(), 3);

        assert_eq!(queue.list_by_state(Some(StateKind::Pending), 10).unwrap().len(), 2);
        assert_eq!(queue.list_by_state(None, 1).unwrap().len(), 1);

        assert_eq!(queue.purge_terminal(now - chrono::Duration::seconds(1)).unwrap(), 0);
        assert_eq!(queue.purge_terminal(now + chrono::Duration::seconds(1)).unwrap(), 1);
        assert!(queue.get(claimed.id).unwrap().is_none());
    }

    #[test]
    fn abandoned_claims_are_reclaimed_as_failures() {
        let queue = InMemoryNotificationQueue::new();
        let retryable = queue.enqueue(delivery(RetryPolicy::default())).unwrap();
        let t0 = Utc::now();
        queue.claim_next(t0).unwrap().unwrap();

        // Still inside the lease: left alone.
        assert_eq!(queue.reclaim_stale(t0, t0).unwrap(), 0);

        let later = t0 + chrono::Duration::seconds(90);
        assert_eq!(queue.reclaim_stale(later, later).unwrap(), 1);
        let reclaimed = queue.get(retryable).unwrap().unwrap();
        assert!(matches!(reclaimed.state, DeliveryState::RetryScheduled { .. }));
        assert_eq!(reclaimed.history.len(), 1);
        assert!(!reclaimed.history[0].success);

        let again = queue.claim_next(later + chrono::Duration::seconds(30)).unwrap().unwrap();
        assert_eq!(again.id, retryable);
        assert_eq!(again.attempt, 2);
    }

    #[test]
    fn abandoned_last_attempt_fails_terminally() {
        let queue = InMemoryNotificationQueue::new();
        let id = queue.enqueue(delivery(RetryPolicy::no_retry())).unwrap();
        let t0 = Utc::now();
        queue.claim_next(t0).unwrap().unwrap();

        let later = t0 + chrono::Duration::seconds(90);
        assert_eq!(queue.reclaim_stale(later, later).unwrap(), 1);
        assert_eq!(queue.get(id).unwrap().unwrap().state.kind(), StateKind::FailedTerminal);
        assert_eq!(queue.reclaim_stale(later, later).unwrap(), 0);
    }

    #[test]
    fn update_unknown_delivery() {
        let queue = InMemoryNotificationQueue::new();
        let d = delivery(RetryPolicy::default());
        assert_eq!(queue.update(&d), Err(QueueError::NotFound(d.id)));
    }
}
