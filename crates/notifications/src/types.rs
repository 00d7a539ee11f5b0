//! Notification events, queued deliveries and their state machine.

use std::collections::BTreeMap;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use jobboard_core::EmailAddress;

use crate::error::StateError;
use crate::retry::RetryPolicy;

/// Unique delivery identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeliveryId(pub Uuid);

impl DeliveryId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for DeliveryId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DeliveryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of message; selects the template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    UserWelcome,
    EmployerWelcome,
    ApplicationSubmitted,
    ApplicationStatusChanged,
    JobPosted,
}

impl EventType {
    pub const ALL: [EventType; 5] = [
        EventType::UserWelcome,
        EventType::EmployerWelcome,
        EventType::ApplicationSubmitted,
        EventType::ApplicationStatusChanged,
        EventType::JobPosted,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::UserWelcome => "user_welcome",
            EventType::EmployerWelcome => "employer_welcome",
            EventType::ApplicationSubmitted => "application_submitted",
            EventType::ApplicationStatusChanged => "application_status_changed",
            EventType::JobPosted => "job_posted",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown event type '{s}'"))
    }
}

/// A fact to announce to one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub event_type: EventType,
    pub recipient_email: EmailAddress,
    pub template_context: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl NotificationEvent {
    pub fn new(event_type: EventType, recipient_email: EmailAddress) -> Self {
        Self {
            event_type,
            recipient_email,
            template_context: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    /// Add a template variable.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.template_context.insert(key.into(), value.into());
        self
    }

    /// Add a template variable when a value is present.
    pub fn with_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }
}

/// Delivery state.
///
/// ```text
/// Pending -> InFlight -> Delivered
///                     -> RetryScheduled -> InFlight -> ...
///                     -> FailedTerminal
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DeliveryState {
    /// Queued, waiting for its first attempt
    Pending,
    /// Claimed by a worker; an attempt is running
    InFlight,
    /// Last attempt failed; eligible again at `retry_at`
    RetryScheduled { retry_at: DateTime<Utc>, error: String },
    /// Sent successfully
    Delivered,
    /// Retries exhausted or undeliverable; never attempted again
    FailedTerminal { error: String },
}

/// Field-less view of `DeliveryState` for filtering and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateKind {
    Pending,
    InFlight,
    RetryScheduled,
    Delivered,
    FailedTerminal,
}

impl DeliveryState {
    pub fn kind(&self) -> StateKind {
        match self {
            DeliveryState::Pending => StateKind::Pending,
            DeliveryState::InFlight => StateKind::InFlight,
            DeliveryState::RetryScheduled { .. } => StateKind::RetryScheduled,
            DeliveryState::Delivered => StateKind::Delivered,
            DeliveryState::FailedTerminal { .. } => StateKind::FailedTerminal,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DeliveryState::Delivered | DeliveryState::FailedTerminal { .. })
    }
}

impl StateKind {
    pub fn can_transition_to(self, next: StateKind) -> bool {
        use StateKind::*;
        matches!(
            (self, next),
            (Pending, InFlight)
                | (RetryScheduled, InFlight)
                | (InFlight, Delivered)
                | (InFlight, RetryScheduled)
                | (InFlight, FailedTerminal)
        )
    }
}

/// Record of one send attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub success: bool,
    pub error: Option<String>,
    pub duration_ms: u64,
}

/// A queued notification: the event plus its delivery bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Delivery {
    pub id: DeliveryId,
    pub event: NotificationEvent,
    pub state: DeliveryState,
    pub retry_policy: RetryPolicy,
    /// Attempts started so far
    pub attempt: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub history: Vec<AttemptRecord>,
}

impl Delivery {
    pub fn new(event: NotificationEvent, retry_policy: RetryPolicy) -> Self {
        let now = Utc::now();
        Self {
            id: DeliveryId::new(),
            event,
            state: DeliveryState::Pending,
            retry_policy,
            attempt: 0,
            created_at: now,
            updated_at: now,
            history: Vec::new(),
        }
    }

    /// Whether a worker may claim this delivery at `now`.
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        match &self.state {
            DeliveryState::Pending => true,
            DeliveryState::RetryScheduled { retry_at, .. } => now >= *retry_at,
            _ => false,
        }
    }

    fn transition(&mut self, next: DeliveryState, now: DateTime<Utc>) -> Result<(), StateError> {
        let (from, to) = (self.state.kind(), next.kind());
        if !from.can_transition_to(to) {
            return Err(StateError { from, to });
        }
        self.state = next;
        self.updated_at = now;
        Ok(())
    }

    /// Start an attempt.
    pub fn mark_in_flight(&mut self, now: DateTime<Utc>) -> Result<(), StateError> {
        self.transition(DeliveryState::InFlight, now)?;
        self.attempt += 1;
        Ok(())
    }

    /// Finish the current attempt successfully.
    pub fn mark_delivered(&mut self, started_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<(), StateError> {
        self.transition(DeliveryState::Delivered, now)?;
        self.record(started_at, now, None);
        Ok(())
    }

    /// Finish the current attempt with a failure.
    ///
    /// Schedules a retry after the policy's backoff while attempts remain,
    /// otherwise fails terminally.
    pub fn mark_failed(
        &mut self,
        error: String,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        let next = if self.retry_policy.should_retry(self.attempt) {
            let delay = chrono::Duration::from_std(self.retry_policy.delay_for_attempt(self.attempt))
                .unwrap_or(chrono::Duration::MAX);
            DeliveryState::RetryScheduled {
                retry_at: now.checked_add_signed(delay).unwrap_or(DateTime::<Utc>::MAX_UTC),
                error: error.clone(),
            }
        } else {
            DeliveryState::FailedTerminal { error: error.clone() }
        };

        self.transition(next, now)?;
        self.record(started_at, now, Some(error));
        Ok(())
    }

    /// Fail terminally without retrying (the event can never be delivered).
    pub fn mark_undeliverable(
        &mut self,
        error: String,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<(), StateError> {
        self.transition(DeliveryState::FailedTerminal { error: error.clone() }, now)?;
        self.record(started_at, now, Some(error));
        Ok(())
    }

    fn record(&mut self, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, error: Option<String>) {
        self.history.push(AttemptRecord {
            attempt: self.attempt,
            started_at,
            finished_at,
            success: error.is_none(),
            error,
            duration_ms: (finished_at - started_at).num_milliseconds().max(0) as u64,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn event() -> NotificationEvent {
        NotificationEvent::new(
            EventType::ApplicationStatusChanged,
            EmailAddress::parse("x@y.com").unwrap(),
        )
        .with("job_title", "Backend Engineer")
    }

    #[test]
    fn delivery_lifecycle() {
        let mut delivery = Delivery::new(event(), RetryPolicy::default());
        let now = Utc::now();

        assert_eq!(delivery.state, DeliveryState::Pending);
        assert!(delivery.is_ready(now));

        delivery.mark_in_flight(now).unwrap();
        assert_eq!(delivery.state, DeliveryState::InFlight);
        assert_eq!(delivery.attempt, 1);
        assert!(!delivery.is_ready(now));

        delivery.mark_delivered(now, now).unwrap();
        assert!(delivery.state.is_terminal());
        assert_eq!(delivery.history.len(), 1);
        assert!(delivery.history[0].success);
    }

    #[test]
    fn failures_back_off_then_fail_terminally() {
        let mut delivery = Delivery::new(
            event(),
            RetryPolicy::exponential(3, Duration::from_secs(30), Duration::from_secs(600)),
        );
        let t0 = Utc::now();

        delivery.mark_in_flight(t0).unwrap();
        delivery.mark_failed("smtp 451".to_string(), t0, t0).unwrap();
        let DeliveryState::RetryScheduled { retry_at, .. } = delivery.state.clone() else {
            panic!("expected a scheduled retry, got {:?}", delivery.state);
        };
        assert_eq!(retry_at, t0 + chrono::Duration::seconds(30));
        assert!(!delivery.is_ready(t0 + chrono::Duration::seconds(29)));
        assert!(delivery.is_ready(retry_at));

        let t1 = retry_at;
        delivery.mark_in_flight(t1).unwrap();
        delivery.mark_failed("smtp 451".to_string(), t1, t1).unwrap();
        assert!(matches!(
            delivery.state,
            DeliveryState::RetryScheduled { retry_at, .. } if retry_at == t1 + chrono::Duration::seconds(60)
        ));

        delivery.mark_in_flight(t1).unwrap();
        delivery.mark_failed("smtp 451".to_string(), t1, t1).unwrap();
        assert!(matches!(delivery.state, DeliveryState::FailedTerminal { .. }));
        assert_eq!(delivery.attempt, 3);
        assert_eq!(delivery.history.len(), 3);
    }

    #[test]
    fn terminal_states_reject_transitions() {
        let now = Utc::now();
        let mut delivered = Delivery::new(event(), RetryPolicy::default());
        delivered.mark_in_flight(now).unwrap();
        delivered.mark_delivered(now, now).unwrap();

        assert_eq!(
            delivered.mark_in_flight(now),
            Err(StateError {
                from: StateKind::Delivered,
                to: StateKind::InFlight
            })
        );

        let mut failed = Delivery::new(event(), RetryPolicy::no_retry());
        failed.mark_in_flight(now).unwrap();
        failed.mark_failed("boom".to_string(), now, now).unwrap();
        assert!(failed.mark_in_flight(now).is_err());
        assert!(!failed.is_ready(now + chrono::Duration::days(365)));
    }

    #[test]
    fn attempts_must_start_before_finishing() {
        let now = Utc::now();
        let mut delivery = Delivery::new(event(), RetryPolicy::default());
        assert!(delivery.mark_delivered(now, now).is_err());
        assert!(delivery.mark_failed("x".to_string(), now, now).is_err());
        assert!(delivery.history.is_empty());
    }

    #[test]
    fn event_type_names_round_trip() {
        for event_type in EventType::ALL {
            assert_eq!(event_type.as_str().parse::<EventType>().unwrap(), event_type);
        }
        assert!("newsletter".parse::<EventType>().is_err());
    }

    #[test]
    fn states_serialize_with_a_state_tag() {
        let retry_at = Utc::now();
        let json = serde_json::to_value(DeliveryState::RetryScheduled {
            retry_at,
            error: "smtp down".to_string(),
        })
        .unwrap();
        assert_eq!(json["state"], "retry_scheduled");
        assert_eq!(json["error"], "smtp down");

        let json = serde_json::to_value(DeliveryState::Delivered).unwrap();
        assert_eq!(json, serde_json::json!({ "state": "delivered" }));
    }
}
