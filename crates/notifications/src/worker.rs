//! Delivery workers: render, send, record the outcome, repeat.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{Notify, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::DeliveryError;
use crate::queue::{NotificationQueue, QueueError};
use crate::templates::{RenderDefaults, TemplateStore, render};
use crate::transport::{MailTransport, OutgoingMail};
use crate::types::{Delivery, DeliveryState, NotificationEvent};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Name for logging
    pub name: String,
    /// How often to look for due retries when not woken
    pub poll_interval: Duration,
    /// Upper bound on one transport call
    pub send_timeout: Duration,
    /// How long a claimed delivery may stay `InFlight` before any worker
    /// reclaims it; never shorter than twice `send_timeout`
    pub claim_lease: Duration,
    /// Drop terminal deliveries older than this while idle
    pub retention: Option<Duration>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "notification-worker".to_string(),
            poll_interval: Duration::from_secs(1),
            send_timeout: Duration::from_secs(30),
            claim_lease: Duration::from_secs(120),
            retention: None,
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_claim_lease(mut self, lease: Duration) -> Self {
        self.claim_lease = lease;
        self
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = Some(retention);
        self
    }

    /// Effective lease: an attempt that is still running is never reclaimed.
    pub fn lease(&self) -> Duration {
        self.claim_lease.max(self.send_timeout.saturating_mul(2))
    }
}

/// Worker runtime statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WorkerStats {
    pub processed: u64,
    pub delivered: u64,
    pub retried: u64,
    pub failed_terminal: u64,
    pub uptime_secs: u64,
}

impl WorkerStats {
    fn record(&mut self, delivery: &Delivery) {
        self.processed += 1;
        match delivery.state {
            DeliveryState::Delivered => self.delivered += 1,
            DeliveryState::RetryScheduled { .. } => self.retried += 1,
            DeliveryState::FailedTerminal { .. } => self.failed_terminal += 1,
            DeliveryState::Pending | DeliveryState::InFlight => {}
        }
    }

    fn merge(mut self, other: WorkerStats) -> Self {
        self.processed += other.processed;
        self.delivered += other.delivered;
        self.retried += other.retried;
        self.failed_terminal += other.failed_terminal;
        self.uptime_secs = self.uptime_secs.max(other.uptime_secs);
        self
    }
}

/// Drains a notification queue.
#[derive(Clone)]
pub struct DeliveryWorker {
    queue: Arc<dyn NotificationQueue>,
    transport: Arc<dyn MailTransport>,
    templates: Arc<dyn TemplateStore>,
    defaults: RenderDefaults,
    wake: Arc<Notify>,
    config: WorkerConfig,
}

impl DeliveryWorker {
    pub fn new(
        queue: Arc<dyn NotificationQueue>,
        transport: Arc<dyn MailTransport>,
        templates: Arc<dyn TemplateStore>,
        defaults: RenderDefaults,
        wake: Arc<Notify>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            transport,
            templates,
            defaults,
            wake,
            config,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    fn with_name(&self, name: String) -> Self {
        let mut worker = self.clone();
        worker.config.name = name;
        worker
    }

    /// Render the event's template and send it once, bounded by `send_timeout`.
    pub async fn render_and_send(&self, event: &NotificationEvent) -> Result<(), DeliveryError> {
        let template = self
            .templates
            .template(event.event_type)
            .ok_or(DeliveryError::MissingTemplate(event.event_type))?;

        let context = self.defaults.context_for(&event.template_context);
        let mail = OutgoingMail {
            to: event.recipient_email.to_string(),
            subject: render(&template.subject, &context),
            body: render(&template.body, &context),
        };

        match tokio::time::timeout(self.config.send_timeout, self.transport.send(&mail)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(DeliveryError::Timeout(self.config.send_timeout)),
        }
    }

    /// Run one attempt for a claimed (`InFlight`) delivery and store the outcome.
    ///
    /// The attempt runs on its own task so a panic in rendering or the
    /// transport is recorded as a failed attempt instead of killing the worker.
    pub async fn process(&self, mut delivery: Delivery) -> Result<Delivery, QueueError> {
        let started = Utc::now();
        let attempt = {
            let worker = self.clone();
            let event = delivery.event.clone();
            tokio::spawn(async move { worker.render_and_send(&event).await })
        };
        let result = match attempt.await {
            Ok(result) => result,
            Err(e) => Err(DeliveryError::Panicked(panic_message(e))),
        };
        let finished = Utc::now();

        let transition = match &result {
            Ok(()) => delivery.mark_delivered(started, finished),
            Err(e) if !e.is_retryable() => delivery.mark_undeliverable(e.to_string(), started, finished),
            Err(e) => delivery.mark_failed(e.to_string(), started, finished),
        };
        if let Err(e) = transition {
            error!(
                worker = %self.config.name,
                delivery_id = %delivery.id,
                error = %e,
                "delivery was not in flight"
            );
            return Ok(delivery);
        }

        self.queue.update(&delivery)?;

        match (&delivery.state, result) {
            (DeliveryState::Delivered, _) => info!(
                worker = %self.config.name,
                delivery_id = %delivery.id,
                event_type = %delivery.event.event_type,
                recipient = %delivery.event.recipient_email,
                attempt = delivery.attempt,
                transport = self.transport.name(),
                "notification delivered"
            ),
            (DeliveryState::RetryScheduled { retry_at, .. }, Err(e)) => warn!(
                worker = %self.config.name,
                delivery_id = %delivery.id,
                event_type = %delivery.event.event_type,
                attempt = delivery.attempt,
                max_attempts = delivery.retry_policy.max_attempts,
                retry_at = %retry_at,
                error = %e,
                "notification attempt failed; retry scheduled"
            ),
            (DeliveryState::FailedTerminal { error }, _) => error!(
                worker = %self.config.name,
                delivery_id = %delivery.id,
                event_type = %delivery.event.event_type,
                recipient = %delivery.event.recipient_email,
                attempt = delivery.attempt,
                error = %error,
                "notification failed permanently"
            ),
            _ => {}
        }

        Ok(delivery)
    }

    /// Claim and process the next ready delivery, if any.
    ///
    /// Claims older than the lease are reclaimed first.
    pub async fn run_once(&self) -> Result<Option<Delivery>, QueueError> {
        self.reclaim_stale()?;
        let Some(delivery) = self.queue.claim_next(Utc::now())? else {
            return Ok(None);
        };
        debug!(
            worker = %self.config.name,
            delivery_id = %delivery.id,
            event_type = %delivery.event.event_type,
            attempt = delivery.attempt,
            "claimed delivery"
        );
        self.process(delivery).await.map(Some)
    }

    fn reclaim_stale(&self) -> Result<(), QueueError> {
        let now = Utc::now();
        let lease = chrono::Duration::from_std(self.config.lease()).unwrap_or(chrono::Duration::MAX);
        let Some(claimed_before) = now.checked_sub_signed(lease) else {
            return Ok(());
        };
        let reclaimed = self.queue.reclaim_stale(claimed_before, now)?;
        if reclaimed > 0 {
            warn!(
                worker = %self.config.name,
                reclaimed,
                lease_secs = self.config.lease().as_secs(),
                "reclaimed deliveries whose attempt never finished"
            );
        }
        Ok(())
    }

    fn purge_expired(&self) {
        let Some(retention) = self.config.retention else {
            return;
        };
        let Ok(retention) = chrono::Duration::from_std(retention) else {
            return;
        };
        match self.queue.purge_terminal(Utc::now() - retention) {
            Ok(0) => {}
            Ok(purged) => debug!(worker = %self.config.name, purged, "purged finished deliveries"),
            Err(e) => warn!(worker = %self.config.name, error = %e, "failed to purge finished deliveries"),
        }
    }

    /// Run the worker loop on a tokio task.
    pub fn spawn(self) -> WorkerHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let stats = Arc::new(Mutex::new(WorkerStats::default()));
        let join = tokio::spawn(worker_loop(self, shutdown_rx, stats.clone()));

        WorkerHandle {
            shutdown: shutdown_tx,
            join,
            stats,
        }
    }
}

impl std::fmt::Debug for DeliveryWorker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryWorker")
            .field("config", &self.config)
            .field("transport", &self.transport.name())
            .finish_non_exhaustive()
    }
}

fn panic_message(error: tokio::task::JoinError) -> String {
    if !error.is_panic() {
        return error.to_string();
    }
    let payload = error.into_panic();
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

async fn worker_loop(worker: DeliveryWorker, mut shutdown: watch::Receiver<bool>, stats: Arc<Mutex<WorkerStats>>) {
    info!(worker = %worker.config.name, transport = worker.transport.name(), "notification worker started");
    let started = Instant::now();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let outcome = worker.run_once().await;
        {
            let mut s = stats.lock().unwrap_or_else(PoisonError::into_inner);
            s.uptime_secs = started.elapsed().as_secs();
            if let Ok(Some(delivery)) = &outcome {
                s.record(delivery);
            }
        }

        match outcome {
            // More work may be ready
            Ok(Some(_)) => continue,
            Ok(None) => worker.purge_expired(),
            Err(e) => error!(worker = %worker.config.name, error = %e, "failed to process delivery"),
        }

        tokio::select! {
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = worker.wake.notified() => {}
            _ = tokio::time::sleep(worker.config.poll_interval) => {}
        }
    }

    info!(worker = %worker.config.name, "notification worker stopped");
}

/// Handle to control a running worker.
#[derive(Debug)]
pub struct WorkerHandle {
    shutdown: watch::Sender<bool>,
    join: JoinHandle<()>,
    stats: Arc<Mutex<WorkerStats>>,
}

impl WorkerHandle {
    /// Request graceful shutdown; the attempt in progress is finished first.
    pub async fn shutdown(self) -> WorkerStats {
        let _ = self.shutdown.send(true);
        if let Err(e) = self.join.await {
            error!(error = %e, "notification worker task failed");
        }
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn stats(&self) -> WorkerStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Several workers over one queue.
#[derive(Debug, Default)]
pub struct WorkerPool {
    workers: Vec<WorkerHandle>,
}

impl WorkerPool {
    /// Spawn `size` copies of `worker`, named `<name>-<n>`.
    pub fn spawn(worker: &DeliveryWorker, size: usize) -> Self {
        let workers = (0..size.max(1))
            .map(|n| {
                worker
                    .with_name(format!("{}-{n}", worker.config.name))
                    .spawn()
            })
            .collect();
        Self { workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Combined statistics of all workers.
    pub fn stats(&self) -> WorkerStats {
        self.workers
            .iter()
            .map(WorkerHandle::stats)
            .fold(WorkerStats::default(), WorkerStats::merge)
    }

    pub async fn shutdown(self) -> WorkerStats {
        let mut total = WorkerStats::default();
        for worker in self.workers {
            total = total.merge(worker.shutdown().await);
        }
        total
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use jobboard_core::EmailAddress;

    use super::*;
    use crate::queue::InMemoryNotificationQueue;
    use crate::retry::RetryPolicy;
    use crate::templates::{BuiltinTemplates, Template};
    use crate::transport::{MemoryTransport, TransportError};
    use crate::types::EventType;

    struct NoTemplates;

    impl TemplateStore for NoTemplates {
        fn template(&self, _: EventType) -> Option<Template> {
            None
        }
    }

    struct Rejecting;

    #[async_trait]
    impl MailTransport for Rejecting {
        async fn send(&self, _: &OutgoingMail) -> Result<(), TransportError> {
            Err(TransportError::Permanent("550 mailbox unavailable".to_string()))
        }

        fn name(&self) -> &'static str {
            "rejecting"
        }
    }

    struct Exploding;

    #[async_trait]
    impl MailTransport for Exploding {
        async fn send(&self, _: &OutgoingMail) -> Result<(), TransportError> {
            panic!("relay connection dropped")
        }

        fn name(&self) -> &'static str {
            "exploding"
        }
    }

    fn worker(transport: Arc<dyn MailTransport>, templates: Arc<dyn TemplateStore>) -> DeliveryWorker {
        worker_with(transport, templates, WorkerConfig::default())
    }

    fn worker_with(
        transport: Arc<dyn MailTransport>,
        templates: Arc<dyn TemplateStore>,
        config: WorkerConfig,
    ) -> DeliveryWorker {
        DeliveryWorker::new(
            InMemoryNotificationQueue::arc(),
            transport,
            templates,
            RenderDefaults {
                platform_name: "EaseWork".to_string(),
                support_email: "help@easework.test".to_string(),
            },
            Arc::new(Notify::new()),
            config,
        )
    }

    fn event() -> NotificationEvent {
        NotificationEvent::new(EventType::UserWelcome, EmailAddress::parse("ada@example.com").unwrap())
            .with("first_name", "Ada")
    }

    #[tokio::test]
    async fn render_and_send_fills_in_the_template() {
        let transport = Arc::new(MemoryTransport::new());
        let worker = worker(transport.clone(), Arc::new(BuiltinTemplates));

        worker.render_and_send(&event()).await.unwrap();

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "ada@example.com");
        assert_eq!(sent[0].subject, "Welcome to EaseWork - Find your desired jobs with ease!");
        assert!(sent[0].body.starts_with("Hi Ada,"));
        assert!(sent[0].body.contains("help@easework.test"));
        assert!(!sent[0].body.contains("{{"));
    }

    #[tokio::test]
    async fn missing_template_is_not_retryable() {
        let transport = Arc::new(MemoryTransport::new());
        let worker = worker(transport.clone(), Arc::new(NoTemplates));

        let err = worker.render_and_send(&event()).await.unwrap_err();
        assert_eq!(err, DeliveryError::MissingTemplate(EventType::UserWelcome));
        assert!(!err.is_retryable());
        assert!(transport.sent().is_empty());
    }

    #[tokio::test]
    async fn permanent_rejections_still_retry() {
        let worker = worker(Arc::new(Rejecting), Arc::new(BuiltinTemplates));
        worker
            .queue
            .enqueue(Delivery::new(event(), RetryPolicy::default()))
            .unwrap();

        let processed = worker.run_once().await.unwrap().unwrap();
        assert!(matches!(processed.state, DeliveryState::RetryScheduled { .. }));
        assert!(worker.run_once().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn panicking_transport_is_recorded_as_a_failed_attempt() {
        let worker = worker(Arc::new(Exploding), Arc::new(BuiltinTemplates));
        let id = worker
            .queue
            .enqueue(Delivery::new(event(), RetryPolicy::default()))
            .unwrap();

        let processed = worker.run_once().await.unwrap().unwrap();
        assert!(matches!(processed.state, DeliveryState::RetryScheduled { .. }));
        assert_eq!(processed.attempt, 1);

        let stored = worker.queue.get(id).unwrap().unwrap();
        let error = stored.history[0].error.as_deref().unwrap();
        assert!(error.contains("panicked"), "{error}");
        assert!(error.contains("relay connection dropped"), "{error}");
    }

    #[tokio::test]
    async fn claims_past_the_lease_are_taken_back() {
        let config = WorkerConfig::default()
            .with_send_timeout(Duration::ZERO)
            .with_claim_lease(Duration::ZERO);
        let worker = worker_with(Arc::new(MemoryTransport::new()), Arc::new(BuiltinTemplates), config);
        let id = worker
            .queue
            .enqueue(Delivery::new(event(), RetryPolicy::default()))
            .unwrap();

        // A worker that claimed and then vanished.
        worker.queue.claim_next(Utc::now()).unwrap().unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;

        assert!(worker.run_once().await.unwrap().is_none());
        let stored = worker.queue.get(id).unwrap().unwrap();
        assert!(matches!(stored.state, DeliveryState::RetryScheduled { .. }));
        assert_eq!(stored.attempt, 1);
        assert_eq!(stored.history.len(), 1);
    }

    #[test]
    fn lease_outlasts_the_send_timeout() {
        let config = WorkerConfig::default()
            .with_send_timeout(Duration::from_secs(90))
            .with_claim_lease(Duration::from_secs(60));
        assert_eq!(config.lease(), Duration::from_secs(180));
        assert_eq!(WorkerConfig::default().lease(), Duration::from_secs(120));
    }

    #[test]
    fn stats_merge() {
        let a = WorkerStats {
            processed: 2,
            delivered: 1,
            retried: 1,
            failed_terminal: 0,
            uptime_secs: 5,
        };
        let b = WorkerStats {
            processed: 1,
            failed_terminal: 1,
            uptime_secs: 3,
            ..Default::default()
        };
        let total = a.merge(b);
        assert_eq!(total.processed, 3);
        assert_eq!(total.failed_terminal, 1);
        assert_eq!(total.uptime_secs, 5);
    }
}
