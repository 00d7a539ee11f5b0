use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;

use jobboard_core::EmailAddress;
use jobboard_notifications::{
    BuiltinTemplates, DeliveryState, EventType, InMemoryNotificationQueue, MailTransport,
    MemoryTransport, NotificationDispatcher, NotificationEvent, NotificationQueue, OutgoingMail,
    RenderDefaults, RetryPolicy, StateKind, TaskHandle, Template, TemplateStore, TransportError,
    WorkerConfig, WorkerPool,
};

/// Fails the first `failures` sends, then records like `MemoryTransport`.
struct Flaky {
    failures: u32,
    calls: AtomicU32,
    inner: MemoryTransport,
}

impl Flaky {
    fn new(failures: u32) -> Arc<Self> {
        Arc::new(Self {
            failures,
            calls: AtomicU32::new(0),
            inner: MemoryTransport::new(),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MailTransport for Flaky {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            return Err(TransportError::Transient(format!("421 try again ({call})")));
        }
        self.inner.send(mail).await
    }

    fn name(&self) -> &'static str {
        "flaky"
    }
}

/// Blocks every send until a permit is released.
struct Gate {
    permits: Semaphore,
    sent: MemoryTransport,
}

#[async_trait]
impl MailTransport for Gate {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| TransportError::Transient(e.to_string()))?;
        permit.forget();
        self.sent.send(mail).await
    }

    fn name(&self) -> &'static str {
        "gate"
    }
}

struct Slow;

#[async_trait]
impl MailTransport for Slow {
    async fn send(&self, _: &OutgoingMail) -> Result<(), TransportError> {
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "slow"
    }
}

/// Panics on the first send, then records like `MemoryTransport`.
struct PanicsOnce {
    calls: AtomicU32,
    inner: MemoryTransport,
}

#[async_trait]
impl MailTransport for PanicsOnce {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), TransportError> {
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            panic!("transport blew up");
        }
        self.inner.send(mail).await
    }

    fn name(&self) -> &'static str {
        "panics-once"
    }
}

struct NoTemplates;

impl TemplateStore for NoTemplates {
    fn template(&self, _: EventType) -> Option<Template> {
        None
    }
}

fn immediate_retries(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(max_attempts, Duration::ZERO)
}

fn status_changed() -> NotificationEvent {
    NotificationEvent::new(
        EventType::ApplicationStatusChanged,
        EmailAddress::parse("x@y.com").unwrap(),
    )
    .with("job_title", "Backend Engineer")
    .with("status", "accepted")
}

fn config() -> WorkerConfig {
    WorkerConfig::default()
        .with_name("test-worker")
        .with_poll_interval(Duration::from_millis(10))
}

async fn wait_for_terminal(dispatcher: &NotificationDispatcher, id: TaskHandle) -> DeliveryState {
    for _ in 0..500 {
        match dispatcher.status(id).unwrap() {
            Some(state) if state.is_terminal() => return state,
            _ => {}
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("delivery {id:?} did not finish");
}

#[tokio::test]
async fn transient_failures_are_retried_until_delivered() {
    let queue = InMemoryNotificationQueue::arc();
    let dispatcher = NotificationDispatcher::new(queue.clone(), immediate_retries(3));
    let transport = Flaky::new(2);
    let worker = dispatcher.worker(
        transport.clone(),
        Arc::new(BuiltinTemplates),
        RenderDefaults::default(),
        config(),
    );

    let handle = dispatcher.enqueue(status_changed()).unwrap();
    for _ in 0..3 {
        worker.run_once().await.unwrap().unwrap();
    }

    let delivery = queue.get(handle.id).unwrap().unwrap();
    assert_eq!(delivery.state, DeliveryState::Delivered);
    assert_eq!(delivery.attempt, 3);
    assert_eq!(delivery.history.iter().filter(|a| !a.success).count(), 2);
    assert_eq!(transport.calls(), 3);

    let sent = transport.inner.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].subject, "Your application for Backend Engineer is now accepted");
}

#[tokio::test]
async fn exhausted_deliveries_fail_terminally_and_stay_failed() {
    let queue = InMemoryNotificationQueue::arc();
    let dispatcher = NotificationDispatcher::new(queue.clone(), immediate_retries(3));
    let transport = Flaky::new(u32::MAX);
    let worker = dispatcher.worker(
        transport.clone(),
        Arc::new(BuiltinTemplates),
        RenderDefaults::default(),
        config(),
    );

    let handle = dispatcher.enqueue(status_changed()).unwrap();
    for _ in 0..3 {
        worker.run_once().await.unwrap().unwrap();
    }

    let delivery = queue.get(handle.id).unwrap().unwrap();
    assert!(matches!(delivery.state, DeliveryState::FailedTerminal { .. }));
    assert_eq!(delivery.attempt, 3);

    assert!(worker.run_once().await.unwrap().is_none());
    assert_eq!(transport.calls(), 3);
    assert_eq!(queue.stats().unwrap().failed_terminal, 1);
}

#[tokio::test]
async fn enqueue_does_not_wait_for_the_transport() {
    let queue = InMemoryNotificationQueue::arc();
    let dispatcher = NotificationDispatcher::new(queue.clone(), RetryPolicy::default());
    let gate = Arc::new(Gate {
        permits: Semaphore::new(0),
        sent: MemoryTransport::new(),
    });
    let pool = WorkerPool::spawn(
        &dispatcher.worker(gate.clone(), Arc::new(BuiltinTemplates), RenderDefaults::default(), config()),
        1,
    );

    let handle = dispatcher.enqueue(status_changed()).unwrap();

    // The worker picks it up but cannot finish while the gate is closed.
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(dispatcher.status(handle).unwrap(), Some(DeliveryState::InFlight));
    assert!(gate.sent.sent().is_empty());

    gate.permits.add_permits(1);
    assert_eq!(wait_for_terminal(&dispatcher, handle).await, DeliveryState::Delivered);
    assert_eq!(gate.sent.sent().len(), 1);

    let stats = pool.shutdown().await;
    assert_eq!(stats.delivered, 1);
}

#[tokio::test]
async fn a_timeout_counts_as_a_failed_attempt() {
    let queue = InMemoryNotificationQueue::arc();
    let dispatcher = NotificationDispatcher::new(queue.clone(), immediate_retries(2));
    let worker = dispatcher.worker(
        Arc::new(Slow),
        Arc::new(BuiltinTemplates),
        RenderDefaults::default(),
        config().with_send_timeout(Duration::from_millis(20)),
    );

    let handle = dispatcher.enqueue(status_changed()).unwrap();

    let first = worker.run_once().await.unwrap().unwrap();
    let DeliveryState::RetryScheduled { error, .. } = &first.state else {
        panic!("expected a retry, got {:?}", first.state);
    };
    assert!(error.contains("timed out"));

    worker.run_once().await.unwrap().unwrap();
    let delivery = queue.get(handle.id).unwrap().unwrap();
    assert!(matches!(delivery.state, DeliveryState::FailedTerminal { .. }));
    assert_eq!(delivery.attempt, 2);
}

#[tokio::test]
async fn missing_template_fails_without_sending() {
    let queue = InMemoryNotificationQueue::arc();
    let dispatcher = NotificationDispatcher::new(queue.clone(), RetryPolicy::default());
    let transport = Flaky::new(0);
    let worker = dispatcher.worker(
        transport.clone(),
        Arc::new(NoTemplates),
        RenderDefaults::default(),
        config(),
    );

    let handle = dispatcher.enqueue(status_changed()).unwrap();
    let processed = worker.run_once().await.unwrap().unwrap();

    assert_eq!(processed.id, handle.id);
    assert!(matches!(
        processed.state,
        DeliveryState::FailedTerminal { ref error } if error.contains("no template")
    ));
    assert_eq!(processed.attempt, 1);
    assert_eq!(transport.calls(), 0);
    assert!(worker.run_once().await.unwrap().is_none());
}

#[tokio::test]
async fn worker_pool_drains_the_queue_and_shuts_down() {
    let queue = InMemoryNotificationQueue::arc();
    let dispatcher = NotificationDispatcher::new(queue.clone(), immediate_retries(3));
    let transport = Arc::new(MemoryTransport::new());
    let pool = WorkerPool::spawn(
        &dispatcher.worker(transport.clone(), Arc::new(BuiltinTemplates), RenderDefaults::default(), config()),
        3,
    );
    assert_eq!(pool.len(), 3);

    let handles: Vec<_> = (0..10)
        .map(|n| {
            dispatcher
                .enqueue(status_changed().with("job_title", format!("Job {n}")))
                .unwrap()
        })
        .collect();

    for handle in &handles {
        assert_eq!(wait_for_terminal(&dispatcher, *handle).await, DeliveryState::Delivered);
    }

    // Each delivery was sent exactly once.
    assert_eq!(transport.sent().len(), 10);
    assert_eq!(queue.list_by_state(Some(StateKind::Delivered), 100).unwrap().len(), 10);

    let stats = pool.shutdown().await;
    assert_eq!(stats.delivered, 10);
    assert_eq!(stats.processed, 10);
}

#[tokio::test]
async fn a_panicking_send_is_retried_by_the_pool() {
    let queue = InMemoryNotificationQueue::arc();
    let dispatcher = NotificationDispatcher::new(queue.clone(), RetryPolicy::fixed(3, Duration::from_millis(10)));
    let transport = Arc::new(PanicsOnce {
        calls: AtomicU32::new(0),
        inner: MemoryTransport::new(),
    });
    let pool = WorkerPool::spawn(
        &dispatcher.worker(transport.clone(), Arc::new(BuiltinTemplates), RenderDefaults::default(), config()),
        2,
    );

    let handle = dispatcher.enqueue(status_changed()).unwrap();
    assert_eq!(wait_for_terminal(&dispatcher, handle).await, DeliveryState::Delivered);

    let delivery = queue.get(handle.id).unwrap().unwrap();
    assert_eq!(delivery.attempt, 2);
    let first = delivery.history[0].error.as_deref().unwrap();
    assert!(first.contains("panicked"), "{first}");
    assert_eq!(transport.inner.sent().len(), 1);
    assert_eq!(queue.list_by_state(Some(StateKind::InFlight), 10).unwrap().len(), 0);

    // Both workers survived the panic.
    let stats = pool.shutdown().await;
    assert_eq!(stats.processed, 2);
    assert_eq!(stats.delivered, 1);
    assert_eq!(stats.retried, 1);
}
