//! Service wiring: store, notification dispatcher and delivery workers.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use jobboard_notifications::templates::TemplateError;
use jobboard_notifications::{
    BuiltinTemplates, DeliveryWorker, DirectoryTemplates, InMemoryNotificationQueue, LogTransport,
    MailTransport, MemoryTransport, NotificationDispatcher, TemplateStore, WorkerConfig,
};

use crate::app::store::{InMemoryStore, UnitOfWork};
use crate::config::{AppConfig, MailTransportKind};

/// Shared state behind every handler.
#[derive(Debug)]
pub struct AppServices {
    pub store: InMemoryStore,
    pub notifications: NotificationDispatcher,
    /// Set when the memory transport is configured
    pub outbox: Option<Arc<MemoryTransport>>,
}

impl AppServices {
    /// Commit a unit of work, then enqueue the notifications its events call for.
    ///
    /// Enqueue failures are logged; the mutation has already committed.
    pub fn commit(&self, uow: UnitOfWork<'_>) {
        let events = uow.commit();
        self.notifications.notify_all(&events);
    }
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Templates(#[from] TemplateError),
}

/// Build the services and the (not yet spawned) delivery worker.
pub fn build_services(config: &AppConfig) -> Result<(AppServices, DeliveryWorker), BootstrapError> {
    let queue = InMemoryNotificationQueue::arc();
    let notifications = NotificationDispatcher::new(queue, config.retry.clone());

    let templates: Arc<dyn TemplateStore> = match &config.template_dir {
        Some(dir) => Arc::new(DirectoryTemplates::load(dir)?),
        None => Arc::new(BuiltinTemplates),
    };

    let outbox = match config.mail_transport {
        MailTransportKind::Log => None,
        MailTransportKind::Memory => Some(Arc::new(MemoryTransport::new())),
    };
    let transport: Arc<dyn MailTransport> = match &outbox {
        Some(memory) => memory.clone(),
        None => Arc::new(LogTransport),
    };
    info!(transport = transport.name(), workers = config.workers, "notification delivery configured");

    let mut worker_config = WorkerConfig::default().with_send_timeout(config.send_timeout);
    if let Some(retention) = config.retention {
        worker_config = worker_config.with_retention(retention);
    }
    let worker = notifications.worker(transport, templates, config.render.clone(), worker_config);

    let services = AppServices {
        store: InMemoryStore::new(),
        notifications,
        outbox,
    };
    Ok((services, worker))
}
