use saleflow_shared::models::events::AuditEvent;
use saleflow_store::EventProducer;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Fire-and-forget handle onto the audit channel
#[derive(Clone)]
pub struct AuditSender {
    tx: mpsc::Sender<AuditEvent>,
}

impl AuditSender {
    pub fn new(tx: mpsc::Sender<AuditEvent>) -> Self {
        Self { tx }
    }

    /// Never blocks the request. A full or closed channel drops the event.
    pub fn emit(&self, event: AuditEvent) {
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!("Audit channel full, dropping {} event", event.topic());
            }
            Err(TrySendError::Closed(event)) => {
                warn!("Audit worker stopped, dropping {} event", event.topic());
            }
        }
    }
}

pub fn audit_channel(capacity: usize) -> (AuditSender, mpsc::Receiver<AuditEvent>) {
    let (tx, rx) = mpsc::channel(capacity);
    (AuditSender::new(tx), rx)
}

/// Drain the audit channel into Kafka. Without a producer events are
/// only logged.
pub fn start_audit_worker(mut rx: mpsc::Receiver<AuditEvent>, producer: Option<EventProducer>) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Audit worker started (kafka {})", if producer.is_some() { "enabled" } else { "disabled" });

        while let Some(event) = rx.recv().await {
            match &producer {
                Some(producer) => {
                    if let Err(e) = producer.publish_event(&event).await {
                        error!("Failed to publish audit event {}: {}", event.key(), e);
                    }
                }
                None => debug!("Audit event {} {}", event.topic(), event.key()),
            }
        }

        info!("Audit worker stopped");
    })
}
