use std::sync::Arc;
use saleflow_order::{OrderRepository, ReconciliationOrchestrator, ReferenceSource};

use crate::metrics::ApiMetrics;
use crate::worker::AuditSender;

#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<ReconciliationOrchestrator>,
    pub orders: Arc<dyn OrderRepository>,
    pub reference: Arc<dyn ReferenceSource>,
    pub metrics: Arc<ApiMetrics>,
    pub audit: AuditSender,
}
