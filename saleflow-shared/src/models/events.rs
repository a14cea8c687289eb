use uuid::Uuid;

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderReconciledEvent {
    pub order_id: Uuid,
    pub order_number: i64,
    pub so_no: Option<String>,
    pub operation: String,
    pub success: bool,
    pub final_state: String,
    pub being_processed: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct AllocationConfirmedEvent {
    pub order_id: Uuid,
    pub header_code: String,
    pub item_no: u32,
    pub action: String, // COMMIT or ROLLBACK
    pub acknowledged: bool,
    pub timestamp: i64,
}

#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
pub struct OrderPersistedEvent {
    pub order_id: Uuid,
    pub status: String,
    pub line_count: usize,
    pub total_price_inc_tax: String,
    pub timestamp: i64,
}

/// Envelope sent through the audit channel; one Kafka topic per variant.
#[derive(Debug, serde::Serialize, serde::Deserialize, Clone)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEvent {
    OrderReconciled(OrderReconciledEvent),
    AllocationConfirmed(AllocationConfirmedEvent),
    OrderPersisted(OrderPersistedEvent),
}

impl AuditEvent {
    pub fn topic(&self) -> &'static str {
        match self {
            AuditEvent::OrderReconciled(_) => "order.reconciled",
            AuditEvent::AllocationConfirmed(_) => "planning.confirmed",
            AuditEvent::OrderPersisted(_) => "order.persisted",
        }
    }

    pub fn key(&self) -> String {
        match self {
            AuditEvent::OrderReconciled(e) => e.order_id.to_string(),
            AuditEvent::AllocationConfirmed(e) => format!("{}:{}", e.order_id, e.item_no),
            AuditEvent::OrderPersisted(e) => e.order_id.to_string(),
        }
    }
}
