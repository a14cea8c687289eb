use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use saleflow_core::erp::{ErpMessage, ItemMessage};
use saleflow_order::changes::{LineChange, SplitPart};
use saleflow_order::result::PlanningMessage;
use saleflow_order::{LineRequest, Order, OrderHeader, ReconcileError, ReconciliationResult};
use saleflow_shared::models::events::{
    AllocationConfirmedEvent, AuditEvent, OrderPersistedEvent, OrderReconciledEvent,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AppError, FieldError};
use crate::state::AppState;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    pub header: OrderHeader,
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddLinesRequest {
    pub lines: Vec<LineRequest>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateLinesRequest {
    pub changes: Vec<LineChange>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitLineRequest {
    pub parts: Vec<SplitPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelLinesRequest {
    pub item_nos: Vec<u32>,
}

/// Outcome of one mutation as the order screens consume it
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub order: Order,
    pub success: bool,
    pub sap_order_messages: Vec<ErpMessage>,
    pub sap_item_messages: Vec<ItemMessage>,
    pub planning_messages: Vec<PlanningMessage>,
    pub warning_messages: Vec<String>,
    pub validation_errors: Vec<FieldError>,
    pub duplicate_order: bool,
}

impl MutationResponse {
    fn new(order: Order, result: ReconciliationResult) -> Self {
        Self {
            order,
            success: result.success,
            sap_order_messages: result.sap_order_messages,
            sap_item_messages: result.sap_item_messages,
            planning_messages: result.planning_messages,
            warning_messages: result.warning_messages,
            validation_errors: Vec::new(),
            duplicate_order: result.being_processed,
        }
    }
}

type MutationReply = Result<(StatusCode, Json<MutationResponse>), AppError>;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/v1/orders", post(create_order))
        .route("/v1/orders/{id}", get(get_order))
        .route("/v1/orders/{id}/submit", post(submit_order))
        .route("/v1/orders/{id}/lines", post(add_lines).patch(update_lines))
        .route("/v1/orders/{id}/lines/{item_no}/split", post(split_line))
        .route("/v1/orders/{id}/cancel", post(cancel_lines))
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /v1/orders/{id}
pub async fn get_order(State(state): State<AppState>, Path(order_id): Path<Uuid>) -> Result<Json<Order>, AppError> {
    Ok(Json(load_order(&state, order_id).await?))
}

/// POST /v1/orders
pub async fn create_order(State(state): State<AppState>, Json(req): Json<CreateOrderRequest>) -> MutationReply {
    let reference = state.reference.load(&req.header.contract_no, &req.lines).await?;
    let order_number = state.orders.next_order_number().await?;

    let outcome = state
        .orchestrator
        .create_order(req.header, order_number, &req.lines, &reference)
        .await;

    match outcome {
        Ok((order, result)) => finish(&state, "create_order", order, result).await,
        Err(err) => Err(abandon(&state, "create_order", err)),
    }
}

/// POST /v1/orders/{id}/submit
pub async fn submit_order(State(state): State<AppState>, Path(order_id): Path<Uuid>) -> MutationReply {
    let mut order = load_order(&state, order_id).await?;
    let outcome = state.orchestrator.submit_order(&mut order).await;
    settle(&state, "submit_order", order, outcome).await
}

/// POST /v1/orders/{id}/lines
pub async fn add_lines(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<AddLinesRequest>,
) -> MutationReply {
    let mut order = load_order(&state, order_id).await?;
    let reference = state.reference.load(&order.contract_no, &req.lines).await?;
    let outcome = state.orchestrator.add_lines(&mut order, &req.lines, &reference).await;
    settle(&state, "add_lines", order, outcome).await
}

/// PATCH /v1/orders/{id}/lines
pub async fn update_lines(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<UpdateLinesRequest>,
) -> MutationReply {
    let mut order = load_order(&state, order_id).await?;
    let outcome = state.orchestrator.update_lines(&mut order, &req.changes).await;
    settle(&state, "update_lines", order, outcome).await
}

/// POST /v1/orders/{id}/lines/{item_no}/split
pub async fn split_line(
    State(state): State<AppState>,
    Path((order_id, item_no)): Path<(Uuid, u32)>,
    Json(req): Json<SplitLineRequest>,
) -> MutationReply {
    let mut order = load_order(&state, order_id).await?;
    let outcome = state.orchestrator.split_line(&mut order, item_no, &req.parts).await;
    settle(&state, "split_line", order, outcome).await
}

/// POST /v1/orders/{id}/cancel
pub async fn cancel_lines(
    State(state): State<AppState>,
    Path(order_id): Path<Uuid>,
    Json(req): Json<CancelLinesRequest>,
) -> MutationReply {
    let mut order = load_order(&state, order_id).await?;
    let outcome = state.orchestrator.cancel_lines(&mut order, &req.item_nos).await;
    settle(&state, "cancel_lines", order, outcome).await
}

// ============================================================================
// Helpers
// ============================================================================

async fn load_order(state: &AppState, order_id: Uuid) -> Result<Order, AppError> {
    state
        .orders
        .get_order(order_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Order not found: {}", order_id)))
}

async fn settle(
    state: &AppState,
    operation: &'static str,
    order: Order,
    outcome: Result<ReconciliationResult, ReconcileError>,
) -> MutationReply {
    match outcome {
        Ok(result) => finish(state, operation, order, result).await,
        Err(err) => Err(abandon(state, operation, err)),
    }
}

/// A run that stopped on an unreachable system still reports the calls
/// it made and the reservations it released or left behind.
fn abandon(state: &AppState, operation: &'static str, err: ReconcileError) -> AppError {
    if let Some(result) = err.partial_result() {
        state.metrics.observe(operation, result);
        if let Some(order_id) = result.order_id {
            emit_compensations(state, order_id, result, Utc::now().timestamp());
        }
    }
    err.into()
}

fn emit_compensations(state: &AppState, order_id: Uuid, result: &ReconciliationResult, timestamp: i64) {
    let header_code = result.header_code.clone().unwrap_or_default();
    for compensation in &result.compensations {
        state.audit.emit(AuditEvent::AllocationConfirmed(AllocationConfirmedEvent {
            order_id,
            header_code: header_code.clone(),
            item_no: compensation.item_no,
            action: compensation.action.as_str().to_string(),
            acknowledged: compensation.acknowledged,
            timestamp,
        }));
    }
}

/// Persist the order unless another session holds the ERP document,
/// then report the run and queue its audit trail.
async fn finish(
    state: &AppState,
    operation: &'static str,
    order: Order,
    result: ReconciliationResult,
) -> MutationReply {
    state.metrics.observe(operation, &result);
    let now = Utc::now().timestamp();

    state.audit.emit(AuditEvent::OrderReconciled(OrderReconciledEvent {
        order_id: order.id,
        order_number: order.order_number,
        so_no: order.so_no.clone(),
        operation: operation.to_string(),
        success: result.success,
        final_state: result.state.as_str().to_string(),
        being_processed: result.being_processed,
        timestamp: now,
    }));

    if result.being_processed {
        tracing::warn!("Order {} is being processed in the ERP, nothing saved", order.order_number);
        return Ok((StatusCode::CONFLICT, Json(MutationResponse::new(order, result))));
    }

    state.orders.save_order(&order).await?;
    emit_compensations(state, order.id, &result, now);

    state.audit.emit(AuditEvent::OrderPersisted(OrderPersistedEvent {
        order_id: order.id,
        status: order.status.as_str().to_string(),
        line_count: order.lines.len(),
        total_price_inc_tax: order.total_price_inc_tax.to_string(),
        timestamp: now,
    }));

    tracing::info!(
        "Order {} {} finished in {} (success: {})",
        order.order_number,
        operation,
        result.state.as_str(),
        result.success
    );

    Ok((StatusCode::OK, Json(MutationResponse::new(order, result))))
}
