use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use rust_decimal_macros::dec;
use saleflow_api::{app, metrics::ApiMetrics, worker, AppState};
use saleflow_catalog::{ContractMaterial, MaterialMaster, ReferenceData, UnitConversion};
use saleflow_core::mock::{ScriptedErpGateway, ScriptedPlanningGateway};
use saleflow_order::repository::{InMemoryOrderRepository, InMemoryReferenceSource};
use saleflow_order::{
    OrchestratorConfig, Order, OrderRepository, ReconciliationOrchestrator, RepositoryError,
};
use saleflow_shared::models::events::AuditEvent;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

const CONTRACT: &str = "0040001111";

fn material(code: &str) -> MaterialMaster {
    MaterialMaster {
        material_code: code.to_string(),
        description: format!("{} kraft", code),
        product_group: "K01".to_string(),
        material_group: "PK00".to_string(),
        base_unit: "ROL".to_string(),
        item_category: "ZKSO".to_string(),
        default_over_tolerance: dec!(10),
        default_under_tolerance: dec!(10),
        conversions: vec![UnitConversion {
            unit: "ROL".to_string(),
            kg_per_unit: dec!(400),
        }],
    }
}

fn contract_material(code: &str) -> ContractMaterial {
    ContractMaterial {
        contract_no: CONTRACT.to_string(),
        material_code: code.to_string(),
        plant: "7531".to_string(),
        sales_unit: "TON".to_string(),
        price_per_unit: dec!(1000),
        currency: "THB".to_string(),
        remaining_quantity: dec!(1000),
        over_tolerance: None,
        under_tolerance: None,
    }
}

struct TestApp {
    router: Router,
    orders: Arc<InMemoryOrderRepository>,
    audit_rx: mpsc::Receiver<AuditEvent>,
}

fn test_app(erp: ScriptedErpGateway) -> TestApp {
    let orders = Arc::new(InMemoryOrderRepository::new());
    let (router, audit_rx) = router_with(orders.clone(), erp);
    TestApp {
        router,
        orders,
        audit_rx,
    }
}

fn router_with(orders: Arc<dyn OrderRepository>, erp: ScriptedErpGateway) -> (Router, mpsc::Receiver<AuditEvent>) {
    let reference = ReferenceData::new(CONTRACT)
        .with_material(material("K125"))
        .with_contract_material(contract_material("K125"))
        .with_material(material("K150"))
        .with_contract_material(contract_material("K150"));

    let orchestrator = ReconciliationOrchestrator::new(
        Arc::new(ScriptedPlanningGateway::new()),
        Arc::new(erp),
        OrchestratorConfig::default(),
    );
    let (audit, audit_rx) = worker::audit_channel(64);

    let state = AppState {
        orchestrator: Arc::new(orchestrator),
        orders,
        reference: Arc::new(InMemoryReferenceSource::new().with_contract(reference)),
        metrics: Arc::new(ApiMetrics::new().unwrap()),
        audit,
    };

    (app(state), audit_rx)
}

/// Hands out order numbers but cannot store anything
struct UnwritableOrders;

#[async_trait]
impl OrderRepository for UnwritableOrders {
    async fn get_order(&self, _id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(None)
    }

    async fn save_order(&self, _order: &Order) -> Result<(), RepositoryError> {
        Err(RepositoryError::Storage("disk full".to_string()))
    }

    async fn next_order_number(&self) -> Result<i64, RepositoryError> {
        Ok(1)
    }
}

fn drain(rx: &mut mpsc::Receiver<AuditEvent>) -> Vec<AuditEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

fn create_body(material_code: &str) -> Value {
    json!({
        "header": {
            "channel": "DOMESTIC",
            "sold_to": "0001000123",
            "ship_to": "0001000123",
            "contract_no": CONTRACT,
            "po_no": "PO-2024-001",
            "sales_org": "0750",
            "division": "00",
            "request_date": "2024-05-02",
            "remark": null,
            "currency": "THB"
        },
        "lines": [
            { "materialCode": material_code, "quantity": 2 },
            { "materialCode": "K150", "quantity": 3 }
        ]
    })
}

async fn send(router: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    (status, value)
}

#[tokio::test]
async fn test_create_and_fetch_order() {
    let mut app = test_app(ScriptedErpGateway::new());

    let (status, body) = send(&app.router, "POST", "/v1/orders", Some(create_body("K125"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["duplicateOrder"], false);
    assert_eq!(body["order"]["status"], "RECEIVED");
    assert_eq!(body["order"]["so_no"], "0410000001");
    assert_eq!(body["validationErrors"].as_array().unwrap().len(), 0);

    let order_id = body["order"]["id"].as_str().unwrap().to_string();
    let (status, fetched) = send(&app.router, "GET", &format!("/v1/orders/{}", order_id), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["lines"].as_array().unwrap().len(), 2);
    assert_eq!(fetched["lines"][0]["item_status"], "ITEM_CREATED");

    let first = app.audit_rx.recv().await.unwrap();
    assert!(matches!(first, AuditEvent::OrderReconciled(ref e) if e.final_state == "DONE"));
    let mut commits = 0;
    while let Ok(event) = app.audit_rx.try_recv() {
        if let AuditEvent::AllocationConfirmed(e) = event {
            assert_eq!(e.action, "COMMIT");
            assert_eq!(e.header_code, "0000000001");
            assert_eq!(e.order_id.to_string(), order_id);
            commits += 1;
        }
    }
    assert_eq!(commits, 2);
}

#[tokio::test]
async fn test_unknown_material_is_unprocessable() {
    let app = test_app(ScriptedErpGateway::new());

    let (status, body) = send(&app.router, "POST", "/v1/orders", Some(create_body("X999"))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["validationErrors"][0]["field"], "materialCode");
    assert_eq!(app.orders.len().await, 0);
}

#[tokio::test]
async fn test_unknown_contract_is_unprocessable() {
    let app = test_app(ScriptedErpGateway::new());

    let mut body = create_body("K125");
    body["header"]["contract_no"] = json!("0040009999");
    let (status, body) = send(&app.router, "POST", "/v1/orders", Some(body)).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["validationErrors"][0]["field"], "contractNo");
}

#[tokio::test]
async fn test_erp_outage_is_bad_gateway() {
    let mut app = test_app(ScriptedErpGateway::new().unavailable());

    let (status, body) = send(&app.router, "POST", "/v1/orders", Some(create_body("K125"))).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body["error"].as_str().unwrap().contains("unavailable"));
    assert_eq!(app.orders.len().await, 0);

    // Released reservations are still on the audit trail
    let rollbacks: Vec<_> = drain(&mut app.audit_rx)
        .into_iter()
        .filter_map(|event| match event {
            AuditEvent::AllocationConfirmed(e) => Some(e),
            _ => None,
        })
        .collect();
    assert_eq!(rollbacks.len(), 2);
    assert!(rollbacks.iter().all(|e| e.action == "ROLLBACK" && e.header_code == "0000000001"));

    let (_, metrics) = send(&app.router, "GET", "/metrics", None).await;
    let text = metrics.as_str().unwrap();
    assert!(text.contains(r#"gateway="erp",operation="create_order",outcome="error""#));
}

#[tokio::test]
async fn test_failed_save_emits_no_compensation_events() {
    let (router, mut audit_rx) = router_with(Arc::new(UnwritableOrders), ScriptedErpGateway::new());

    let (status, _) = send(&router, "POST", "/v1/orders", Some(create_body("K125"))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let events = drain(&mut audit_rx);
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], AuditEvent::OrderReconciled(_)));
}

#[tokio::test]
async fn test_being_processed_is_conflict_and_not_saved() {
    let app = test_app(ScriptedErpGateway::new().being_processed());

    let (status, body) = send(&app.router, "POST", "/v1/orders", Some(create_body("K125"))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["duplicateOrder"], true);
    assert_eq!(body["success"], false);
    assert_eq!(app.orders.len().await, 0);
}

#[tokio::test]
async fn test_cancel_every_line_cancels_order() {
    let app = test_app(ScriptedErpGateway::new());

    let (_, created) = send(&app.router, "POST", "/v1/orders", Some(create_body("K125"))).await;
    let order_id = created["order"]["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app.router,
        "POST",
        &format!("/v1/orders/{}/cancel", order_id),
        Some(json!({ "itemNos": [10, 20] })),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["order"]["status"], "CANCELLED");

    let (_, fetched) = send(&app.router, "GET", &format!("/v1/orders/{}", order_id), None).await;
    assert_eq!(fetched["status"], "CANCELLED");
}

#[tokio::test]
async fn test_missing_order_is_not_found() {
    let app = test_app(ScriptedErpGateway::new());

    let (status, _) = send(
        &app.router,
        "GET",
        "/v1/orders/5f0c7a0e-3c7b-4a53-9d1e-0a4c2b8f1e11",
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_health_and_metrics() {
    let app = test_app(ScriptedErpGateway::new());

    let (status, body) = send(&app.router, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    send(&app.router, "POST", "/v1/orders", Some(create_body("K125"))).await;

    let (status, body) = send(&app.router, "GET", "/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    let text = body.as_str().unwrap();
    assert!(text.contains("saleflow_reconciliations_total"));
    assert!(text.contains(r#"gateway="planning""#));
}
