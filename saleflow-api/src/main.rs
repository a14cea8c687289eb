use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use saleflow_api::{app, metrics::ApiMetrics, worker, AppState};
use saleflow_core::mock::{ScriptedErpGateway, ScriptedPlanningGateway};
use saleflow_core::{ErpGateway, PlanningGateway};
use saleflow_order::ReconciliationOrchestrator;
use saleflow_store::app_config::Config;
use saleflow_store::{DbClient, EventProducer, HttpErpGateway, HttpPlanningGateway, PgOrderRepository, PgReferenceSource};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "saleflow_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting Saleflow API on port {}", config.server.port);

    // Postgres
    let db = DbClient::new(&config.database.url, config.database.max_connections)
        .await
        .context("Failed to connect to Postgres")?;
    db.migrate().await.context("Failed to run migrations")?;

    // External systems
    let planning: Arc<dyn PlanningGateway> = if config.planning.mock {
        tracing::warn!("Using scripted planning gateway");
        Arc::new(ScriptedPlanningGateway::new())
    } else {
        Arc::new(HttpPlanningGateway::new(&config.planning)?)
    };
    let erp: Arc<dyn ErpGateway> = if config.erp.mock {
        tracing::warn!("Using scripted ERP gateway");
        Arc::new(ScriptedErpGateway::new())
    } else {
        Arc::new(HttpErpGateway::new(&config.erp)?)
    };

    // Audit trail
    let producer = if config.kafka.enabled {
        Some(EventProducer::new(&config.kafka.brokers).context("Failed to create Kafka producer")?)
    } else {
        None
    };
    let (audit, audit_rx) = worker::audit_channel(config.audit.channel_capacity);
    worker::start_audit_worker(audit_rx, producer);

    let orchestrator = ReconciliationOrchestrator::new(planning, erp, config.business_rules.orchestrator_config());

    let app_state = AppState {
        orchestrator: Arc::new(orchestrator),
        orders: Arc::new(PgOrderRepository::new(db.pool.clone())),
        reference: Arc::new(PgReferenceSource::new(db.pool.clone())),
        metrics: Arc::new(ApiMetrics::new()?),
        audit,
    };

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
