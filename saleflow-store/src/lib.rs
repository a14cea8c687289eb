pub mod app_config;
pub mod database;
pub mod events;
pub mod http_gateway;
pub mod planning_client;
pub mod erp_client;
pub mod order_repo;
pub mod catalog_repo;

pub use database::DbClient;
pub use events::{EventProducer, PublishError};
pub use planning_client::HttpPlanningGateway;
pub use erp_client::HttpErpGateway;
pub use order_repo::PgOrderRepository;
pub use catalog_repo::PgReferenceSource;
