pub mod gateway;
pub mod planning;
pub mod erp;
pub mod mock;

pub use gateway::{GatewayError, GatewayResult};
pub use planning::PlanningGateway;
pub use erp::ErpGateway;
