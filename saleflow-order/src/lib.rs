pub mod models;
pub mod manager;
pub mod assembler;
pub mod changes;
pub mod status;
pub mod metrics;
pub mod result;
pub mod requests;
pub mod orchestrator;
pub mod repository;

pub use models::{Channel, ItemStatus, Order, OrderHeader, OrderLine, OrderStatus};
pub use manager::OrderManager;
pub use assembler::{LineRequest, OrderLineAssembler, ValidationError};
pub use changes::{ChangeError, ChangeHandler, LineChange, SplitPart};
pub use status::StatusUpdater;
pub use metrics::MetricsCollector;
pub use result::{ReconcileState, ReconciliationResult};
pub use orchestrator::{BypassPolicy, OrchestratorConfig, ReconcileError, ReconciliationOrchestrator};
pub use repository::{OrderRepository, ReferenceSource, RepositoryError};
