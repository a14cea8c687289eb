use async_trait::async_trait;
use saleflow_catalog::ReferenceData;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::assembler::LineRequest;
use crate::models::Order;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt record for order {order_id}: {message}")]
    Corrupt { order_id: Uuid, message: String },

    #[error("Contract not found: {0}")]
    ContractNotFound(String),
}

/// Persistence for orders, their lines and line plans.
/// `save_order` writes all three as one unit or not at all.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError>;

    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError>;

    async fn next_order_number(&self) -> Result<i64, RepositoryError>;
}

/// Source of the master data the assembler validates against
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    async fn load(&self, contract_no: &str, requests: &[LineRequest]) -> Result<ReferenceData, RepositoryError>;
}

pub struct InMemoryOrderRepository {
    orders: RwLock<HashMap<Uuid, Order>>,
    sequence: AtomicI64,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self {
            orders: RwLock::new(HashMap::new()),
            sequence: AtomicI64::new(0),
        }
    }

    pub async fn len(&self) -> usize {
        self.orders.read().await.len()
    }
}

impl Default for InMemoryOrderRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self.orders.read().await.get(&id).cloned())
    }

    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError> {
        self.orders.write().await.insert(order.id, order.clone());
        Ok(())
    }

    async fn next_order_number(&self) -> Result<i64, RepositoryError> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }
}

/// Fixed master data per contract
#[derive(Default)]
pub struct InMemoryReferenceSource {
    contracts: HashMap<String, ReferenceData>,
}

impl InMemoryReferenceSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_contract(mut self, reference: ReferenceData) -> Self {
        self.contracts.insert(reference.contract_no.clone(), reference);
        self
    }
}

#[async_trait]
impl ReferenceSource for InMemoryReferenceSource {
    async fn load(&self, contract_no: &str, _requests: &[LineRequest]) -> Result<ReferenceData, RepositoryError> {
        self.contracts
            .get(contract_no)
            .cloned()
            .ok_or_else(|| RepositoryError::ContractNotFound(contract_no.to_string()))
    }
}
