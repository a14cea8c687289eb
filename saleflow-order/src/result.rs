use saleflow_core::erp::{ErpMessage, ItemMessage};
use saleflow_core::planning::{ConfirmStatus, PlanningLineResult, ReturnStatus};
use serde::Serialize;
use uuid::Uuid;

use crate::metrics::MetricsCollector;

/// Steps of one reconciliation run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReconcileState {
    Assembling,
    Allocating,
    AllocationFailed,
    AllocationOk,
    ErpSaving,
    ErpFailed,
    ErpOk,
    ErpBusy,
    CommittingAllocation,
    Done,
}

impl ReconcileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReconcileState::Assembling => "ASSEMBLING",
            ReconcileState::Allocating => "ALLOCATING",
            ReconcileState::AllocationFailed => "ALLOCATION_FAILED",
            ReconcileState::AllocationOk => "ALLOCATION_OK",
            ReconcileState::ErpSaving => "ERP_SAVING",
            ReconcileState::ErpFailed => "ERP_FAILED",
            ReconcileState::ErpOk => "ERP_OK",
            ReconcileState::ErpBusy => "ERP_BUSY",
            ReconcileState::CommittingAllocation => "COMMITTING_ALLOCATION",
            ReconcileState::Done => "DONE",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReconcileState::AllocationFailed | ReconcileState::ErpBusy | ReconcileState::Done
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningMessage {
    pub item_no: u32,
    pub return_status: Option<ReturnStatus>,
    pub return_code: Option<String>,
    pub message: String,
}

impl PlanningMessage {
    pub fn from_result(item_no: u32, result: &PlanningLineResult) -> Self {
        Self {
            item_no,
            return_status: Some(result.return_status),
            return_code: result.return_code.clone(),
            message: result
                .return_code_description
                .clone()
                .unwrap_or_else(|| format!("Planning returned {:?}", result.return_status)),
        }
    }

    pub fn missing(item_no: u32) -> Self {
        Self {
            item_no,
            return_status: None,
            return_code: None,
            message: "No planning result returned for line".to_string(),
        }
    }
}

/// One commit or rollback sent for a line
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Compensation {
    pub item_no: u32,
    pub action: ConfirmStatus,
    pub acknowledged: bool,
}

/// Everything a caller needs to report the outcome of a run
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconciliationResult {
    pub success: bool,
    /// Order the run worked on; unset for runs that stayed local
    pub order_id: Option<Uuid>,
    /// Planning document the reservations and their commit/rollback used
    pub header_code: Option<String>,
    pub state: ReconcileState,
    pub path: Vec<ReconcileState>,
    pub sap_order_messages: Vec<ErpMessage>,
    pub sap_item_messages: Vec<ItemMessage>,
    pub planning_messages: Vec<PlanningMessage>,
    pub warning_messages: Vec<String>,
    pub being_processed: bool,
    pub compensations: Vec<Compensation>,
    #[serde(skip)]
    pub metrics: MetricsCollector,
}

impl Default for ReconciliationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ReconciliationResult {
    pub fn new() -> Self {
        Self {
            success: false,
            order_id: None,
            header_code: None,
            state: ReconcileState::Assembling,
            path: vec![ReconcileState::Assembling],
            sap_order_messages: Vec::new(),
            sap_item_messages: Vec::new(),
            planning_messages: Vec::new(),
            warning_messages: Vec::new(),
            being_processed: false,
            compensations: Vec::new(),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn for_run(order_id: Uuid, header_code: &str) -> Self {
        Self {
            order_id: Some(order_id),
            header_code: Some(header_code.to_string()),
            ..Self::new()
        }
    }

    pub fn enter(&mut self, state: ReconcileState) {
        self.state = state;
        self.path.push(state);
    }

    pub fn passed_through(&self, state: ReconcileState) -> bool {
        self.path.contains(&state)
    }

    /// Item numbers that received `action`, in call order
    pub fn compensated(&self, action: ConfirmStatus) -> Vec<u32> {
        self.compensations
            .iter()
            .filter(|c| c.action == action)
            .map(|c| c.item_no)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_path() {
        let mut result = ReconciliationResult::new();
        result.enter(ReconcileState::Allocating);
        result.enter(ReconcileState::AllocationFailed);

        assert!(result.state.is_terminal());
        assert!(result.passed_through(ReconcileState::Allocating));
        assert!(!result.passed_through(ReconcileState::ErpSaving));
        assert_eq!(result.state.as_str(), "ALLOCATION_FAILED");
    }
}
