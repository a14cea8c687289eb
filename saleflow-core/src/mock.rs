//! Scripted in-process gateways.
//!
//! Used by the `mock` profile of the API and by tests. Both gateways
//! accept everything by default and record every request they receive so
//! callers can assert on exactly what was sent.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::erp::{
    self, ErpChangeRequest, ErpCreateRequest, ErpGateway, ErpMessage, ErpResponse, MessageType,
    OrderItemIn, OrderItemOut, OrderScheduleIn, OrderScheduleOut, UpdateFlag,
};
use crate::gateway::{GatewayError, GatewayResult};
use crate::planning::{
    Acknowledge, AtpCtp, ConfirmRequest, ConfirmStatus, PlanningGateway, PlanningLineResult,
    PlanningRequest, PlanningResponse, PlanningResponseHeader, ReturnStatus,
};

#[derive(Debug, Default)]
struct PlanningScript {
    line_statuses: HashMap<u32, ReturnStatus>,
    unavailable: bool,
    confirm_unavailable: bool,
    requests: Vec<PlanningRequest>,
    confirmations: Vec<ConfirmRequest>,
}

#[derive(Debug, Default)]
pub struct ScriptedPlanningGateway {
    script: Mutex<PlanningScript>,
}

impl ScriptedPlanningGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer `status` for the given item number instead of SUCCESS
    pub fn with_line_status(self, item_no: u32, status: ReturnStatus) -> Self {
        self.script().line_statuses.insert(item_no, status);
        self
    }

    /// Fail every allocation request at the transport level
    pub fn unavailable(self) -> Self {
        self.script().unavailable = true;
        self
    }

    /// Fail every commit/rollback call at the transport level
    pub fn confirm_unavailable(self) -> Self {
        self.script().confirm_unavailable = true;
        self
    }

    pub fn requests(&self) -> Vec<PlanningRequest> {
        self.script().requests.clone()
    }

    pub fn confirmations(&self) -> Vec<ConfirmRequest> {
        self.script().confirmations.clone()
    }

    /// Item numbers confirmed with `status`, one entry per line per call
    pub fn confirmed_lines(&self, status: ConfirmStatus) -> Vec<u32> {
        self.script()
            .confirmations
            .iter()
            .filter(|c| c.status == status)
            .flat_map(|c| c.lines.iter())
            .filter_map(|l| crate::planning::parse_line_number(&l.line_number))
            .collect()
    }

    fn script(&self) -> MutexGuard<'_, PlanningScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PlanningGateway for ScriptedPlanningGateway {
    async fn request_allocation(&self, request: &PlanningRequest) -> GatewayResult<PlanningResponse> {
        let mut script = self.script();
        script.requests.push(request.clone());

        if script.unavailable {
            return Err(GatewayError::Unavailable {
                gateway: "planning",
                message: "scripted outage".to_string(),
            });
        }

        let lines = request
            .lines
            .iter()
            .map(|line| {
                let item_no = crate::planning::parse_line_number(&line.line_number).unwrap_or_default();
                let status = script
                    .line_statuses
                    .get(&item_no)
                    .copied()
                    .unwrap_or(ReturnStatus::Success);
                let allocated = status.is_allocated();

                PlanningLineResult {
                    line_number: line.line_number.clone(),
                    return_status: status,
                    return_code: (!allocated).then(|| "E0102".to_string()),
                    return_code_description: (!allocated)
                        .then(|| format!("No capacity for {} at {}", line.product_code, line.location_code)),
                    confirmed_quantity: allocated.then_some(line.quantity),
                    dispatch_date: allocated.then_some(line.request_date),
                    atp_ctp: allocated.then_some(if status == ReturnStatus::Tentative {
                        AtpCtp::Ctp
                    } else {
                        AtpCtp::Atp
                    }),
                    on_hand_stock: status == ReturnStatus::Success,
                    block_code: None,
                    run_code: None,
                    paper_machine: None,
                }
            })
            .collect();

        Ok(PlanningResponse {
            response_header: PlanningResponseHeader {
                header_code: request.header_code.clone(),
                lines,
            },
        })
    }

    async fn confirm_allocation(&self, request: &ConfirmRequest) -> GatewayResult<Acknowledge> {
        let mut script = self.script();
        script.confirmations.push(request.clone());

        if script.confirm_unavailable {
            return Err(GatewayError::Timeout {
                gateway: "planning",
                timeout_secs: 30,
            });
        }

        Ok(Acknowledge {
            header_code: request.header_code.clone(),
            success: true,
            message: None,
        })
    }
}

#[derive(Debug)]
struct ErpScript {
    rejected_items: HashMap<u32, String>,
    order_error: Option<String>,
    being_processed: bool,
    unavailable: bool,
    next_document: u64,
    created: Vec<ErpCreateRequest>,
    changed: Vec<ErpChangeRequest>,
}

impl Default for ErpScript {
    fn default() -> Self {
        Self {
            rejected_items: HashMap::new(),
            order_error: None,
            being_processed: false,
            unavailable: false,
            next_document: 410_000_001,
            created: Vec::new(),
            changed: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
pub struct ScriptedErpGateway {
    script: Mutex<ErpScript>,
}

impl ScriptedErpGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_item(self, item_no: u32, message: &str) -> Self {
        self.script().rejected_items.insert(item_no, message.to_string());
        self
    }

    pub fn reject_order(self, message: &str) -> Self {
        self.script().order_error = Some(message.to_string());
        self
    }

    pub fn being_processed(self) -> Self {
        self.script().being_processed = true;
        self
    }

    pub fn unavailable(self) -> Self {
        self.script().unavailable = true;
        self
    }

    pub fn created(&self) -> Vec<ErpCreateRequest> {
        self.script().created.clone()
    }

    pub fn changed(&self) -> Vec<ErpChangeRequest> {
        self.script().changed.clone()
    }

    pub fn call_count(&self) -> usize {
        let script = self.script();
        script.created.len() + script.changed.len()
    }

    fn script(&self) -> MutexGuard<'_, ErpScript> {
        self.script.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(
        script: &ErpScript,
        document: &str,
        items: &[OrderItemIn],
        schedules: &[OrderScheduleIn],
        deleted: &HashSet<String>,
    ) -> ErpResponse {
        if script.being_processed {
            return ErpResponse {
                sales_document: None,
                data: vec![ErpMessage::error(
                    erp::BEING_PROCESSED_ID,
                    erp::BEING_PROCESSED_NUMBER,
                    format!("Sales document {} is currently being processed by another user", document),
                    None,
                )],
                ..Default::default()
            };
        }

        if let Some(message) = &script.order_error {
            return ErpResponse {
                sales_document: None,
                data: vec![ErpMessage::error("V4", "219", message.clone(), None)],
                ..Default::default()
            };
        }

        let mut response = ErpResponse {
            sales_document: Some(document.to_string()),
            ..Default::default()
        };

        for item in items {
            let Some(item_no) = erp::parse_item_no(&item.item_no) else {
                continue;
            };
            if let Some(message) = script.rejected_items.get(&item_no) {
                response
                    .data
                    .push(ErpMessage::error("V1", "393", message.clone(), Some(item_no)));
                continue;
            }
            if deleted.contains(&item.item_no) {
                continue;
            }

            response.order_items_out.push(OrderItemOut {
                item_no: item.item_no.clone(),
                material: item.material.clone(),
                net_value: None,
            });
            if let Some(schedule) = schedules.iter().find(|s| s.item_no == item.item_no) {
                response.order_schedules_out.push(OrderScheduleOut {
                    item_no: item.item_no.clone(),
                    confirm_quantity: schedule.confirm_qty,
                    confirm_date: Some(schedule.req_date),
                    req_date: Some(schedule.req_date),
                });
            }
        }

        response.data.push(ErpMessage {
            message_type: MessageType::Success,
            id: "V1".to_string(),
            number: "311".to_string(),
            message: format!("Standard Order {} has been saved", document),
            item_no: None,
        });
        response
    }
}

#[async_trait]
impl ErpGateway for ScriptedErpGateway {
    async fn create_order(&self, request: &ErpCreateRequest) -> GatewayResult<ErpResponse> {
        let mut script = self.script();
        script.created.push(request.clone());

        if script.unavailable {
            return Err(GatewayError::Unavailable {
                gateway: "erp",
                message: "scripted outage".to_string(),
            });
        }

        let document = format!("{:010}", script.next_document);
        let response = Self::respond(
            &script,
            &document,
            &request.order_items_in,
            &request.order_schedules_in,
            &HashSet::new(),
        );
        if response.sales_document.is_some() {
            script.next_document += 1;
        }
        Ok(response)
    }

    async fn change_order(&self, request: &ErpChangeRequest) -> GatewayResult<ErpResponse> {
        let mut script = self.script();
        script.changed.push(request.clone());

        if script.unavailable {
            return Err(GatewayError::Unavailable {
                gateway: "erp",
                message: "scripted outage".to_string(),
            });
        }

        let deleted: HashSet<String> = request
            .order_items_inx
            .iter()
            .filter(|x| x.update_flag == UpdateFlag::Delete)
            .map(|x| x.item_no.clone())
            .collect();

        Ok(Self::respond(
            &script,
            &request.sales_document_in,
            &request.order_items_in,
            &request.order_schedules_in,
            &deleted,
        ))
    }
}
