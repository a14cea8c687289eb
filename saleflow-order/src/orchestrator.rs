use chrono::Utc;
use saleflow_catalog::{ReferenceData, TaxTable};
use saleflow_core::erp::{ErpGateway, ErpMessage, ErpOutcome, ErpResponse, ItemMessage, UpdateFlag};
use saleflow_core::planning::{self, ConfirmStatus, PlanningGateway, RequestType, ReturnStatus};
use saleflow_core::GatewayError;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::assembler::{LineRequest, OrderLineAssembler, ValidationError};
use crate::changes::{ChangeError, ChangeHandler, LineChange, SplitPart};
use crate::manager::{OrderManager, TransitionError};
use crate::metrics::CallOutcome;
use crate::models::{ItemStatus, Order, OrderHeader, OrderLine, OrderStatus};
use crate::requests::{self, Submission};
use crate::result::{Compensation, PlanningMessage, ReconcileState, ReconciliationResult};
use crate::status::StatusUpdater;

/// Lines the planning engine does not manage. They go straight to the
/// ERP with their quantity pre-confirmed.
#[derive(Debug, Clone, Default)]
pub struct BypassPolicy {
    pub special_plants: HashSet<String>,
    pub container_item_categories: HashSet<String>,
}

impl BypassPolicy {
    pub fn new<P, C>(special_plants: P, container_item_categories: C) -> Self
    where
        P: IntoIterator<Item = String>,
        C: IntoIterator<Item = String>,
    {
        Self {
            special_plants: special_plants.into_iter().collect(),
            container_item_categories: container_item_categories.into_iter().collect(),
        }
    }

    pub fn skips_planning(&self, line: &OrderLine) -> bool {
        self.special_plants.contains(&line.plant)
            || self.container_item_categories.contains(&line.item_category)
    }
}

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub bypass: BypassPolicy,
    pub tax: TaxTable,
    /// ERP rejection reason used when cancelling lines
    pub reject_reason: String,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            bypass: BypassPolicy::default(),
            tax: TaxTable::default(),
            reject_reason: "93".to_string(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Change(#[from] ChangeError),

    #[error(transparent)]
    Transition(#[from] TransitionError),

    /// Planning or the ERP could not be reached. `result` holds what the
    /// run did up to that point, compensations included.
    #[error("{source}")]
    Gateway {
        source: GatewayError,
        result: Box<ReconciliationResult>,
    },

    #[error("Order {0} has no lines waiting to be submitted")]
    NothingToSubmit(i64),
}

impl ReconcileError {
    fn gateway(source: GatewayError, result: ReconciliationResult) -> Self {
        ReconcileError::Gateway {
            source,
            result: Box::new(result),
        }
    }

    /// The run's partial outcome, when it got far enough to have one
    pub fn partial_result(&self) -> Option<&ReconciliationResult> {
        match self {
            ReconcileError::Gateway { result, .. } => Some(result.as_ref()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OnAccept {
    Confirm,
    Cancel,
}

/// Parameters of one pass through the state machine
struct Run {
    operation: &'static str,
    submissions: Vec<Submission>,
    plan: bool,
    request_type: RequestType,
    on_accept: OnAccept,
    /// Lines as they were before the mutation, for restoring rejected edits
    originals: HashMap<u32, OrderLine>,
}

#[derive(Debug, Default)]
struct Allocation {
    allocated: Vec<u32>,
    bypassed: Vec<u32>,
}

/// Drives an order mutation through planning, ERP and compensation.
///
/// Every operation works on a copy of the order and only writes it back
/// once the run reaches a terminal state. When the ERP reports the
/// document as being processed elsewhere, the caller's order is left as
/// it was.
pub struct ReconciliationOrchestrator {
    planning: Arc<dyn PlanningGateway>,
    erp: Arc<dyn ErpGateway>,
    config: OrchestratorConfig,
    updater: StatusUpdater,
}

impl ReconciliationOrchestrator {
    pub fn new(planning: Arc<dyn PlanningGateway>, erp: Arc<dyn ErpGateway>, config: OrchestratorConfig) -> Self {
        let updater = StatusUpdater::new(config.tax.clone());
        Self {
            planning,
            erp,
            config,
            updater,
        }
    }

    pub fn updater(&self) -> &StatusUpdater {
        &self.updater
    }

    /// Assemble a new order and submit it
    pub async fn create_order(
        &self,
        header: OrderHeader,
        order_number: i64,
        lines: &[LineRequest],
        reference: &ReferenceData,
    ) -> Result<(Order, ReconciliationResult), ReconcileError> {
        let mut order = Order::new(header, order_number);
        let assembled = OrderLineAssembler::new(reference).assemble(&order, lines)?;
        order.add_lines(assembled);
        OrderManager::mark_draft(&mut order)?;

        let result = self.submit_order(&mut order).await?;
        Ok((order, result))
    }

    /// Send every line not yet in the ERP
    pub async fn submit_order(&self, order: &mut Order) -> Result<ReconciliationResult, ReconcileError> {
        Self::ensure_open(order)?;

        let pending = order.pending_lines();
        if pending.is_empty() {
            return Err(ReconcileError::NothingToSubmit(order.order_number));
        }

        let working = order.clone();
        self.run(
            order,
            working,
            Run {
                operation: "submit_order",
                submissions: Self::inserts(&pending),
                plan: true,
                request_type: RequestType::New,
                on_accept: OnAccept::Confirm,
                originals: HashMap::new(),
            },
        )
        .await
    }

    pub async fn add_lines(
        &self,
        order: &mut Order,
        lines: &[LineRequest],
        reference: &ReferenceData,
    ) -> Result<ReconciliationResult, ReconcileError> {
        Self::ensure_open(order)?;

        let mut working = order.clone();
        let assembled = OrderLineAssembler::new(reference).assemble(&working, lines)?;
        working.add_lines(assembled);
        OrderManager::mark_draft(&mut working)?;

        let pending = working.pending_lines();
        self.run(
            order,
            working,
            Run {
                operation: "add_lines",
                submissions: Self::inserts(&pending),
                plan: true,
                request_type: RequestType::New,
                on_accept: OnAccept::Confirm,
                originals: HashMap::new(),
            },
        )
        .await
    }

    pub async fn update_lines(
        &self,
        order: &mut Order,
        changes: &[LineChange],
    ) -> Result<ReconciliationResult, ReconcileError> {
        let mut working = order.clone();
        let originals = ChangeHandler::apply_changes(&mut working, changes)?;
        if working.so_no.is_none() {
            return Ok(self.local_only(order, working));
        }

        let submissions = originals.iter().map(Self::submission_for).collect();
        self.run(
            order,
            working,
            Run {
                operation: "update_lines",
                submissions,
                plan: true,
                request_type: RequestType::Amendment,
                on_accept: OnAccept::Confirm,
                originals: Self::by_item(originals),
            },
        )
        .await
    }

    /// The original line keeps the first part; the others become new lines
    pub async fn split_line(
        &self,
        order: &mut Order,
        item_no: u32,
        parts: &[SplitPart],
    ) -> Result<ReconciliationResult, ReconcileError> {
        let mut working = order.clone();
        let outcome = ChangeHandler::apply_split(&mut working, item_no, parts)?;
        if working.so_no.is_none() {
            return Ok(self.local_only(order, working));
        }

        let mut submissions = vec![Self::submission_for(&outcome.original)];
        submissions.extend(Self::inserts(&outcome.new_items));

        self.run(
            order,
            working,
            Run {
                operation: "split_line",
                submissions,
                plan: true,
                request_type: RequestType::Amendment,
                on_accept: OnAccept::Confirm,
                originals: Self::by_item(vec![outcome.original]),
            },
        )
        .await
    }

    /// Reject lines in the ERP. The planning engine is not involved.
    pub async fn cancel_lines(
        &self,
        order: &mut Order,
        item_nos: &[u32],
    ) -> Result<ReconciliationResult, ReconcileError> {
        let originals = ChangeHandler::check_cancellable(order, item_nos)?;
        let mut working = order.clone();

        // Lines the ERP never saw are cancelled locally
        let (in_erp, local): (Vec<OrderLine>, Vec<OrderLine>) = originals
            .into_iter()
            .partition(|l| working.so_no.is_some() && l.item_status.in_erp());
        for line in &local {
            if let Some(l) = working.line_mut(line.item_no) {
                l.item_status = ItemStatus::Cancelled;
                l.updated_at = Utc::now();
            }
        }
        if in_erp.is_empty() {
            return Ok(self.local_only(order, working));
        }

        let submissions = in_erp
            .iter()
            .map(|l| Submission {
                item_no: l.item_no,
                flag: UpdateFlag::Update,
            })
            .collect();

        self.run(
            order,
            working,
            Run {
                operation: "cancel_lines",
                submissions,
                plan: false,
                request_type: RequestType::Amendment,
                on_accept: OnAccept::Cancel,
                originals: Self::by_item(in_erp),
            },
        )
        .await
    }

    /// `working` already carries the requested edits; `order` is only
    /// replaced by it when the run ends in a state worth keeping.
    async fn run(&self, order: &mut Order, mut working: Order, run: Run) -> Result<ReconciliationResult, ReconcileError> {
        let header_code = planning::header_code(&working.planning_reference());
        let mut result = ReconciliationResult::for_run(working.id, &header_code);

        info!(
            "Reconciling order {} ({}): {} line(s)",
            working.order_number,
            run.operation,
            run.submissions.len()
        );

        let allocation = if run.plan {
            result.enter(ReconcileState::Allocating);
            match self.allocate(&mut working, &run, &header_code, &mut result).await {
                Ok(allocation) => allocation,
                Err(e) => return Err(ReconcileError::gateway(e, result)),
            }
        } else {
            Allocation::default()
        };

        let to_erp: Vec<Submission> = run
            .submissions
            .iter()
            .filter(|s| {
                !run.plan
                    || allocation.allocated.contains(&s.item_no)
                    || allocation.bypassed.contains(&s.item_no)
            })
            .copied()
            .collect();

        if to_erp.is_empty() {
            info!(
                "Order {}: planning allocated none of {} line(s), ERP not called",
                working.order_number,
                run.submissions.len()
            );
            result.enter(ReconcileState::AllocationFailed);
            self.updater.apply(&mut working);
            *order = working;
            return Ok(result);
        }
        if run.plan {
            result.enter(ReconcileState::AllocationOk);
        }

        result.enter(ReconcileState::ErpSaving);
        let item_nos: Vec<u32> = to_erp.iter().map(|s| s.item_no).collect();
        let started = Instant::now();
        let (operation, response) = match &working.so_no {
            None => {
                let request = requests::create_request(&working, &item_nos);
                ("create_order", self.erp.create_order(&request).await)
            }
            Some(so_no) => {
                let reject_reason = (run.on_accept == OnAccept::Cancel).then_some(self.config.reject_reason.as_str());
                let request = requests::change_request(&working, so_no, &to_erp, reject_reason);
                ("change_order", self.erp.change_order(&request).await)
            }
        };

        let response = match response {
            Ok(response) => response,
            Err(e) => {
                result.metrics.record("erp", operation, started, CallOutcome::Error);
                error!("ERP {} failed for order {}: {}", operation, working.order_number, e);
                // Nothing reached the ERP; release what planning holds for us
                self.confirm(&header_code, ConfirmStatus::Rollback, &allocation.allocated, &mut result)
                    .await;
                return Err(ReconcileError::gateway(e, result));
            }
        };

        let outcome = response.interpret();
        let call_outcome = if outcome.success {
            CallOutcome::Ok
        } else {
            CallOutcome::Rejected
        };
        result.metrics.record("erp", operation, started, call_outcome);

        if outcome.is_being_processed {
            warn!(
                "Order {} is being processed by someone else, aborting {}",
                working.order_number, run.operation
            );
            result.being_processed = true;
            result.sap_order_messages = outcome.order_messages;
            result.enter(ReconcileState::ErpBusy);
            return Ok(result);
        }

        result.sap_order_messages = outcome.order_messages.clone();
        result.sap_item_messages = outcome.item_messages.clone();

        let (accepted, rejected) = Self::sort_items(&item_nos, &response, &outcome, &mut result);
        let all_accepted = outcome.success && rejected.is_empty();
        result.enter(if all_accepted {
            ReconcileState::ErpOk
        } else {
            ReconcileState::ErpFailed
        });

        if !accepted.is_empty() && working.so_no.is_none() {
            working.so_no = response.sales_document.clone();
        }
        for item_no in &accepted {
            Self::accept_line(&mut working, *item_no, &response, run.on_accept);
        }
        for item_no in &rejected {
            Self::reject_line(&mut working, *item_no, &run);
        }

        let commit: Vec<u32> = allocation
            .allocated
            .iter()
            .filter(|n| accepted.contains(n))
            .copied()
            .collect();
        let rollback: Vec<u32> = allocation
            .allocated
            .iter()
            .filter(|n| rejected.contains(n))
            .copied()
            .collect();

        if all_accepted {
            result.enter(ReconcileState::CommittingAllocation);
        }
        self.confirm(&header_code, ConfirmStatus::Rollback, &rollback, &mut result)
            .await;
        self.confirm(&header_code, ConfirmStatus::Commit, &commit, &mut result)
            .await;

        if all_accepted {
            if working.status.is_draft() {
                let next = OrderManager::accepted_status(working.channel);
                OrderManager::transition(&mut working, next)?;
            }
            result.success = true;
        }

        self.updater.apply(&mut working);
        result.enter(ReconcileState::Done);

        info!(
            "Order {} {} done: {} accepted, {} rejected, status {}",
            working.order_number,
            run.operation,
            accepted.len(),
            rejected.len(),
            working.status.as_str()
        );

        *order = working;
        Ok(result)
    }

    async fn allocate(
        &self,
        working: &mut Order,
        run: &Run,
        header_code: &str,
        result: &mut ReconciliationResult,
    ) -> Result<Allocation, GatewayError> {
        let mut allocation = Allocation::default();
        let mut to_plan = Vec::new();

        for submission in &run.submissions {
            let Some(line) = working.line_mut(submission.item_no) else {
                continue;
            };
            if self.config.bypass.skips_planning(line) {
                line.confirmed_quantity = line.quantity;
                line.confirmed_date = Some(line.request_date);
                allocation.bypassed.push(submission.item_no);
            } else {
                to_plan.push(submission.item_no);
            }
        }

        if to_plan.is_empty() {
            return Ok(allocation);
        }

        let request = requests::planning_request(working, header_code, &to_plan, run.request_type);
        let started = Instant::now();
        let response = match self.planning.request_allocation(&request).await {
            Ok(response) => {
                result
                    .metrics
                    .record("planning", "request_allocation", started, CallOutcome::Ok);
                response
            }
            Err(e) => {
                result
                    .metrics
                    .record("planning", "request_allocation", started, CallOutcome::Error);
                error!(
                    "Planning allocation failed for order {}: {}",
                    working.order_number, e
                );
                return Err(e);
            }
        };

        for item_no in to_plan {
            match response.line(item_no) {
                Some(line_result) if line_result.return_status.is_allocated() => {
                    if let Some(line) = working.line_mut(item_no) {
                        line.plan.apply(line_result);
                        line.confirmed_quantity = line_result.confirmed_quantity.unwrap_or(line.quantity);
                        line.confirmed_date = line_result.dispatch_date.or(Some(line.request_date));
                    }
                    allocation.allocated.push(item_no);
                }
                Some(line_result) => {
                    if let Some(line) = working.line_mut(item_no) {
                        line.plan.apply(line_result);
                    }
                    result
                        .planning_messages
                        .push(PlanningMessage::from_result(item_no, line_result));
                    Self::reject_line(working, item_no, run);
                }
                None => {
                    result.planning_messages.push(PlanningMessage::missing(item_no));
                    Self::reject_line(working, item_no, run);
                }
            }
        }

        Ok(allocation)
    }

    /// Split submitted items into accepted and rejected. An item counts as
    /// accepted only when echoed in `orderItemsOut` without an item error.
    fn sort_items(
        item_nos: &[u32],
        response: &ErpResponse,
        outcome: &ErpOutcome,
        result: &mut ReconciliationResult,
    ) -> (Vec<u32>, Vec<u32>) {
        let rejected_items = outcome.rejected_items();
        let items_out = response.items_out();
        let mut accepted = Vec::new();
        let mut rejected = Vec::new();

        for item_no in item_nos {
            if outcome.has_order_errors() || rejected_items.contains(item_no) {
                rejected.push(*item_no);
            } else if items_out.contains(item_no) {
                accepted.push(*item_no);
            } else {
                rejected.push(*item_no);
                result.sap_item_messages.push(ItemMessage {
                    item_no: *item_no,
                    message: ErpMessage::error("", "", "Item missing from ERP response", Some(*item_no)),
                });
            }
        }

        (accepted, rejected)
    }

    fn accept_line(working: &mut Order, item_no: u32, response: &ErpResponse, on_accept: OnAccept) {
        let Some(line) = working.line_mut(item_no) else {
            return;
        };

        match on_accept {
            OnAccept::Cancel => line.item_status = ItemStatus::Cancelled,
            OnAccept::Confirm => {
                if let Some(schedule) = response.schedule_out(item_no) {
                    line.confirmed_quantity = schedule.confirm_quantity;
                    if let Some(date) = schedule.confirm_date {
                        line.confirmed_date = Some(date);
                    }
                }
                if !line.item_status.in_erp() {
                    line.item_status = ItemStatus::ItemCreated;
                }
                if line.plan.return_status == Some(ReturnStatus::Tentative)
                    && line.item_status.rank() < ItemStatus::PlanningAllocatedNonConfirm.rank()
                {
                    line.item_status = ItemStatus::PlanningAllocatedNonConfirm;
                }
            }
        }
        line.updated_at = Utc::now();
    }

    /// Lines already in the ERP go back to how they were; anything new is failed
    fn reject_line(working: &mut Order, item_no: u32, run: &Run) {
        let original = run
            .originals
            .get(&item_no)
            .filter(|o| o.item_status.in_erp());

        let Some(line) = working.line_mut(item_no) else {
            return;
        };
        match original {
            Some(original) => *line = original.clone(),
            None => line.mark_failed(),
        }
    }

    /// Commit or roll back planning reservations. Failures never abort the
    /// run; they are logged and reported as warnings.
    async fn confirm(
        &self,
        header_code: &str,
        status: ConfirmStatus,
        item_nos: &[u32],
        result: &mut ReconciliationResult,
    ) {
        if item_nos.is_empty() {
            return;
        }

        let lines = item_nos
            .iter()
            .map(|n| n.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        let request = requests::confirm_request(header_code, status, item_nos);
        let started = Instant::now();

        let acknowledged = match self.planning.confirm_allocation(&request).await {
            Ok(ack) if ack.success => {
                result
                    .metrics
                    .record("planning", "confirm_allocation", started, CallOutcome::Ok);
                true
            }
            Ok(ack) => {
                result
                    .metrics
                    .record("planning", "confirm_allocation", started, CallOutcome::Rejected);
                let reason = ack.message.unwrap_or_default();
                error!(
                    "Planning refused {} of lines {} for {}: {}",
                    status.as_str(),
                    lines,
                    header_code,
                    reason
                );
                result.warning_messages.push(format!(
                    "Planning engine refused {} for lines {}: {}",
                    status.as_str(),
                    lines,
                    reason
                ));
                false
            }
            Err(e) => {
                result
                    .metrics
                    .record("planning", "confirm_allocation", started, CallOutcome::Error);
                error!(
                    "Planning {} of lines {} for {} failed: {}",
                    status.as_str(),
                    lines,
                    header_code,
                    e
                );
                result.warning_messages.push(format!(
                    "Could not {} planning for lines {}: {}",
                    status.as_str(),
                    lines,
                    e
                ));
                false
            }
        };

        result
            .compensations
            .extend(item_nos.iter().map(|item_no| Compensation {
                item_no: *item_no,
                action: status,
                acknowledged,
            }));
    }

    /// Drafts live only here, edits need no external calls
    fn local_only(&self, order: &mut Order, mut working: Order) -> ReconciliationResult {
        self.updater.apply(&mut working);
        *order = working;
        let mut result = ReconciliationResult::new();
        result.success = true;
        result.enter(ReconcileState::Done);
        result
    }

    fn ensure_open(order: &Order) -> Result<(), ChangeError> {
        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::CompletedDelivery) {
            return Err(ChangeError::OrderNotModifiable(order.status.as_str().to_string()));
        }
        Ok(())
    }

    fn inserts(item_nos: &[u32]) -> Vec<Submission> {
        item_nos
            .iter()
            .map(|n| Submission {
                item_no: *n,
                flag: UpdateFlag::Insert,
            })
            .collect()
    }

    fn submission_for(original: &OrderLine) -> Submission {
        Submission {
            item_no: original.item_no,
            flag: if original.item_status.in_erp() {
                UpdateFlag::Update
            } else {
                UpdateFlag::Insert
            },
        }
    }

    fn by_item(lines: Vec<OrderLine>) -> HashMap<u32, OrderLine> {
        lines.into_iter().map(|l| (l.item_no, l)).collect()
    }
}
