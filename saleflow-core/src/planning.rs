use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::gateway::GatewayResult;

/// Width of the planning header code (order number, left-padded with zeros)
pub const HEADER_CODE_WIDTH: usize = 10;

pub fn header_code(order_number: &str) -> String {
    format!("{:0>width$}", order_number.trim(), width = HEADER_CODE_WIDTH)
}

pub fn line_number(item_no: u32) -> String {
    item_no.to_string()
}

pub fn parse_line_number(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InquiryMethod {
    /// Earliest possible dispatch
    Asap,
    /// Just in time against the customer's request date
    Jitcp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequestType {
    New,
    Amendment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReturnStatus {
    Success,
    Failure,
    Tentative,
    Unplanned,
}

impl ReturnStatus {
    /// Whether the planning engine holds a reservation for the line.
    /// Every allocated line must later be committed or rolled back.
    pub fn is_allocated(self) -> bool {
        matches!(self, ReturnStatus::Success | ReturnStatus::Tentative)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AtpCtp {
    /// Available to promise (stock on hand or already planned)
    Atp,
    /// Capable to promise (needs a production slot)
    Ctp,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmStatus {
    Commit,
    Rollback,
}

impl ConfirmStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ConfirmStatus::Commit => "COMMIT",
            ConfirmStatus::Rollback => "ROLLBACK",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningRequest {
    pub header_code: String,
    pub sold_to: String,
    pub lines: Vec<PlanningLineRequest>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningLineRequest {
    pub line_number: String,
    pub location_code: String,
    pub product_code: String,
    pub request_date: NaiveDate,
    pub inquiry_method: InquiryMethod,
    #[serde(with = "rust_decimal::serde::float")]
    pub quantity: Decimal,
    pub unit: String,
    pub transport_method: String,
    pub request_type: RequestType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningResponse {
    pub response_header: PlanningResponseHeader,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningResponseHeader {
    pub header_code: String,
    #[serde(default)]
    pub lines: Vec<PlanningLineResult>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanningLineResult {
    pub line_number: String,
    pub return_status: ReturnStatus,
    #[serde(default)]
    pub return_code: Option<String>,
    #[serde(default)]
    pub return_code_description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub confirmed_quantity: Option<Decimal>,
    #[serde(default)]
    pub dispatch_date: Option<NaiveDate>,
    #[serde(default)]
    pub atp_ctp: Option<AtpCtp>,
    #[serde(default)]
    pub on_hand_stock: bool,
    #[serde(default)]
    pub block_code: Option<String>,
    #[serde(default)]
    pub run_code: Option<String>,
    #[serde(default)]
    pub paper_machine: Option<String>,
}

impl PlanningResponse {
    pub fn lines(&self) -> &[PlanningLineResult] {
        &self.response_header.lines
    }

    /// Find the result for an item number. Line numbers are compared
    /// numerically since the engine may echo them zero-padded.
    pub fn line(&self, item_no: u32) -> Option<&PlanningLineResult> {
        self.lines()
            .iter()
            .find(|l| parse_line_number(&l.line_number) == Some(item_no))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmRequest {
    pub header_code: String,
    pub status: ConfirmStatus,
    pub lines: Vec<ConfirmLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmLine {
    pub line_number: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Acknowledge {
    pub header_code: String,
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

/// Client for the external planning engine (ATP/CTP allocation)
#[async_trait]
pub trait PlanningGateway: Send + Sync {
    /// Reserve capacity for every line of one order
    async fn request_allocation(&self, request: &PlanningRequest) -> GatewayResult<PlanningResponse>;

    /// Finalise (COMMIT) or release (ROLLBACK) reservations from a prior allocation
    async fn confirm_allocation(&self, request: &ConfirmRequest) -> GatewayResult<Acknowledge>;
}
