use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::gateway::GatewayResult;

/// Message class and number the ERP uses when the document is locked
/// by another user or background job.
pub const BEING_PROCESSED_ID: &str = "V1";
pub const BEING_PROCESSED_NUMBER: &str = "042";

/// Item number as the ERP expects it on the wire ("000010")
pub fn item_no(item_no: u32) -> String {
    format!("{:06}", item_no)
}

pub fn parse_item_no(value: &str) -> Option<u32> {
    value.trim().parse().ok()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum MessageType {
    #[serde(rename = "S")]
    Success,
    #[serde(rename = "E")]
    Error,
    #[serde(rename = "W")]
    Warning,
    #[serde(rename = "I")]
    Info,
    #[serde(rename = "A")]
    Abort,
}

impl MessageType {
    pub fn is_error(self) -> bool {
        matches!(self, MessageType::Error | MessageType::Abort)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErpMessage {
    #[serde(rename = "type")]
    pub message_type: MessageType,
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub number: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub item_no: Option<String>,
}

impl ErpMessage {
    pub fn error(id: &str, number: &str, message: impl Into<String>, item: Option<u32>) -> Self {
        Self {
            message_type: MessageType::Error,
            id: id.to_string(),
            number: number.to_string(),
            message: message.into(),
            item_no: item.map(item_no),
        }
    }

    /// Message code as shown to users, e.g. "V1042"
    pub fn code(&self) -> String {
        format!("{}{}", self.id, self.number)
    }

    pub fn is_being_processed(&self) -> bool {
        (self.id == BEING_PROCESSED_ID && self.number == BEING_PROCESSED_NUMBER)
            || self.message.to_lowercase().contains("currently being processed")
    }

    /// Item the message is attributed to. "000000" addresses the header.
    pub fn item(&self) -> Option<u32> {
        self.item_no
            .as_deref()
            .and_then(parse_item_no)
            .filter(|n| *n != 0)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum UpdateFlag {
    #[serde(rename = "I")]
    Insert,
    #[serde(rename = "U")]
    Update,
    #[serde(rename = "D")]
    Delete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderHeaderIn {
    pub doc_type: String,
    pub sales_org: String,
    pub distribution_channel: String,
    pub division: String,
    pub sold_to: String,
    pub ship_to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub po_no: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_doc: Option<String>,
    pub req_date: NaiveDate,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemIn {
    pub item_no: String,
    pub material: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub target_qty: Decimal,
    pub sales_unit: String,
    pub plant: String,
    pub item_category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ref_doc: Option<String>,
    #[serde(with = "rust_decimal::serde::float")]
    pub over_dlv_tol: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub under_dlv_tol: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_rej: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemInx {
    pub item_no: String,
    #[serde(rename = "updateflag")]
    pub update_flag: UpdateFlag,
    pub target_qty: bool,
    pub plant: bool,
    pub sales_unit: bool,
    pub reason_rej: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderScheduleIn {
    pub item_no: String,
    pub req_date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub req_qty: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    pub confirm_qty: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderText {
    pub item_no: String,
    pub text_id: String,
    pub text_line: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErpCreateRequest {
    pub order_header_in: OrderHeaderIn,
    pub order_items_in: Vec<OrderItemIn>,
    pub order_items_inx: Vec<OrderItemInx>,
    pub order_schedules_in: Vec<OrderScheduleIn>,
    #[serde(default)]
    pub order_texts: Vec<OrderText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErpChangeRequest {
    #[serde(rename = "salesdocumentin")]
    pub sales_document_in: String,
    pub order_header_in: OrderHeaderIn,
    pub order_items_in: Vec<OrderItemIn>,
    pub order_items_inx: Vec<OrderItemInx>,
    pub order_schedules_in: Vec<OrderScheduleIn>,
    #[serde(default)]
    pub order_texts: Vec<OrderText>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItemOut {
    pub item_no: String,
    pub material: String,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub net_value: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderScheduleOut {
    pub item_no: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub confirm_quantity: Decimal,
    #[serde(default)]
    pub confirm_date: Option<NaiveDate>,
    #[serde(default)]
    pub req_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErpResponse {
    #[serde(default, rename = "salesdocument")]
    pub sales_document: Option<String>,
    #[serde(default)]
    pub data: Vec<ErpMessage>,
    #[serde(default)]
    pub order_items_out: Vec<OrderItemOut>,
    #[serde(default)]
    pub order_schedules_out: Vec<OrderScheduleOut>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemMessage {
    pub item_no: u32,
    pub message: ErpMessage,
}

/// An ERP response decomposed into what the orchestrator acts on
#[derive(Debug, Clone, Default)]
pub struct ErpOutcome {
    pub order_messages: Vec<ErpMessage>,
    pub item_messages: Vec<ItemMessage>,
    pub is_being_processed: bool,
    pub success: bool,
}

impl ErpOutcome {
    pub fn has_order_errors(&self) -> bool {
        !self.order_messages.is_empty()
    }

    pub fn rejected_items(&self) -> BTreeSet<u32> {
        self.item_messages.iter().map(|m| m.item_no).collect()
    }
}

impl ErpResponse {
    /// Split messages into order- and item-level errors. Warnings and
    /// success messages are dropped; a lock message wins over everything.
    pub fn interpret(&self) -> ErpOutcome {
        let mut outcome = ErpOutcome::default();

        for msg in &self.data {
            if msg.is_being_processed() {
                outcome.is_being_processed = true;
                outcome.order_messages.push(msg.clone());
                continue;
            }
            if !msg.message_type.is_error() {
                continue;
            }
            match msg.item() {
                Some(item_no) => outcome.item_messages.push(ItemMessage {
                    item_no,
                    message: msg.clone(),
                }),
                None => outcome.order_messages.push(msg.clone()),
            }
        }

        outcome.success = !outcome.is_being_processed
            && outcome.order_messages.is_empty()
            && outcome.item_messages.is_empty();
        outcome
    }

    /// Items the ERP echoed back in `orderItemsOut`
    pub fn items_out(&self) -> BTreeSet<u32> {
        self.order_items_out
            .iter()
            .filter_map(|i| parse_item_no(&i.item_no))
            .collect()
    }

    pub fn schedule_out(&self, item: u32) -> Option<&OrderScheduleOut> {
        self.order_schedules_out
            .iter()
            .find(|s| parse_item_no(&s.item_no) == Some(item))
    }
}

/// Client for the ERP sales-document endpoints behind the integration gateway
#[async_trait]
pub trait ErpGateway: Send + Sync {
    async fn create_order(&self, request: &ErpCreateRequest) -> GatewayResult<ErpResponse>;

    async fn change_order(&self, request: &ErpChangeRequest) -> GatewayResult<ErpResponse>;
}
