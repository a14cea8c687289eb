use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use saleflow_core::planning::{AtpCtp, InquiryMethod, PlanningLineResult, ReturnStatus};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Order status in the lifecycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    PreDraft,
    Draft,
    Confirmed,
    Received,
    PartialDelivery,
    CompletedDelivery,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::PreDraft => "PRE_DRAFT",
            OrderStatus::Draft => "DRAFT",
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Received => "RECEIVED",
            OrderStatus::PartialDelivery => "PARTIAL_DELIVERY",
            OrderStatus::CompletedDelivery => "COMPLETED_DELIVERY",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PRE_DRAFT" => Some(OrderStatus::PreDraft),
            "DRAFT" => Some(OrderStatus::Draft),
            "CONFIRMED" => Some(OrderStatus::Confirmed),
            "RECEIVED" => Some(OrderStatus::Received),
            "PARTIAL_DELIVERY" => Some(OrderStatus::PartialDelivery),
            "COMPLETED_DELIVERY" => Some(OrderStatus::CompletedDelivery),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// Not yet handed to the ERP
    pub fn is_draft(&self) -> bool {
        matches!(self, OrderStatus::PreDraft | OrderStatus::Draft)
    }
}

/// Sales channel the order was captured through
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Channel {
    Domestic,
    Export,
    Customer,
    EoUpload,
    PoUpload,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Domestic => "DOMESTIC",
            Channel::Export => "EXPORT",
            Channel::Customer => "CUSTOMER",
            Channel::EoUpload => "EO_UPLOAD",
            Channel::PoUpload => "PO_UPLOAD",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "DOMESTIC" => Some(Channel::Domestic),
            "EXPORT" => Some(Channel::Export),
            "CUSTOMER" => Some(Channel::Customer),
            "EO_UPLOAD" => Some(Channel::EoUpload),
            "PO_UPLOAD" => Some(Channel::PoUpload),
            _ => None,
        }
    }

    /// ERP sales document type
    pub fn doc_type(&self) -> &'static str {
        match self {
            Channel::Export => "ZEXP",
            _ => "ZOR",
        }
    }

    pub fn distribution_channel(&self) -> &'static str {
        match self {
            Channel::Export => "20",
            _ => "10",
        }
    }

    pub fn transport_method(&self) -> &'static str {
        match self {
            Channel::Export => "Vessel",
            _ => "Truck",
        }
    }

    /// Export sales are zero-rated
    pub fn is_tax_exempt(&self) -> bool {
        matches!(self, Channel::Export)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Locale {
    En,
    Th,
}

/// Line item status. The rank orders planning and production milestones;
/// lines past certain ranks can no longer be edited or cancelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemStatus {
    Draft,
    Failed,
    ItemCreated,
    PlanningUnallocated,
    PlanningAllocatedNonConfirm,
    PlanningConfirm,
    PlanningClose,
    PlanningAllocatedX,
    PlanningOutsourcing,
    Producing,
    FullCommittedOrder,
    CompletedProduction,
    PartialDelivery,
    CompletedDelivery,
    Cancelled,
}

impl ItemStatus {
    pub fn rank(&self) -> u8 {
        match self {
            ItemStatus::Draft | ItemStatus::Failed => 0,
            ItemStatus::ItemCreated => 1,
            ItemStatus::PlanningUnallocated => 2,
            ItemStatus::PlanningAllocatedNonConfirm => 3,
            ItemStatus::PlanningConfirm => 4,
            ItemStatus::PlanningClose => 5,
            ItemStatus::PlanningAllocatedX => 6,
            ItemStatus::PlanningOutsourcing => 7,
            ItemStatus::Producing => 8,
            ItemStatus::FullCommittedOrder => 9,
            ItemStatus::CompletedProduction => 10,
            ItemStatus::PartialDelivery => 11,
            ItemStatus::CompletedDelivery => 12,
            ItemStatus::Cancelled => 13,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Draft => "DRAFT",
            ItemStatus::Failed => "FAILED",
            ItemStatus::ItemCreated => "ITEM_CREATED",
            ItemStatus::PlanningUnallocated => "PLANNING_UNALLOCATED",
            ItemStatus::PlanningAllocatedNonConfirm => "PLANNING_ALLOCATED_NON_CONFIRM",
            ItemStatus::PlanningConfirm => "PLANNING_CONFIRM",
            ItemStatus::PlanningClose => "PLANNING_CLOSE",
            ItemStatus::PlanningAllocatedX => "PLANNING_ALLOCATED_X",
            ItemStatus::PlanningOutsourcing => "PLANNING_OUTSOURCING",
            ItemStatus::Producing => "PRODUCING",
            ItemStatus::FullCommittedOrder => "FULL_COMMITTED_ORDER",
            ItemStatus::CompletedProduction => "COMPLETED_PRODUCTION",
            ItemStatus::PartialDelivery => "PARTIAL_DELIVERY",
            ItemStatus::CompletedDelivery => "COMPLETED_DELIVERY",
            ItemStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        [
            ItemStatus::Draft,
            ItemStatus::Failed,
            ItemStatus::ItemCreated,
            ItemStatus::PlanningUnallocated,
            ItemStatus::PlanningAllocatedNonConfirm,
            ItemStatus::PlanningConfirm,
            ItemStatus::PlanningClose,
            ItemStatus::PlanningAllocatedX,
            ItemStatus::PlanningOutsourcing,
            ItemStatus::Producing,
            ItemStatus::FullCommittedOrder,
            ItemStatus::CompletedProduction,
            ItemStatus::PartialDelivery,
            ItemStatus::CompletedDelivery,
            ItemStatus::Cancelled,
        ]
        .into_iter()
        .find(|s| s.as_str() == value)
    }

    /// The line exists as an item of the ERP sales document
    pub fn in_erp(&self) -> bool {
        !matches!(self, ItemStatus::Draft | ItemStatus::Failed)
    }

    pub fn text(&self, locale: Locale) -> &'static str {
        match (self, locale) {
            (ItemStatus::Draft, Locale::En) => "Draft",
            (ItemStatus::Draft, Locale::Th) => "ร่าง",
            (ItemStatus::Failed, Locale::En) => "Failed",
            (ItemStatus::Failed, Locale::Th) => "ไม่สำเร็จ",
            (ItemStatus::ItemCreated, Locale::En) => "Item Created",
            (ItemStatus::ItemCreated, Locale::Th) => "สร้างรายการ",
            (ItemStatus::PlanningUnallocated, Locale::En) => "Planning (Unallocated)",
            (ItemStatus::PlanningUnallocated, Locale::Th) => "รอวางแผน",
            (ItemStatus::PlanningAllocatedNonConfirm, Locale::En) => "Planning (Allocated Non-confirm)",
            (ItemStatus::PlanningAllocatedNonConfirm, Locale::Th) => "จัดสรรแล้ว (ยังไม่ยืนยัน)",
            (ItemStatus::PlanningConfirm, Locale::En) => "Planning (Confirm)",
            (ItemStatus::PlanningConfirm, Locale::Th) => "ยืนยันแผน",
            (ItemStatus::PlanningClose, Locale::En) => "Planning (Close)",
            (ItemStatus::PlanningClose, Locale::Th) => "ปิดแผน",
            (ItemStatus::PlanningAllocatedX, Locale::En) => "Planning (Allocated X)",
            (ItemStatus::PlanningAllocatedX, Locale::Th) => "จัดสรร X",
            (ItemStatus::PlanningOutsourcing, Locale::En) => "Planning (Outsource)",
            (ItemStatus::PlanningOutsourcing, Locale::Th) => "จ้างผลิตภายนอก",
            (ItemStatus::Producing, Locale::En) => "Producing",
            (ItemStatus::Producing, Locale::Th) => "กำลังผลิต",
            (ItemStatus::FullCommittedOrder, Locale::En) => "Full Committed Order",
            (ItemStatus::FullCommittedOrder, Locale::Th) => "ยืนยันคำสั่งซื้อครบ",
            (ItemStatus::CompletedProduction, Locale::En) => "Completed Production",
            (ItemStatus::CompletedProduction, Locale::Th) => "ผลิตเสร็จสิ้น",
            (ItemStatus::PartialDelivery, Locale::En) => "Partial Delivery",
            (ItemStatus::PartialDelivery, Locale::Th) => "ส่งบางส่วน",
            (ItemStatus::CompletedDelivery, Locale::En) => "Completed Delivery",
            (ItemStatus::CompletedDelivery, Locale::Th) => "ส่งครบ",
            (ItemStatus::Cancelled, Locale::En) => "Cancelled",
            (ItemStatus::Cancelled, Locale::Th) => "ยกเลิก",
        }
    }
}

/// Reasons a line needs a user's attention
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AttentionType {
    /// Confirmed date differs from the request date
    R1,
    /// Confirmed quantity below ordered quantity
    R2,
    /// Planning or ERP rejected the line
    R3,
    /// Planning result is only tentative
    R4,
    /// Past the planning confirmation milestone, no further edits
    R5,
}

/// Planning-engine view of one line
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLinePlan {
    pub inquiry_method: InquiryMethod,
    pub atp_ctp: Option<AtpCtp>,
    pub on_hand_stock: bool,
    pub block_code: Option<String>,
    pub run_code: Option<String>,
    pub paper_machine: Option<String>,
    pub return_status: Option<ReturnStatus>,
    pub return_code: Option<String>,
    pub confirmed_quantity: Option<Decimal>,
    pub dispatch_date: Option<NaiveDate>,
}

impl OrderLinePlan {
    pub fn new(inquiry_method: InquiryMethod) -> Self {
        Self {
            inquiry_method,
            atp_ctp: None,
            on_hand_stock: false,
            block_code: None,
            run_code: None,
            paper_machine: None,
            return_status: None,
            return_code: None,
            confirmed_quantity: None,
            dispatch_date: None,
        }
    }

    pub fn apply(&mut self, result: &PlanningLineResult) {
        self.return_status = Some(result.return_status);
        self.return_code = result.return_code.clone();
        self.confirmed_quantity = result.confirmed_quantity;
        self.dispatch_date = result.dispatch_date;
        self.atp_ctp = result.atp_ctp;
        self.on_hand_stock = result.on_hand_stock;
        self.block_code = result.block_code.clone();
        self.run_code = result.run_code.clone();
        self.paper_machine = result.paper_machine.clone();
    }

    /// Forget the previous planning answer, keeping how we ask
    pub fn reset(&mut self) {
        *self = Self::new(self.inquiry_method);
    }
}

/// An individual material/quantity within an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderLine {
    pub id: Uuid,
    pub item_no: u32,
    pub material_code: String,
    pub material_description: String,
    pub product_group: String,
    pub quantity: Decimal,
    pub sales_unit: String,
    pub kg_per_unit: Decimal,
    pub weight_kg: Decimal,
    pub price_per_unit: Decimal,
    pub net_price: Decimal,
    pub plant: String,
    pub item_category: String,
    pub request_date: NaiveDate,
    pub confirmed_date: Option<NaiveDate>,
    pub confirmed_quantity: Decimal,
    pub over_tolerance: Decimal,
    pub under_tolerance: Decimal,
    pub item_status: ItemStatus,
    pub attention: BTreeSet<AttentionType>,
    pub cart_line_id: Option<Uuid>,
    pub plan: OrderLinePlan,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderLine {
    /// Counts towards totals and can still be acted on
    pub fn is_active(&self) -> bool {
        !matches!(self.item_status, ItemStatus::Failed | ItemStatus::Cancelled)
    }

    /// Change quantity and keep weight and price in step
    pub fn set_quantity(&mut self, quantity: Decimal) {
        self.quantity = quantity;
        self.weight_kg = (quantity * self.kg_per_unit).round_dp(3);
        self.net_price = (quantity * self.price_per_unit).round_dp(2);
        self.updated_at = Utc::now();
    }

    pub fn mark_failed(&mut self) {
        self.item_status = ItemStatus::Failed;
        self.confirmed_quantity = Decimal::ZERO;
        self.confirmed_date = None;
        self.updated_at = Utc::now();
    }
}

/// Header data captured before any line exists
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderHeader {
    pub channel: Channel,
    pub sold_to: String,
    pub ship_to: String,
    pub contract_no: String,
    pub po_no: Option<String>,
    pub sales_org: String,
    pub division: String,
    pub request_date: NaiveDate,
    pub remark: Option<String>,
    pub currency: String,
}

/// A sales order and its lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: Uuid,
    pub order_number: i64,
    pub so_no: Option<String>,
    pub channel: Channel,
    pub status: OrderStatus,
    pub sold_to: String,
    pub ship_to: String,
    pub contract_no: String,
    pub po_no: Option<String>,
    pub sales_org: String,
    pub division: String,
    pub product_group: Option<String>,
    pub request_date: NaiveDate,
    pub remark: Option<String>,
    pub currency: String,
    pub total_price: Decimal,
    pub tax_amount: Decimal,
    pub total_price_inc_tax: Decimal,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(header: OrderHeader, order_number: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number,
            so_no: None,
            channel: header.channel,
            status: OrderStatus::PreDraft,
            sold_to: header.sold_to,
            ship_to: header.ship_to,
            contract_no: header.contract_no,
            po_no: header.po_no,
            sales_org: header.sales_org,
            division: header.division,
            product_group: None,
            request_date: header.request_date,
            remark: header.remark,
            currency: header.currency,
            total_price: Decimal::ZERO,
            tax_amount: Decimal::ZERO,
            total_price_inc_tax: Decimal::ZERO,
            lines: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn line(&self, item_no: u32) -> Option<&OrderLine> {
        self.lines.iter().find(|l| l.item_no == item_no)
    }

    pub fn line_mut(&mut self, item_no: u32) -> Option<&mut OrderLine> {
        self.lines.iter_mut().find(|l| l.item_no == item_no)
    }

    /// Item numbers run 10, 20, 30... and are never reused
    pub fn next_item_no(&self) -> u32 {
        self.lines.iter().map(|l| l.item_no).max().unwrap_or(0) / 10 * 10 + 10
    }

    /// Append assembled lines; the first line fixes the product group
    pub fn add_lines(&mut self, lines: Vec<OrderLine>) {
        if self.product_group.is_none() {
            self.product_group = lines.first().map(|l| l.product_group.clone());
        }
        self.lines.extend(lines);
        self.updated_at = Utc::now();
    }

    /// Lines not yet saved as ERP items and still meant to be
    pub fn pending_lines(&self) -> Vec<u32> {
        self.lines
            .iter()
            .filter(|l| matches!(l.item_status, ItemStatus::Draft | ItemStatus::Failed))
            .map(|l| l.item_no)
            .collect()
    }

    /// Planning header code: the ERP document once known, else the local number
    pub fn planning_reference(&self) -> String {
        self.so_no
            .clone()
            .unwrap_or_else(|| self.order_number.to_string())
    }
}
