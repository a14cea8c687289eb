//! Builders for the wire requests sent to the planning engine and ERP.

use saleflow_core::erp::{
    self, ErpChangeRequest, ErpCreateRequest, OrderHeaderIn, OrderItemIn, OrderItemInx,
    OrderScheduleIn, OrderText, UpdateFlag,
};
use saleflow_core::planning::{
    self, ConfirmLine, ConfirmRequest, ConfirmStatus, PlanningLineRequest, PlanningRequest,
    RequestType,
};

use crate::models::{Order, OrderLine};

/// ERP text id for the header remark
const REMARK_TEXT_ID: &str = "Z001";

/// A line to send to the ERP and how
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submission {
    pub item_no: u32,
    pub flag: UpdateFlag,
}

pub fn planning_request(order: &Order, header_code: &str, item_nos: &[u32], request_type: RequestType) -> PlanningRequest {
    let lines = item_nos
        .iter()
        .filter_map(|n| order.line(*n))
        .map(|line| PlanningLineRequest {
            line_number: planning::line_number(line.item_no),
            location_code: line.plant.clone(),
            product_code: line.material_code.clone(),
            request_date: line.request_date,
            inquiry_method: line.plan.inquiry_method,
            quantity: line.quantity,
            unit: line.sales_unit.clone(),
            transport_method: order.channel.transport_method().to_string(),
            request_type,
        })
        .collect();

    PlanningRequest {
        header_code: header_code.to_string(),
        sold_to: order.sold_to.clone(),
        lines,
    }
}

pub fn confirm_request(header_code: &str, status: ConfirmStatus, item_nos: &[u32]) -> ConfirmRequest {
    ConfirmRequest {
        header_code: header_code.to_string(),
        status,
        lines: item_nos
            .iter()
            .map(|n| ConfirmLine {
                line_number: planning::line_number(*n),
            })
            .collect(),
    }
}

fn header(order: &Order) -> OrderHeaderIn {
    OrderHeaderIn {
        doc_type: order.channel.doc_type().to_string(),
        sales_org: order.sales_org.clone(),
        distribution_channel: order.channel.distribution_channel().to_string(),
        division: order.division.clone(),
        sold_to: order.sold_to.clone(),
        ship_to: order.ship_to.clone(),
        po_no: order.po_no.clone(),
        ref_doc: Some(order.contract_no.clone()),
        req_date: order.request_date,
        currency: order.currency.clone(),
    }
}

fn item(order: &Order, line: &OrderLine, reason_rej: Option<&str>) -> OrderItemIn {
    OrderItemIn {
        item_no: erp::item_no(line.item_no),
        material: line.material_code.clone(),
        target_qty: line.quantity,
        sales_unit: line.sales_unit.clone(),
        plant: line.plant.clone(),
        item_category: line.item_category.clone(),
        ref_doc: Some(order.contract_no.clone()),
        over_dlv_tol: line.over_tolerance,
        under_dlv_tol: line.under_tolerance,
        reason_rej: reason_rej.map(str::to_string),
    }
}

fn item_x(line: &OrderLine, flag: UpdateFlag, rejecting: bool) -> OrderItemInx {
    OrderItemInx {
        item_no: erp::item_no(line.item_no),
        update_flag: flag,
        target_qty: !rejecting,
        plant: !rejecting,
        sales_unit: flag == UpdateFlag::Insert,
        reason_rej: rejecting,
    }
}

fn schedule(line: &OrderLine) -> OrderScheduleIn {
    OrderScheduleIn {
        item_no: erp::item_no(line.item_no),
        req_date: line.confirmed_date.unwrap_or(line.request_date),
        req_qty: line.quantity,
        confirm_qty: line.confirmed_quantity,
    }
}

fn texts(order: &Order) -> Vec<OrderText> {
    order
        .remark
        .iter()
        .filter(|r| !r.trim().is_empty())
        .map(|remark| OrderText {
            item_no: erp::item_no(0),
            text_id: REMARK_TEXT_ID.to_string(),
            text_line: remark.lines().map(str::to_string).collect(),
        })
        .collect()
}

pub fn create_request(order: &Order, item_nos: &[u32]) -> ErpCreateRequest {
    let lines: Vec<&OrderLine> = item_nos.iter().filter_map(|n| order.line(*n)).collect();

    ErpCreateRequest {
        order_header_in: header(order),
        order_items_in: lines.iter().map(|l| item(order, l, None)).collect(),
        order_items_inx: lines
            .iter()
            .map(|l| item_x(l, UpdateFlag::Insert, false))
            .collect(),
        order_schedules_in: lines.iter().map(|l| schedule(l)).collect(),
        order_texts: texts(order),
    }
}

/// Change request for an existing sales document. With `reject_reason`
/// every submitted line is rejected instead of updated.
pub fn change_request(
    order: &Order,
    sales_document: &str,
    submissions: &[Submission],
    reject_reason: Option<&str>,
) -> ErpChangeRequest {
    let lines: Vec<(&OrderLine, UpdateFlag)> = submissions
        .iter()
        .filter_map(|s| order.line(s.item_no).map(|l| (l, s.flag)))
        .collect();
    let rejecting = reject_reason.is_some();

    ErpChangeRequest {
        sales_document_in: sales_document.to_string(),
        order_header_in: header(order),
        order_items_in: lines
            .iter()
            .map(|(l, _)| item(order, l, reject_reason))
            .collect(),
        order_items_inx: lines
            .iter()
            .map(|(l, flag)| item_x(l, *flag, rejecting))
            .collect(),
        order_schedules_in: if rejecting {
            Vec::new()
        } else {
            lines.iter().map(|(l, _)| schedule(l)).collect()
        },
        order_texts: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, ItemStatus, OrderHeader, OrderLinePlan};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use saleflow_core::planning::InquiryMethod;
    use std::collections::BTreeSet;
    use uuid::Uuid;

    fn order() -> Order {
        let mut order = Order::new(
            OrderHeader {
                channel: Channel::Export,
                sold_to: "0001000123".to_string(),
                ship_to: "0001000124".to_string(),
                contract_no: "0040001111".to_string(),
                po_no: Some("PO-88".to_string()),
                sales_org: "0750".to_string(),
                division: "00".to_string(),
                request_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                remark: Some("Deliver before noon\nGate 3".to_string()),
                currency: "USD".to_string(),
            },
            42,
        );
        let now = Utc::now();
        order.add_lines(vec![OrderLine {
            id: Uuid::new_v4(),
            item_no: 10,
            material_code: "K125".to_string(),
            material_description: "KS125".to_string(),
            product_group: "K01".to_string(),
            quantity: dec!(4),
            sales_unit: "TON".to_string(),
            kg_per_unit: dec!(1000),
            weight_kg: dec!(4000),
            price_per_unit: dec!(600),
            net_price: dec!(2400),
            plant: "7531".to_string(),
            item_category: "ZKSO".to_string(),
            request_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            confirmed_date: NaiveDate::from_ymd_opt(2024, 5, 6),
            confirmed_quantity: dec!(4),
            over_tolerance: dec!(10),
            under_tolerance: dec!(5),
            item_status: ItemStatus::Draft,
            attention: BTreeSet::new(),
            cart_line_id: None,
            plan: OrderLinePlan::new(InquiryMethod::Jitcp),
            created_at: now,
            updated_at: now,
        }]);
        order
    }

    #[test]
    fn test_planning_request() {
        let order = order();
        let request = planning_request(&order, &planning::header_code("42"), &[10], RequestType::New);

        assert_eq!(request.header_code, "0000000042");
        assert_eq!(request.lines.len(), 1);
        assert_eq!(request.lines[0].location_code, "7531");
        assert_eq!(request.lines[0].transport_method, "Vessel");
        assert_eq!(request.lines[0].inquiry_method, InquiryMethod::Jitcp);
    }

    #[test]
    fn test_create_request() {
        let order = order();
        let request = create_request(&order, &[10]);

        assert_eq!(request.order_header_in.doc_type, "ZEXP");
        assert_eq!(request.order_header_in.distribution_channel, "20");
        assert_eq!(request.order_items_in[0].item_no, "000010");
        assert_eq!(request.order_items_inx[0].update_flag, UpdateFlag::Insert);
        assert_eq!(request.order_schedules_in[0].confirm_qty, dec!(4));
        assert_eq!(
            request.order_schedules_in[0].req_date,
            NaiveDate::from_ymd_opt(2024, 5, 6).unwrap()
        );
        assert_eq!(request.order_texts[0].text_line, vec!["Deliver before noon", "Gate 3"]);
    }

    #[test]
    fn test_reject_change_request() {
        let order = order();
        let request = change_request(
            &order,
            "0410000001",
            &[Submission {
                item_no: 10,
                flag: UpdateFlag::Update,
            }],
            Some("93"),
        );

        assert_eq!(request.sales_document_in, "0410000001");
        assert_eq!(request.order_items_in[0].reason_rej.as_deref(), Some("93"));
        assert!(request.order_items_inx[0].reason_rej);
        assert!(!request.order_items_inx[0].target_qty);
        assert!(request.order_schedules_in.is_empty());
    }

    #[test]
    fn test_confirm_request() {
        let request = confirm_request("0000000042", ConfirmStatus::Rollback, &[10, 20]);
        assert_eq!(request.lines.len(), 2);
        assert_eq!(request.lines[1].line_number, "20");
        assert_eq!(request.status, ConfirmStatus::Rollback);
    }
}
