use rust_decimal::{Decimal, RoundingStrategy};
use saleflow_catalog::TaxTable;
use saleflow_core::planning::ReturnStatus;
use std::collections::BTreeSet;

use crate::manager::OrderManager;
use crate::models::{AttentionType, ItemStatus, Order, OrderLine, OrderStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Totals {
    pub total_price: Decimal,
    pub tax_amount: Decimal,
    pub total_price_inc_tax: Decimal,
}

/// Recomputes derived order state from its lines: totals, tax,
/// attention flags and delivery-driven order status.
#[derive(Debug, Clone)]
pub struct StatusUpdater {
    tax: TaxTable,
}

impl StatusUpdater {
    pub fn new(tax: TaxTable) -> Self {
        Self { tax }
    }

    /// Safe to call any number of times on the same order
    pub fn apply(&self, order: &mut Order) {
        for line in order.lines.iter_mut() {
            line.attention = Self::attention(line);
        }

        let totals = self.totals(order);
        order.total_price = totals.total_price;
        order.tax_amount = totals.tax_amount;
        order.total_price_inc_tax = totals.total_price_inc_tax;

        Self::sync_order_status(order);
    }

    pub fn totals(&self, order: &Order) -> Totals {
        let total_price: Decimal = order
            .lines
            .iter()
            .filter(|l| l.is_active())
            .map(|l| l.net_price)
            .sum();

        let percent = if order.channel.is_tax_exempt() {
            Decimal::ZERO
        } else {
            self.tax.percent_for(&order.sold_to)
        };
        let tax_amount = (total_price * percent / Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

        Totals {
            total_price,
            tax_amount,
            total_price_inc_tax: total_price + tax_amount,
        }
    }

    pub fn attention(line: &OrderLine) -> BTreeSet<AttentionType> {
        let mut flags = BTreeSet::new();

        match line.item_status {
            ItemStatus::Cancelled | ItemStatus::Draft => return flags,
            ItemStatus::Failed => {
                flags.insert(AttentionType::R3);
                return flags;
            }
            _ => {}
        }

        if line.confirmed_date.is_some_and(|d| d != line.request_date) {
            flags.insert(AttentionType::R1);
        }
        if line.confirmed_quantity < line.quantity {
            flags.insert(AttentionType::R2);
        }
        if line.plan.return_status == Some(ReturnStatus::Tentative) {
            flags.insert(AttentionType::R4);
        }
        if line.item_status.rank() >= ItemStatus::PlanningConfirm.rank() {
            flags.insert(AttentionType::R5);
        }
        flags
    }

    /// Move the order along with its lines' delivery progress
    fn sync_order_status(order: &mut Order) {
        if order.status == OrderStatus::Cancelled {
            return;
        }

        let all_cancelled = !order.lines.is_empty()
            && order.lines.iter().all(|l| l.item_status == ItemStatus::Cancelled);
        if all_cancelled {
            Self::advance(order, OrderStatus::Cancelled);
            return;
        }

        if !matches!(
            order.status,
            OrderStatus::Received | OrderStatus::Confirmed | OrderStatus::PartialDelivery
        ) {
            return;
        }

        let active: Vec<ItemStatus> = order
            .lines
            .iter()
            .filter(|l| l.is_active())
            .map(|l| l.item_status)
            .collect();
        if active.is_empty() {
            return;
        }

        if active.iter().all(|s| *s == ItemStatus::CompletedDelivery) {
            Self::advance(order, OrderStatus::CompletedDelivery);
        } else if active
            .iter()
            .any(|s| matches!(s, ItemStatus::PartialDelivery | ItemStatus::CompletedDelivery))
        {
            Self::advance(order, OrderStatus::PartialDelivery);
        }
    }

    fn advance(order: &mut Order, to: OrderStatus) {
        if OrderManager::can_transition(order.status, to) {
            // Checked above, cannot fail
            let _ = OrderManager::transition(order, to);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, OrderHeader, OrderLinePlan};
    use chrono::{NaiveDate, Utc};
    use rust_decimal_macros::dec;
    use saleflow_core::planning::InquiryMethod;
    use uuid::Uuid;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, day).unwrap()
    }

    fn line(item_no: u32, net_price: Decimal, status: ItemStatus) -> OrderLine {
        let now = Utc::now();
        OrderLine {
            id: Uuid::new_v4(),
            item_no,
            material_code: "K125".to_string(),
            material_description: "KS125".to_string(),
            product_group: "K01".to_string(),
            quantity: dec!(2),
            sales_unit: "TON".to_string(),
            kg_per_unit: dec!(1000),
            weight_kg: dec!(2000),
            price_per_unit: net_price / dec!(2),
            net_price,
            plant: "7531".to_string(),
            item_category: "ZKSO".to_string(),
            request_date: date(2),
            confirmed_date: Some(date(2)),
            confirmed_quantity: dec!(2),
            over_tolerance: dec!(10),
            under_tolerance: dec!(10),
            item_status: status,
            attention: BTreeSet::new(),
            cart_line_id: None,
            plan: OrderLinePlan::new(InquiryMethod::Asap),
            created_at: now,
            updated_at: now,
        }
    }

    fn order(channel: Channel, lines: Vec<OrderLine>) -> Order {
        let mut order = Order::new(
            OrderHeader {
                channel,
                sold_to: "0001000123".to_string(),
                ship_to: "0001000123".to_string(),
                contract_no: "0040001111".to_string(),
                po_no: None,
                sales_org: "0750".to_string(),
                division: "00".to_string(),
                request_date: date(2),
                remark: None,
                currency: "THB".to_string(),
            },
            1,
        );
        order.add_lines(lines);
        order.status = OrderStatus::Received;
        order
    }

    #[test]
    fn test_totals_skip_failed_and_cancelled() {
        let mut order = order(
            Channel::Domestic,
            vec![
                line(10, dec!(1000.10), ItemStatus::ItemCreated),
                line(20, dec!(500), ItemStatus::Failed),
                line(30, dec!(250.05), ItemStatus::ItemCreated),
                line(40, dec!(99), ItemStatus::Cancelled),
            ],
        );
        StatusUpdater::new(TaxTable::default()).apply(&mut order);

        assert_eq!(order.total_price, dec!(1250.15));
        // 87.5105 rounds half-up to 87.51
        assert_eq!(order.tax_amount, dec!(87.51));
        assert_eq!(order.total_price_inc_tax, dec!(1337.66));
    }

    #[test]
    fn test_tax_rounds_half_up() {
        let order = order(Channel::Domestic, vec![line(10, dec!(0.50), ItemStatus::ItemCreated)]);
        // 0.035 -> 0.04
        assert_eq!(StatusUpdater::new(TaxTable::default()).totals(&order).tax_amount, dec!(0.04));
    }

    #[test]
    fn test_export_is_zero_rated() {
        let mut order = order(Channel::Export, vec![line(10, dec!(1000), ItemStatus::ItemCreated)]);
        StatusUpdater::new(TaxTable::default()).apply(&mut order);
        assert_eq!(order.tax_amount, Decimal::ZERO);
        assert_eq!(order.total_price_inc_tax, dec!(1000));
    }

    #[test]
    fn test_attention_flags() {
        let mut late = line(10, dec!(100), ItemStatus::ItemCreated);
        late.confirmed_date = Some(date(9));
        late.confirmed_quantity = dec!(1);
        late.plan.return_status = Some(ReturnStatus::Tentative);
        assert_eq!(
            StatusUpdater::attention(&late),
            BTreeSet::from([AttentionType::R1, AttentionType::R2, AttentionType::R4])
        );

        let failed = line(20, dec!(100), ItemStatus::Failed);
        assert_eq!(StatusUpdater::attention(&failed), BTreeSet::from([AttentionType::R3]));

        let locked = line(30, dec!(100), ItemStatus::PlanningConfirm);
        assert_eq!(StatusUpdater::attention(&locked), BTreeSet::from([AttentionType::R5]));

        let fine = line(40, dec!(100), ItemStatus::ItemCreated);
        assert!(StatusUpdater::attention(&fine).is_empty());
    }

    #[test]
    fn test_apply_is_idempotent() {
        let mut late = line(10, dec!(333.33), ItemStatus::ItemCreated);
        late.confirmed_date = Some(date(9));
        let mut order = order(
            Channel::Domestic,
            vec![late, line(20, dec!(0.07), ItemStatus::PlanningClose)],
        );
        let updater = StatusUpdater::new(TaxTable::default());

        updater.apply(&mut order);
        let first = (
            order.total_price,
            order.tax_amount,
            order.lines.iter().map(|l| l.attention.clone()).collect::<Vec<_>>(),
            order.status,
        );

        for _ in 0..3 {
            updater.apply(&mut order);
        }
        let again = (
            order.total_price,
            order.tax_amount,
            order.lines.iter().map(|l| l.attention.clone()).collect::<Vec<_>>(),
            order.status,
        );
        assert_eq!(first, again);
    }

    #[test]
    fn test_order_status_follows_delivery() {
        let updater = StatusUpdater::new(TaxTable::default());
        let mut order = order(
            Channel::Domestic,
            vec![
                line(10, dec!(1), ItemStatus::PartialDelivery),
                line(20, dec!(1), ItemStatus::Producing),
            ],
        );
        updater.apply(&mut order);
        assert_eq!(order.status, OrderStatus::PartialDelivery);

        for line in order.lines.iter_mut() {
            line.item_status = ItemStatus::CompletedDelivery;
        }
        updater.apply(&mut order);
        assert_eq!(order.status, OrderStatus::CompletedDelivery);
    }

    #[test]
    fn test_all_lines_cancelled_cancels_order() {
        let mut order = order(
            Channel::Domestic,
            vec![
                line(10, dec!(1), ItemStatus::Cancelled),
                line(20, dec!(1), ItemStatus::Cancelled),
            ],
        );
        StatusUpdater::new(TaxTable::default()).apply(&mut order);
        assert_eq!(order.status, OrderStatus::Cancelled);
        assert_eq!(order.total_price, Decimal::ZERO);
    }

    #[test]
    fn test_draft_order_status_untouched() {
        let mut order = order(Channel::Domestic, vec![line(10, dec!(1), ItemStatus::Failed)]);
        order.status = OrderStatus::Draft;
        StatusUpdater::new(TaxTable::default()).apply(&mut order);
        assert_eq!(order.status, OrderStatus::Draft);
    }
}
