use crate::models::{ItemStatus, Order, OrderLine, OrderStatus};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Requested edit to one existing line
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineChange {
    pub item_no: u32,
    #[serde(default)]
    pub quantity: Option<Decimal>,
    #[serde(default)]
    pub request_date: Option<NaiveDate>,
    #[serde(default)]
    pub plant: Option<String>,
}

/// One part of a split. The first part stays on the original line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPart {
    pub quantity: Decimal,
    #[serde(default)]
    pub request_date: Option<NaiveDate>,
}

#[derive(Debug, Clone)]
pub struct SplitOutcome {
    pub original: OrderLine,
    pub new_items: Vec<u32>,
}

/// Validates and applies line edits, splits and cancellations
pub struct ChangeHandler;

impl ChangeHandler {
    /// Apply quantity/date/plant edits. Every change is validated before
    /// any is applied. Returns the lines as they were before the edit.
    pub fn apply_changes(order: &mut Order, changes: &[LineChange]) -> Result<Vec<OrderLine>, ChangeError> {
        Self::ensure_modifiable(order)?;
        Self::ensure_distinct(changes.iter().map(|c| c.item_no))?;

        let mut originals = Vec::with_capacity(changes.len());
        for change in changes {
            let line = Self::editable_line(order, change.item_no)?;

            if change.quantity.is_none() && change.request_date.is_none() && change.plant.is_none() {
                return Err(ChangeError::NothingToChange(change.item_no));
            }
            if let Some(quantity) = change.quantity {
                if quantity <= Decimal::ZERO {
                    return Err(ChangeError::InvalidQuantity {
                        item_no: change.item_no,
                        quantity,
                    });
                }
            }
            originals.push(line.clone());
        }

        for change in changes {
            let Some(line) = order.line_mut(change.item_no) else {
                continue;
            };
            if let Some(quantity) = change.quantity {
                line.set_quantity(quantity);
            }
            if let Some(date) = change.request_date {
                line.request_date = date;
            }
            if let Some(plant) = &change.plant {
                line.plant = plant.clone();
            }
            line.plan.reset();
            line.updated_at = Utc::now();
        }
        order.updated_at = Utc::now();

        Ok(originals)
    }

    /// Split one line into several. Part quantities must add up to the
    /// line's quantity.
    pub fn apply_split(order: &mut Order, item_no: u32, parts: &[SplitPart]) -> Result<SplitOutcome, ChangeError> {
        Self::ensure_modifiable(order)?;
        let original = Self::editable_line(order, item_no)?.clone();

        if parts.len() < 2 {
            return Err(ChangeError::InvalidSplit {
                item_no,
                reason: "at least two parts are required".to_string(),
            });
        }
        if let Some(part) = parts.iter().find(|p| p.quantity <= Decimal::ZERO) {
            return Err(ChangeError::InvalidQuantity {
                item_no,
                quantity: part.quantity,
            });
        }
        let total: Decimal = parts.iter().map(|p| p.quantity).sum();
        if total != original.quantity {
            return Err(ChangeError::InvalidSplit {
                item_no,
                reason: format!("parts add up to {}, line has {}", total, original.quantity),
            });
        }

        let mut next_item_no = order.next_item_no();
        let mut new_lines = Vec::with_capacity(parts.len() - 1);
        for part in &parts[1..] {
            let mut line = original.clone();
            line.id = Uuid::new_v4();
            line.item_no = next_item_no;
            line.set_quantity(part.quantity);
            line.request_date = part.request_date.unwrap_or(original.request_date);
            line.item_status = ItemStatus::Draft;
            line.confirmed_quantity = Decimal::ZERO;
            line.confirmed_date = None;
            line.attention.clear();
            line.cart_line_id = None;
            line.plan.reset();
            line.created_at = Utc::now();
            new_lines.push(line);
            next_item_no += 10;
        }

        if let Some(line) = order.line_mut(item_no) {
            line.set_quantity(parts[0].quantity);
            if let Some(date) = parts[0].request_date {
                line.request_date = date;
            }
            line.plan.reset();
        }

        let new_items = new_lines.iter().map(|l| l.item_no).collect();
        order.lines.extend(new_lines);
        order.updated_at = Utc::now();

        Ok(SplitOutcome { original, new_items })
    }

    /// Check every line can be cancelled; returns their current state
    pub fn check_cancellable(order: &Order, item_nos: &[u32]) -> Result<Vec<OrderLine>, ChangeError> {
        Self::ensure_modifiable(order)?;
        Self::ensure_distinct(item_nos.iter().copied())?;

        item_nos
            .iter()
            .map(|item_no| {
                let line = Self::active_line(order, *item_no)?;
                if !Self::is_cancellable(line) {
                    return Err(ChangeError::ItemLocked {
                        item_no: *item_no,
                        status: line.item_status.as_str().to_string(),
                    });
                }
                Ok(line.clone())
            })
            .collect()
    }

    /// Quantity, date and plant can change before planning confirmation
    pub fn is_editable(line: &OrderLine) -> bool {
        line.is_active() && line.item_status.rank() < ItemStatus::PlanningConfirm.rank()
    }

    /// Nothing can be cancelled once production has started
    pub fn is_cancellable(line: &OrderLine) -> bool {
        line.is_active() && line.item_status.rank() < ItemStatus::Producing.rank()
    }

    fn ensure_modifiable(order: &Order) -> Result<(), ChangeError> {
        if matches!(order.status, OrderStatus::Cancelled | OrderStatus::CompletedDelivery) {
            return Err(ChangeError::OrderNotModifiable(order.status.as_str().to_string()));
        }
        Ok(())
    }

    /// Each line may appear once per request
    fn ensure_distinct(item_nos: impl IntoIterator<Item = u32>) -> Result<(), ChangeError> {
        let mut seen = HashSet::new();
        for item_no in item_nos {
            if !seen.insert(item_no) {
                return Err(ChangeError::DuplicateItem(item_no));
            }
        }
        Ok(())
    }

    fn active_line(order: &Order, item_no: u32) -> Result<&OrderLine, ChangeError> {
        let line = order.line(item_no).ok_or(ChangeError::ItemNotFound(item_no))?;
        if !line.is_active() {
            return Err(ChangeError::ItemNotActive(item_no));
        }
        Ok(line)
    }

    fn editable_line(order: &Order, item_no: u32) -> Result<&OrderLine, ChangeError> {
        let line = Self::active_line(order, item_no)?;
        if !Self::is_editable(line) {
            return Err(ChangeError::ItemLocked {
                item_no,
                status: line.item_status.as_str().to_string(),
            });
        }
        Ok(line)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ChangeError {
    #[error("Order not modifiable in status {0}")]
    OrderNotModifiable(String),

    #[error("Item not found: {0}")]
    ItemNotFound(u32),

    #[error("Item not active: {0}")]
    ItemNotActive(u32),

    #[error("Item {item_no} is locked in status {status}")]
    ItemLocked { item_no: u32, status: String },

    #[error("Item {0} appears more than once in the request")]
    DuplicateItem(u32),

    #[error("Nothing to change on item {0}")]
    NothingToChange(u32),

    #[error("Quantity for item {item_no} must be positive, got {quantity}")]
    InvalidQuantity { item_no: u32, quantity: Decimal },

    #[error("Cannot split item {item_no}: {reason}")]
    InvalidSplit { item_no: u32, reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, OrderHeader, OrderLinePlan};
    use rust_decimal_macros::dec;
    use saleflow_core::planning::InquiryMethod;
    use std::collections::BTreeSet;

    fn line(item_no: u32, quantity: Decimal, status: ItemStatus) -> OrderLine {
        let now = Utc::now();
        let mut line = OrderLine {
            id: Uuid::new_v4(),
            item_no,
            material_code: "K125".to_string(),
            material_description: "KS125".to_string(),
            product_group: "K01".to_string(),
            quantity: Decimal::ZERO,
            sales_unit: "TON".to_string(),
            kg_per_unit: dec!(1000),
            weight_kg: Decimal::ZERO,
            price_per_unit: dec!(100),
            net_price: Decimal::ZERO,
            plant: "7531".to_string(),
            item_category: "ZKSO".to_string(),
            request_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            confirmed_date: None,
            confirmed_quantity: Decimal::ZERO,
            over_tolerance: dec!(10),
            under_tolerance: dec!(10),
            item_status: status,
            attention: BTreeSet::new(),
            cart_line_id: None,
            plan: OrderLinePlan::new(InquiryMethod::Asap),
            created_at: now,
            updated_at: now,
        };
        line.set_quantity(quantity);
        line
    }

    fn order(lines: Vec<OrderLine>) -> Order {
        let mut order = Order::new(
            OrderHeader {
                channel: Channel::Domestic,
                sold_to: "0001000123".to_string(),
                ship_to: "0001000123".to_string(),
                contract_no: "0040001111".to_string(),
                po_no: None,
                sales_org: "0750".to_string(),
                division: "00".to_string(),
                request_date: NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
                remark: None,
                currency: "THB".to_string(),
            },
            1,
        );
        order.add_lines(lines);
        order
    }

    #[test]
    fn test_apply_changes() {
        let mut order = order(vec![line(10, dec!(5), ItemStatus::ItemCreated)]);
        let originals = ChangeHandler::apply_changes(
            &mut order,
            &[LineChange {
                item_no: 10,
                quantity: Some(dec!(8)),
                request_date: None,
                plant: Some("7532".to_string()),
            }],
        )
        .unwrap();

        assert_eq!(originals[0].quantity, dec!(5));
        let changed = order.line(10).unwrap();
        assert_eq!(changed.quantity, dec!(8));
        assert_eq!(changed.net_price, dec!(800));
        assert_eq!(changed.weight_kg, dec!(8000));
        assert_eq!(changed.plant, "7532");
    }

    #[test]
    fn test_locked_line_rejects_change() {
        let mut order = order(vec![line(10, dec!(5), ItemStatus::PlanningConfirm)]);
        let err = ChangeHandler::apply_changes(
            &mut order,
            &[LineChange {
                item_no: 10,
                quantity: Some(dec!(8)),
                request_date: None,
                plant: None,
            }],
        )
        .unwrap_err();

        assert!(matches!(err, ChangeError::ItemLocked { item_no: 10, .. }));
        assert_eq!(order.line(10).unwrap().quantity, dec!(5));
    }

    #[test]
    fn test_changes_are_all_or_nothing() {
        let mut order = order(vec![line(10, dec!(5), ItemStatus::ItemCreated)]);
        let err = ChangeHandler::apply_changes(
            &mut order,
            &[
                LineChange {
                    item_no: 10,
                    quantity: Some(dec!(8)),
                    request_date: None,
                    plant: None,
                },
                LineChange {
                    item_no: 90,
                    quantity: Some(dec!(1)),
                    request_date: None,
                    plant: None,
                },
            ],
        )
        .unwrap_err();

        assert_eq!(err, ChangeError::ItemNotFound(90));
        assert_eq!(order.line(10).unwrap().quantity, dec!(5));
    }

    #[test]
    fn test_repeated_item_is_rejected() {
        let mut order = order(vec![line(10, dec!(5), ItemStatus::ItemCreated)]);
        let change = LineChange {
            item_no: 10,
            quantity: Some(dec!(8)),
            request_date: None,
            plant: None,
        };
        let err = ChangeHandler::apply_changes(&mut order, &[change.clone(), change]).unwrap_err();

        assert_eq!(err, ChangeError::DuplicateItem(10));
        assert_eq!(order.line(10).unwrap().quantity, dec!(5));

        let err = ChangeHandler::check_cancellable(&order, &[10, 10]).unwrap_err();
        assert_eq!(err, ChangeError::DuplicateItem(10));
    }

    #[test]
    fn test_split_line() {
        let mut order = order(vec![
            line(10, dec!(10), ItemStatus::ItemCreated),
            line(20, dec!(1), ItemStatus::ItemCreated),
        ]);
        let later = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        let outcome = ChangeHandler::apply_split(
            &mut order,
            10,
            &[
                SplitPart {
                    quantity: dec!(6),
                    request_date: None,
                },
                SplitPart {
                    quantity: dec!(4),
                    request_date: Some(later),
                },
            ],
        )
        .unwrap();

        assert_eq!(outcome.original.quantity, dec!(10));
        assert_eq!(outcome.new_items, vec![30]);
        assert_eq!(order.line(10).unwrap().quantity, dec!(6));

        let split = order.line(30).unwrap();
        assert_eq!(split.quantity, dec!(4));
        assert_eq!(split.request_date, later);
        assert_eq!(split.item_status, ItemStatus::Draft);
        assert_ne!(split.id, order.line(10).unwrap().id);
    }

    #[test]
    fn test_split_quantities_must_add_up() {
        let mut order = order(vec![line(10, dec!(10), ItemStatus::ItemCreated)]);
        let err = ChangeHandler::apply_split(
            &mut order,
            10,
            &[
                SplitPart {
                    quantity: dec!(6),
                    request_date: None,
                },
                SplitPart {
                    quantity: dec!(5),
                    request_date: None,
                },
            ],
        )
        .unwrap_err();

        assert!(matches!(err, ChangeError::InvalidSplit { item_no: 10, .. }));
        assert_eq!(order.lines.len(), 1);
    }

    #[test]
    fn test_cancel_blocked_once_producing() {
        let order = order(vec![
            line(10, dec!(1), ItemStatus::PlanningConfirm),
            line(20, dec!(1), ItemStatus::Producing),
        ]);

        assert!(ChangeHandler::check_cancellable(&order, &[10]).is_ok());
        let err = ChangeHandler::check_cancellable(&order, &[10, 20]).unwrap_err();
        assert!(matches!(err, ChangeError::ItemLocked { item_no: 20, .. }));
    }

    #[test]
    fn test_cancelled_order_not_modifiable() {
        let mut order = order(vec![line(10, dec!(1), ItemStatus::ItemCreated)]);
        order.status = OrderStatus::Cancelled;
        let err = ChangeHandler::check_cancellable(&order, &[10]).unwrap_err();
        assert_eq!(err, ChangeError::OrderNotModifiable("CANCELLED".to_string()));
    }
}
