use crate::models::{Channel, Order, OrderStatus};
use chrono::Utc;

/// Owns the order status transition table
pub struct OrderManager;

impl OrderManager {
    pub fn can_transition(from: OrderStatus, to: OrderStatus) -> bool {
        use OrderStatus::*;

        if from == to {
            return true;
        }

        match (from, to) {
            (PreDraft, Draft) => true,
            (PreDraft | Draft, Received | Confirmed) => true,
            (Confirmed, Received) => true,
            (Confirmed | Received, PartialDelivery | CompletedDelivery) => true,
            (PartialDelivery, CompletedDelivery) => true,
            // Cancel from anything not completed
            (_, Cancelled) => !matches!(from, CompletedDelivery | Cancelled),
            _ => false,
        }
    }

    pub fn transition(order: &mut Order, to: OrderStatus) -> Result<(), TransitionError> {
        if !Self::can_transition(order.status, to) {
            return Err(TransitionError::InvalidTransition {
                from: order.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        if order.status != to {
            order.status = to;
            order.updated_at = Utc::now();
        }
        Ok(())
    }

    /// Status an order takes once the ERP accepted every submitted line.
    /// Customer-portal orders skip the received step.
    pub fn accepted_status(channel: Channel) -> OrderStatus {
        match channel {
            Channel::Customer => OrderStatus::Confirmed,
            _ => OrderStatus::Received,
        }
    }

    /// First line added to a pre-draft
    pub fn mark_draft(order: &mut Order) -> Result<(), TransitionError> {
        if order.status == OrderStatus::PreDraft {
            Self::transition(order, OrderStatus::Draft)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    #[error("Invalid state transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}
