use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use saleflow_catalog::{CatalogError, ReferenceData};
use saleflow_core::planning::InquiryMethod;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::models::{ItemStatus, Order, OrderLine, OrderLinePlan};

/// One requested product, as entered or uploaded
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineRequest {
    pub material_code: String,
    pub quantity: Decimal,
    #[serde(default)]
    pub request_date: Option<NaiveDate>,
    #[serde(default)]
    pub plant: Option<String>,
    #[serde(default)]
    pub cart_line_id: Option<Uuid>,
}

/// Turns line requests into priced, weighed order lines
pub struct OrderLineAssembler<'a> {
    reference: &'a ReferenceData,
}

impl<'a> OrderLineAssembler<'a> {
    pub fn new(reference: &'a ReferenceData) -> Self {
        Self { reference }
    }

    /// Build lines for `order` without touching it. Fails on the first
    /// invalid request; nothing is assembled in that case.
    pub fn assemble(
        &self,
        order: &Order,
        requests: &[LineRequest],
    ) -> Result<Vec<OrderLine>, ValidationError> {
        let mut product_group = order.product_group.clone();
        let mut item_no = order.next_item_no();
        let mut lines = Vec::with_capacity(requests.len());

        for request in requests {
            let line = self.assemble_line(order, request, item_no)?;

            match &product_group {
                Some(expected) if *expected != line.product_group => {
                    return Err(ValidationError::ProductGroupMismatch {
                        material_code: line.material_code,
                        expected: expected.clone(),
                        found: line.product_group,
                    });
                }
                Some(_) => {}
                None => product_group = Some(line.product_group.clone()),
            }

            lines.push(line);
            item_no += 10;
        }

        Ok(lines)
    }

    fn assemble_line(
        &self,
        order: &Order,
        request: &LineRequest,
        item_no: u32,
    ) -> Result<OrderLine, ValidationError> {
        if let Some(cart_line_id) = request.cart_line_id {
            if !self.reference.has_cart_line(&cart_line_id) {
                return Err(ValidationError::CartLineMissing(cart_line_id));
            }
        }

        if request.quantity <= Decimal::ZERO {
            return Err(ValidationError::InvalidQuantity {
                material_code: request.material_code.clone(),
                quantity: request.quantity,
            });
        }

        let contract = self.reference.contract_material(&request.material_code)?;
        let material = self.reference.material(&request.material_code)?;

        let kg_per_unit = material.kg_per(&contract.sales_unit).ok_or_else(|| {
            ValidationError::NoWeightConversion {
                material_code: material.material_code.clone(),
                unit: contract.sales_unit.clone(),
            }
        })?;

        // An explicit date means the customer wants it just in time
        let inquiry_method = if request.request_date.is_some() {
            InquiryMethod::Jitcp
        } else {
            InquiryMethod::Asap
        };

        let now = Utc::now();
        let mut line = OrderLine {
            id: Uuid::new_v4(),
            item_no,
            material_code: material.material_code.clone(),
            material_description: material.description.clone(),
            product_group: material.product_group.clone(),
            quantity: Decimal::ZERO,
            sales_unit: contract.sales_unit.clone(),
            kg_per_unit,
            weight_kg: Decimal::ZERO,
            price_per_unit: contract.price_per_unit,
            net_price: Decimal::ZERO,
            plant: request.plant.clone().unwrap_or_else(|| contract.plant.clone()),
            item_category: material.item_category.clone(),
            request_date: request.request_date.unwrap_or(order.request_date),
            confirmed_date: None,
            confirmed_quantity: Decimal::ZERO,
            over_tolerance: contract
                .over_tolerance
                .unwrap_or(material.default_over_tolerance),
            under_tolerance: contract
                .under_tolerance
                .unwrap_or(material.default_under_tolerance),
            item_status: ItemStatus::Draft,
            attention: BTreeSet::new(),
            cart_line_id: request.cart_line_id,
            plan: OrderLinePlan::new(inquiry_method),
            created_at: now,
            updated_at: now,
        };
        line.set_quantity(request.quantity);

        Ok(line)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("Material {material_code} belongs to product group {found}, order is {expected}")]
    ProductGroupMismatch {
        material_code: String,
        expected: String,
        found: String,
    },

    #[error("Cart line no longer exists: {0}")]
    CartLineMissing(Uuid),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error("Quantity for {material_code} must be positive, got {quantity}")]
    InvalidQuantity {
        material_code: String,
        quantity: Decimal,
    },

    #[error("No kg conversion for {material_code} in unit {unit}")]
    NoWeightConversion { material_code: String, unit: String },
}

impl ValidationError {
    /// Request field the error should be shown against
    pub fn field(&self) -> &'static str {
        match self {
            ValidationError::ProductGroupMismatch { .. } => "productGroup",
            ValidationError::CartLineMissing(_) => "cartLineId",
            ValidationError::Catalog(_) => "materialCode",
            ValidationError::InvalidQuantity { .. } => "quantity",
            ValidationError::NoWeightConversion { .. } => "salesUnit",
        }
    }
}
