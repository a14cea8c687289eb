use async_trait::async_trait;
use rust_decimal::Decimal;
use saleflow_catalog::{ContractMaterial, MaterialMaster, ReferenceData, UnitConversion};
use saleflow_order::{LineRequest, ReferenceSource, RepositoryError};
use sqlx::PgPool;
use std::collections::HashMap;
use tracing::debug;
use uuid::Uuid;

/// Reads contract, material master and cart data for the assembler
pub struct PgReferenceSource {
    pool: PgPool,
}

impl PgReferenceSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct ContractMaterialRow {
    contract_no: String,
    material_code: String,
    plant: String,
    sales_unit: String,
    price_per_unit: Decimal,
    currency: String,
    remaining_quantity: Decimal,
    over_tolerance: Option<Decimal>,
    under_tolerance: Option<Decimal>,
}

#[derive(sqlx::FromRow)]
struct MaterialRow {
    material_code: String,
    description: String,
    product_group: String,
    material_group: String,
    base_unit: String,
    item_category: String,
    default_over_tolerance: Decimal,
    default_under_tolerance: Decimal,
}

#[derive(sqlx::FromRow)]
struct ConversionRow {
    material_code: String,
    unit: String,
    kg_per_unit: Decimal,
}

fn storage(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

#[async_trait]
impl ReferenceSource for PgReferenceSource {
    async fn load(&self, contract_no: &str, requests: &[LineRequest]) -> Result<ReferenceData, RepositoryError> {
        let contract_rows: Vec<ContractMaterialRow> = sqlx::query_as(
            r#"
            SELECT contract_no, material_code, plant, sales_unit, price_per_unit, currency,
                   remaining_quantity, over_tolerance, under_tolerance
            FROM contract_materials WHERE contract_no = $1
            "#,
        )
        .bind(contract_no)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        if contract_rows.is_empty() {
            return Err(RepositoryError::ContractNotFound(contract_no.to_string()));
        }

        let codes: Vec<String> = requests.iter().map(|r| r.material_code.clone()).collect();

        let material_rows: Vec<MaterialRow> = sqlx::query_as(
            r#"
            SELECT material_code, description, product_group, material_group, base_unit,
                   item_category, default_over_tolerance, default_under_tolerance
            FROM material_master WHERE material_code = ANY($1)
            "#,
        )
        .bind(&codes)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let conversion_rows: Vec<ConversionRow> = sqlx::query_as(
            "SELECT material_code, unit, kg_per_unit FROM material_conversions WHERE material_code = ANY($1)",
        )
        .bind(&codes)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let cart_ids: Vec<Uuid> = requests.iter().filter_map(|r| r.cart_line_id).collect();
        let known_carts: Vec<Uuid> = if cart_ids.is_empty() {
            Vec::new()
        } else {
            sqlx::query_scalar("SELECT id FROM cart_lines WHERE id = ANY($1) AND contract_no = $2")
                .bind(&cart_ids)
                .bind(contract_no)
                .fetch_all(&self.pool)
                .await
                .map_err(storage)?
        };

        let mut conversions: HashMap<String, Vec<UnitConversion>> = HashMap::new();
        for row in conversion_rows {
            conversions.entry(row.material_code).or_default().push(UnitConversion {
                unit: row.unit,
                kg_per_unit: row.kg_per_unit,
            });
        }

        let mut reference = ReferenceData::new(contract_no);
        for row in contract_rows {
            reference = reference.with_contract_material(ContractMaterial {
                contract_no: row.contract_no,
                material_code: row.material_code,
                plant: row.plant,
                sales_unit: row.sales_unit,
                price_per_unit: row.price_per_unit,
                currency: row.currency,
                remaining_quantity: row.remaining_quantity,
                over_tolerance: row.over_tolerance,
                under_tolerance: row.under_tolerance,
            });
        }
        for row in material_rows {
            let conversions = conversions.remove(&row.material_code).unwrap_or_default();
            reference = reference.with_material(MaterialMaster {
                material_code: row.material_code,
                description: row.description,
                product_group: row.product_group,
                material_group: row.material_group,
                base_unit: row.base_unit,
                item_category: row.item_category,
                default_over_tolerance: row.default_over_tolerance,
                default_under_tolerance: row.default_under_tolerance,
                conversions,
            });
        }
        for id in known_carts {
            reference = reference.with_cart_line(id);
        }

        debug!("Loaded reference data for contract {} ({} materials requested)", contract_no, codes.len());
        Ok(reference)
    }
}
