use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use saleflow_order::models::{AttentionType, Channel, ItemStatus, Order, OrderLine, OrderLinePlan, OrderStatus};
use saleflow_order::{OrderRepository, RepositoryError};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::debug;
use uuid::Uuid;

pub struct PgOrderRepository {
    pool: PgPool,
}

impl PgOrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn storage(e: sqlx::Error) -> RepositoryError {
    RepositoryError::Storage(e.to_string())
}

/// Enum variants are stored as their wire names
fn to_text<T: Serialize>(value: &T) -> String {
    match serde_json::to_value(value) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(other) => other.to_string(),
        Err(_) => String::new(),
    }
}

fn from_text<T: DeserializeOwned>(order_id: Uuid, value: &str) -> Result<T, RepositoryError> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).map_err(|e| RepositoryError::Corrupt {
        order_id,
        message: format!("unknown value '{}': {}", value, e),
    })
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: i64,
    so_no: Option<String>,
    channel: String,
    status: String,
    sold_to: String,
    ship_to: String,
    contract_no: String,
    po_no: Option<String>,
    sales_org: String,
    division: String,
    product_group: Option<String>,
    request_date: NaiveDate,
    remark: Option<String>,
    currency: String,
    total_price: Decimal,
    tax_amount: Decimal,
    total_price_inc_tax: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

// Line joined with its plan
#[derive(sqlx::FromRow)]
struct LineRow {
    id: Uuid,
    item_no: i32,
    material_code: String,
    material_description: String,
    product_group: String,
    quantity: Decimal,
    sales_unit: String,
    kg_per_unit: Decimal,
    weight_kg: Decimal,
    price_per_unit: Decimal,
    net_price: Decimal,
    plant: String,
    item_category: String,
    request_date: NaiveDate,
    confirmed_date: Option<NaiveDate>,
    confirmed_quantity: Decimal,
    over_tolerance: Decimal,
    under_tolerance: Decimal,
    item_status: String,
    attention: Vec<String>,
    cart_line_id: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    inquiry_method: Option<String>,
    atp_ctp: Option<String>,
    on_hand_stock: Option<bool>,
    block_code: Option<String>,
    run_code: Option<String>,
    paper_machine: Option<String>,
    return_status: Option<String>,
    return_code: Option<String>,
    plan_confirmed_quantity: Option<Decimal>,
    dispatch_date: Option<NaiveDate>,
}

impl LineRow {
    fn into_line(self, order_id: Uuid) -> Result<OrderLine, RepositoryError> {
        let item_status = ItemStatus::parse(&self.item_status).ok_or_else(|| RepositoryError::Corrupt {
            order_id,
            message: format!("unknown item status '{}'", self.item_status),
        })?;

        let attention = self
            .attention
            .iter()
            .map(|a| from_text::<AttentionType>(order_id, a))
            .collect::<Result<_, _>>()?;

        let inquiry_method = match self.inquiry_method.as_deref() {
            Some(m) => from_text(order_id, m)?,
            None => {
                return Err(RepositoryError::Corrupt {
                    order_id,
                    message: format!("line {} has no plan", self.item_no),
                })
            }
        };

        let plan = OrderLinePlan {
            inquiry_method,
            atp_ctp: self.atp_ctp.as_deref().map(|v| from_text(order_id, v)).transpose()?,
            on_hand_stock: self.on_hand_stock.unwrap_or(false),
            block_code: self.block_code,
            run_code: self.run_code,
            paper_machine: self.paper_machine,
            return_status: self.return_status.as_deref().map(|v| from_text(order_id, v)).transpose()?,
            return_code: self.return_code,
            confirmed_quantity: self.plan_confirmed_quantity,
            dispatch_date: self.dispatch_date,
        };

        Ok(OrderLine {
            id: self.id,
            item_no: self.item_no as u32,
            material_code: self.material_code,
            material_description: self.material_description,
            product_group: self.product_group,
            quantity: self.quantity,
            sales_unit: self.sales_unit,
            kg_per_unit: self.kg_per_unit,
            weight_kg: self.weight_kg,
            price_per_unit: self.price_per_unit,
            net_price: self.net_price,
            plant: self.plant,
            item_category: self.item_category,
            request_date: self.request_date,
            confirmed_date: self.confirmed_date,
            confirmed_quantity: self.confirmed_quantity,
            over_tolerance: self.over_tolerance,
            under_tolerance: self.under_tolerance,
            item_status,
            attention,
            cart_line_id: self.cart_line_id,
            plan,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

async fn insert_line(
    tx: &mut Transaction<'_, Postgres>,
    order_id: Uuid,
    line: &OrderLine,
) -> Result<(), sqlx::Error> {
    let attention: Vec<String> = line.attention.iter().map(to_text).collect();

    sqlx::query(
        r#"
        INSERT INTO order_lines (
            id, order_id, item_no, material_code, material_description, product_group,
            quantity, sales_unit, kg_per_unit, weight_kg, price_per_unit, net_price,
            plant, item_category, request_date, confirmed_date, confirmed_quantity,
            over_tolerance, under_tolerance, item_status, attention, cart_line_id,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24)
        "#,
    )
    .bind(line.id)
    .bind(order_id)
    .bind(line.item_no as i32)
    .bind(&line.material_code)
    .bind(&line.material_description)
    .bind(&line.product_group)
    .bind(line.quantity)
    .bind(&line.sales_unit)
    .bind(line.kg_per_unit)
    .bind(line.weight_kg)
    .bind(line.price_per_unit)
    .bind(line.net_price)
    .bind(&line.plant)
    .bind(&line.item_category)
    .bind(line.request_date)
    .bind(line.confirmed_date)
    .bind(line.confirmed_quantity)
    .bind(line.over_tolerance)
    .bind(line.under_tolerance)
    .bind(line.item_status.as_str())
    .bind(&attention)
    .bind(line.cart_line_id)
    .bind(line.created_at)
    .bind(line.updated_at)
    .execute(&mut **tx)
    .await?;

    let plan = &line.plan;
    sqlx::query(
        r#"
        INSERT INTO order_line_plans (
            order_line_id, inquiry_method, atp_ctp, on_hand_stock, block_code, run_code,
            paper_machine, return_status, return_code, confirmed_quantity, dispatch_date
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        "#,
    )
    .bind(line.id)
    .bind(to_text(&plan.inquiry_method))
    .bind(plan.atp_ctp.as_ref().map(to_text))
    .bind(plan.on_hand_stock)
    .bind(&plan.block_code)
    .bind(&plan.run_code)
    .bind(&plan.paper_machine)
    .bind(plan.return_status.as_ref().map(to_text))
    .bind(&plan.return_code)
    .bind(plan.confirmed_quantity)
    .bind(plan.dispatch_date)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn get_order(&self, id: Uuid) -> Result<Option<Order>, RepositoryError> {
        let row: Option<OrderRow> = sqlx::query_as(
            r#"
            SELECT id, order_number, so_no, channel, status, sold_to, ship_to, contract_no, po_no,
                   sales_org, division, product_group, request_date, remark, currency,
                   total_price, tax_amount, total_price_inc_tax, created_at, updated_at
            FROM orders WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage)?;

        let Some(row) = row else {
            return Ok(None);
        };

        let line_rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT l.id, l.item_no, l.material_code, l.material_description, l.product_group,
                   l.quantity, l.sales_unit, l.kg_per_unit, l.weight_kg, l.price_per_unit, l.net_price,
                   l.plant, l.item_category, l.request_date, l.confirmed_date, l.confirmed_quantity,
                   l.over_tolerance, l.under_tolerance, l.item_status, l.attention, l.cart_line_id,
                   l.created_at, l.updated_at,
                   p.inquiry_method, p.atp_ctp, p.on_hand_stock, p.block_code, p.run_code,
                   p.paper_machine, p.return_status, p.return_code,
                   p.confirmed_quantity AS plan_confirmed_quantity, p.dispatch_date
            FROM order_lines l
            LEFT JOIN order_line_plans p ON p.order_line_id = l.id
            WHERE l.order_id = $1
            ORDER BY l.item_no
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(storage)?;

        let lines = line_rows
            .into_iter()
            .map(|l| l.into_line(id))
            .collect::<Result<Vec<_>, _>>()?;

        let channel = Channel::parse(&row.channel).ok_or_else(|| RepositoryError::Corrupt {
            order_id: id,
            message: format!("unknown channel '{}'", row.channel),
        })?;
        let status = OrderStatus::parse(&row.status).ok_or_else(|| RepositoryError::Corrupt {
            order_id: id,
            message: format!("unknown order status '{}'", row.status),
        })?;

        Ok(Some(Order {
            id: row.id,
            order_number: row.order_number,
            so_no: row.so_no,
            channel,
            status,
            sold_to: row.sold_to,
            ship_to: row.ship_to,
            contract_no: row.contract_no,
            po_no: row.po_no,
            sales_org: row.sales_org,
            division: row.division,
            product_group: row.product_group,
            request_date: row.request_date,
            remark: row.remark,
            currency: row.currency,
            total_price: row.total_price,
            tax_amount: row.tax_amount,
            total_price_inc_tax: row.total_price_inc_tax,
            lines,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }))
    }

    async fn save_order(&self, order: &Order) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(storage)?;

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, order_number, so_no, channel, status, sold_to, ship_to, contract_no, po_no,
                sales_org, division, product_group, request_date, remark, currency,
                total_price, tax_amount, total_price_inc_tax, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20)
            ON CONFLICT (id) DO UPDATE SET
                so_no = EXCLUDED.so_no,
                status = EXCLUDED.status,
                ship_to = EXCLUDED.ship_to,
                po_no = EXCLUDED.po_no,
                product_group = EXCLUDED.product_group,
                request_date = EXCLUDED.request_date,
                remark = EXCLUDED.remark,
                total_price = EXCLUDED.total_price,
                tax_amount = EXCLUDED.tax_amount,
                total_price_inc_tax = EXCLUDED.total_price_inc_tax,
                updated_at = NOW()
            "#,
        )
        .bind(order.id)
        .bind(order.order_number)
        .bind(&order.so_no)
        .bind(order.channel.as_str())
        .bind(order.status.as_str())
        .bind(&order.sold_to)
        .bind(&order.ship_to)
        .bind(&order.contract_no)
        .bind(&order.po_no)
        .bind(&order.sales_org)
        .bind(&order.division)
        .bind(&order.product_group)
        .bind(order.request_date)
        .bind(&order.remark)
        .bind(&order.currency)
        .bind(order.total_price)
        .bind(order.tax_amount)
        .bind(order.total_price_inc_tax)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(storage)?;

        // Plans go with their lines
        sqlx::query("DELETE FROM order_lines WHERE order_id = $1")
            .bind(order.id)
            .execute(&mut *tx)
            .await
            .map_err(storage)?;

        for line in &order.lines {
            insert_line(&mut tx, order.id, line).await.map_err(storage)?;
        }

        tx.commit().await.map_err(storage)?;
        debug!("Saved order {} with {} lines", order.order_number, order.lines.len());
        Ok(())
    }

    async fn next_order_number(&self) -> Result<i64, RepositoryError> {
        sqlx::query_scalar("SELECT nextval('order_number_seq')")
            .fetch_one(&self.pool)
            .await
            .map_err(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use saleflow_core::planning::{AtpCtp, InquiryMethod, ReturnStatus};

    #[test]
    fn test_enum_text_uses_wire_names() {
        assert_eq!(to_text(&InquiryMethod::Jitcp), "JITCP");
        assert_eq!(to_text(&ReturnStatus::Tentative), "TENTATIVE");
        assert_eq!(to_text(&AttentionType::R4), "R4");

        let id = Uuid::new_v4();
        let atp: AtpCtp = from_text(id, "CTP").unwrap();
        assert_eq!(atp, AtpCtp::Ctp);
        assert!(matches!(
            from_text::<ReturnStatus>(id, "MAYBE"),
            Err(RepositoryError::Corrupt { .. })
        ));
    }
}
