use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{query, query_as, PgPool};
use uuid::Uuid;

use super::{OrderStore, StoreError, StoreResult};
use crate::models::order::{Customer, CustomerUpsert, NewOrder, NewOrderLine, Order, OrderLine, OrderWithLines};

const ORDER_COLUMNS: &str = "id, customer_id, odoo_id, odoo_name, customer_name, customer_email, customer_phone, \
     total_amount, status, notes, synced_to_odoo, synced_at, idempotency_key, created_at";

pub struct OrderRepository {
    pool: PgPool,
}

impl OrderRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn find_order_where(&self, column: &str, value: &str) -> StoreResult<Option<Order>> {
        let order = query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE {} = $1",
            ORDER_COLUMNS, column
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(order)
    }
}

fn map_unique_violation(err: sqlx::Error, what: &str) -> StoreError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => StoreError::Conflict(what.to_string()),
        _ => StoreError::Database(err),
    }
}

#[async_trait]
impl OrderStore for OrderRepository {
    async fn upsert_customer(&self, customer: &CustomerUpsert) -> StoreResult<Customer> {
        let row = query_as::<_, Customer>(
            r#"
            INSERT INTO customers (id, odoo_id, name, email, phone, address)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (email) DO UPDATE SET
                odoo_id = COALESCE(EXCLUDED.odoo_id, customers.odoo_id),
                name = EXCLUDED.name,
                phone = COALESCE(EXCLUDED.phone, customers.phone),
                address = COALESCE(EXCLUDED.address, customers.address),
                updated_at = CURRENT_TIMESTAMP
            RETURNING id, odoo_id, name, email, phone, address
            "#
        )
        .bind(Uuid::new_v4())
        .bind(customer.odoo_id)
        .bind(&customer.name)
        .bind(&customer.email)
        .bind(&customer.phone)
        .bind(&customer.address)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn insert_order(&self, order: &NewOrder, lines: &[NewOrderLine]) -> StoreResult<Order> {
        let mut tx = self.pool.begin().await?;

        let inserted = query_as::<_, Order>(&format!(
            r#"
            INSERT INTO orders (
                id, customer_id, odoo_id, odoo_name, customer_name, customer_email, customer_phone,
                total_amount, status, notes, synced_to_odoo, synced_at, idempotency_key
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, TRUE, $11, $12)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(order.customer_id)
        .bind(&order.odoo_id)
        .bind(&order.odoo_name)
        .bind(&order.customer_name)
        .bind(&order.customer_email)
        .bind(&order.customer_phone)
        .bind(order.total_amount)
        .bind(&order.status)
        .bind(&order.notes)
        .bind(order.synced_at)
        .bind(&order.idempotency_key)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "order"))?;

        for line in lines {
            query(
                r#"
                INSERT INTO order_lines (id, order_id, product_id, product_name, quantity, price_unit, subtotal)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#
            )
            .bind(Uuid::new_v4())
            .bind(inserted.id)
            .bind(line.product_id)
            .bind(&line.product_name)
            .bind(line.quantity)
            .bind(line.price_unit)
            .bind(line.subtotal)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(inserted)
    }

    async fn find_order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>> {
        self.find_order_where("idempotency_key", key).await
    }

    async fn find_order_by_remote_id(&self, odoo_id: i64) -> StoreResult<Option<Order>> {
        self.find_order_where("odoo_id", &odoo_id.to_string()).await
    }

    async fn orders_by_email(&self, email: &str) -> StoreResult<Vec<OrderWithLines>> {
        let orders = query_as::<_, Order>(&format!(
            "SELECT {} FROM orders WHERE customer_email = $1 ORDER BY created_at DESC",
            ORDER_COLUMNS
        ))
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        let order_ids: Vec<Uuid> = orders.iter().map(|o| o.id).collect();
        let lines = query_as::<_, OrderLine>(
            r#"
            SELECT id, order_id, product_id, product_name, quantity, price_unit, subtotal
            FROM order_lines
            WHERE order_id = ANY($1)
            ORDER BY product_name
            "#
        )
        .bind(&order_ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines_by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
        for line in lines {
            lines_by_order.entry(line.order_id).or_default().push(line);
        }

        Ok(orders
            .into_iter()
            .map(|order| OrderWithLines {
                order_lines: lines_by_order.remove(&order.id).unwrap_or_default(),
                order,
            })
            .collect())
    }
}
