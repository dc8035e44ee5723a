// In-process store with the same upsert semantics as the Postgres repositories.
// Used by the test suites and for dry runs without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CatalogStore, OrderStore, StoreError, StoreResult, SyncLogStore};
use crate::models::catalog::{Category, CategoryUpsert, Product, ProductPage, ProductQuery, ProductUpsert};
use crate::models::order::{Customer, CustomerUpsert, NewOrder, NewOrderLine, Order, OrderLine, OrderWithLines};
use crate::models::sync_log::{RunCompletion, SyncRun, SyncStatus, SyncType};

#[derive(Default)]
struct Tables {
    categories: Vec<Category>,
    products: Vec<Product>,
    sync_runs: Vec<SyncRun>,
    customers: Vec<Customer>,
    orders: Vec<Order>,
    order_lines: Vec<OrderLine>,
    next_serial: i64,
}

impl Tables {
    fn serial(&mut self) -> i64 {
        self.next_serial += 1;
        self.next_serial
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn categories(&self) -> Vec<Category> {
        self.tables.read().await.categories.clone()
    }

    pub async fn products(&self) -> Vec<Product> {
        self.tables.read().await.products.clone()
    }

    pub async fn sync_runs(&self) -> Vec<SyncRun> {
        self.tables.read().await.sync_runs.clone()
    }

    pub async fn customers(&self) -> Vec<Customer> {
        self.tables.read().await.customers.clone()
    }

    pub async fn orders(&self) -> Vec<Order> {
        self.tables.read().await.orders.clone()
    }

    pub async fn order_lines(&self) -> Vec<OrderLine> {
        self.tables.read().await.order_lines.clone()
    }

    /// Seed a finished run, e.g. to position the incremental watermark.
    pub async fn record_run(&self, run: SyncRun) {
        self.tables.write().await.sync_runs.push(run);
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn upsert_categories(&self, rows: &[CategoryUpsert]) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;

        for row in rows {
            match tables.categories.iter().position(|c| c.odoo_id == row.odoo_id) {
                Some(index) => {
                    let existing = &mut tables.categories[index];
                    existing.name = row.name.clone();
                    existing.parent_id = row.parent_id;
                    existing.parent_name = row.parent_name.clone();
                    existing.active = true;
                }
                None => {
                    let id = tables.serial();
                    tables.categories.push(Category {
                        id,
                        odoo_id: row.odoo_id,
                        name: row.name.clone(),
                        parent_id: row.parent_id,
                        parent_name: row.parent_name.clone(),
                        active: true,
                    });
                }
            }
        }

        Ok(rows.len() as u64)
    }

    async fn upsert_products(&self, rows: &[ProductUpsert]) -> StoreResult<u64> {
        let mut tables = self.tables.write().await;

        for row in rows {
            let existing = tables.products.iter().position(|p| p.odoo_id == row.odoo_id);
            let (id, previous_cost) = match existing {
                Some(index) => (tables.products[index].id, tables.products[index].cost_price),
                None => (tables.serial(), None),
            };

            let product = Product {
                id,
                odoo_id: row.odoo_id,
                name: row.name.clone(),
                sku: row.sku.clone(),
                list_price: row.list_price,
                cost_price: row.cost_price.or(previous_cost),
                qty_available: row.qty_available,
                virtual_available: row.virtual_available,
                description: row.description.clone(),
                image_url: row.image_url.clone(),
                category_id: row.category_id,
                category_name: row.category_name.clone(),
                uom_name: row.uom_name.clone(),
                active: row.active,
                write_date: row.write_date,
            };

            match existing {
                Some(index) => tables.products[index] = product,
                None => tables.products.push(product),
            }
        }

        Ok(rows.len() as u64)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let tables = self.tables.read().await;
        let mut categories: Vec<Category> = tables.categories.iter().filter(|c| c.active).cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn search_products(&self, query: &ProductQuery) -> StoreResult<ProductPage> {
        let tables = self.tables.read().await;
        let needle = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut matched: Vec<Product> = tables
            .products
            .iter()
            .filter(|p| p.active)
            .filter(|p| query.category_id.map_or(true, |id| p.category_id == Some(id)))
            .filter(|p| needle.as_ref().map_or(true, |n| p.name.to_lowercase().contains(n)))
            .cloned()
            .collect();
        matched.sort_by(|a, b| a.name.cmp(&b.name).then(a.id.cmp(&b.id)));

        let total = matched.len() as i64;
        let products = matched
            .into_iter()
            .skip(query.offset().max(0) as usize)
            .take(query.limit.max(0) as usize)
            .collect();

        Ok(ProductPage { products, total })
    }
}

#[async_trait]
impl SyncLogStore for MemoryStore {
    async fn insert_run(&self, sync_type: SyncType, started_at: DateTime<Utc>) -> StoreResult<Uuid> {
        let id = Uuid::new_v4();
        self.tables.write().await.sync_runs.push(SyncRun {
            id,
            sync_type,
            status: SyncStatus::Running,
            started_at,
            completed_at: None,
            duration_seconds: None,
            records_processed: None,
            error_message: None,
        });
        Ok(id)
    }

    async fn complete_run(&self, id: Uuid, completion: &RunCompletion) -> StoreResult<()> {
        let mut tables = self.tables.write().await;
        let run = tables
            .sync_runs
            .iter_mut()
            .find(|r| r.id == id && r.completed_at.is_none())
            .ok_or_else(|| StoreError::NotFound(format!("running sync run {}", id)))?;

        run.status = completion.status;
        run.completed_at = Some(completion.completed_at);
        run.duration_seconds = Some(completion.duration_seconds);
        run.records_processed = completion.records_processed;
        run.error_message = completion.error_message.clone();
        Ok(())
    }

    async fn latest_success(&self) -> StoreResult<Option<DateTime<Utc>>> {
        let tables = self.tables.read().await;
        Ok(tables
            .sync_runs
            .iter()
            .filter(|r| r.status == SyncStatus::Success)
            .filter_map(|r| r.completed_at)
            .max())
    }

    async fn recent_runs(&self, limit: i64) -> StoreResult<Vec<SyncRun>> {
        let tables = self.tables.read().await;
        let mut runs = tables.sync_runs.clone();
        runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        runs.truncate(limit.max(0) as usize);
        Ok(runs)
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn upsert_customer(&self, customer: &CustomerUpsert) -> StoreResult<Customer> {
        let mut tables = self.tables.write().await;

        if let Some(existing) = tables.customers.iter_mut().find(|c| c.email == customer.email) {
            existing.odoo_id = customer.odoo_id.or(existing.odoo_id);
            existing.name = customer.name.clone();
            existing.phone = customer.phone.clone().or(existing.phone.take());
            existing.address = customer.address.clone().or(existing.address.take());
            return Ok(existing.clone());
        }

        let created = Customer {
            id: Uuid::new_v4(),
            odoo_id: customer.odoo_id,
            name: customer.name.clone(),
            email: customer.email.clone(),
            phone: customer.phone.clone(),
            address: customer.address.clone(),
        };
        tables.customers.push(created.clone());
        Ok(created)
    }

    async fn insert_order(&self, order: &NewOrder, lines: &[NewOrderLine]) -> StoreResult<Order> {
        let mut tables = self.tables.write().await;

        let duplicate = tables.orders.iter().any(|o| {
            o.odoo_id.as_deref() == Some(order.odoo_id.as_str())
                || (order.idempotency_key.is_some() && o.idempotency_key == order.idempotency_key)
        });
        if duplicate {
            return Err(StoreError::Conflict("order".to_string()));
        }

        let inserted = Order {
            id: Uuid::new_v4(),
            customer_id: order.customer_id,
            odoo_id: Some(order.odoo_id.clone()),
            odoo_name: order.odoo_name.clone(),
            customer_name: order.customer_name.clone(),
            customer_email: order.customer_email.clone(),
            customer_phone: order.customer_phone.clone(),
            total_amount: order.total_amount,
            status: order.status.clone(),
            notes: order.notes.clone(),
            synced_to_odoo: true,
            synced_at: Some(order.synced_at),
            idempotency_key: order.idempotency_key.clone(),
            created_at: Utc::now(),
        };

        for line in lines {
            tables.order_lines.push(OrderLine {
                id: Uuid::new_v4(),
                order_id: inserted.id,
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                price_unit: line.price_unit,
                subtotal: line.subtotal,
            });
        }
        tables.orders.push(inserted.clone());

        Ok(inserted)
    }

    async fn find_order_by_idempotency_key(&self, key: &str) -> StoreResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.idempotency_key.as_deref() == Some(key))
            .cloned())
    }

    async fn find_order_by_remote_id(&self, odoo_id: i64) -> StoreResult<Option<Order>> {
        let tables = self.tables.read().await;
        Ok(tables
            .orders
            .iter()
            .find(|o| o.remote_order_id() == Some(odoo_id))
            .cloned())
    }

    async fn orders_by_email(&self, email: &str) -> StoreResult<Vec<OrderWithLines>> {
        let tables = self.tables.read().await;
        let mut orders: Vec<OrderWithLines> = tables
            .orders
            .iter()
            .filter(|o| o.customer_email == email)
            .map(|order| OrderWithLines {
                order: order.clone(),
                order_lines: tables
                    .order_lines
                    .iter()
                    .filter(|l| l.order_id == order.id)
                    .cloned()
                    .collect(),
            })
            .collect();
        orders.sort_by(|a, b| b.order.created_at.cmp(&a.order.created_at));
        Ok(orders)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn product(odoo_id: i64, name: &str, cost: Option<Decimal>) -> ProductUpsert {
        ProductUpsert {
            odoo_id,
            name: name.to_string(),
            sku: None,
            list_price: dec!(5),
            cost_price: cost,
            qty_available: Decimal::ZERO,
            virtual_available: Decimal::ZERO,
            description: None,
            image_url: None,
            category_id: Some(1),
            category_name: Some("Salud".to_string()),
            uom_name: None,
            active: true,
            write_date: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_product_upsert_is_keyed_by_odoo_id() {
        let store = MemoryStore::new();
        store.upsert_products(&[product(10, "Old name", Some(dec!(3)))]).await.unwrap();
        store.upsert_products(&[product(10, "New name", None)]).await.unwrap();

        let products = store.products().await;
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].name, "New name");
        // a fetch without cost keeps the stored cost
        assert_eq!(products[0].cost_price, Some(dec!(3)));
    }

    #[tokio::test]
    async fn test_search_filters_and_pages() {
        let store = MemoryStore::new();
        let mut rows: Vec<ProductUpsert> =
            (1..=5).map(|i| product(i, &format!("Crema {}", i), None)).collect();
        rows.push(product(6, "Jarabe", None));
        store.upsert_products(&rows).await.unwrap();

        let page = store
            .search_products(&ProductQuery { page: 2, limit: 2, category_id: Some(1), search: Some("CREMA".to_string()) })
            .await
            .unwrap();

        assert_eq!(page.total, 5);
        let names: Vec<&str> = page.products.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["Crema 3", "Crema 4"]);
    }
}
