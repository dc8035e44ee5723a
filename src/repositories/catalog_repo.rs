use async_trait::async_trait;
use sqlx::{query, query_as, PgPool, Postgres, QueryBuilder, Row};

use super::{CatalogStore, StoreResult};
use crate::models::catalog::{Category, CategoryUpsert, Product, ProductPage, ProductQuery, ProductUpsert};

const PRODUCT_COLUMNS: &str = "id, odoo_id, name, sku, list_price, cost_price, qty_available, virtual_available, \
     description, image_url, category_id, category_name, uom_name, active, write_date";

pub struct CatalogRepository {
    pool: PgPool,
}

impl CatalogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, request: &ProductQuery) {
        builder.push(" WHERE active = TRUE");

        if let Some(category_id) = request.category_id {
            builder.push(" AND category_id = ").push_bind(category_id);
        }

        if let Some(search) = request.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            builder.push(" AND name ILIKE ").push_bind(format!("%{}%", escape_like(search)));
        }
    }
}

fn escape_like(input: &str) -> String {
    input.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[async_trait]
impl CatalogStore for CatalogRepository {
    async fn upsert_categories(&self, rows: &[CategoryUpsert]) -> StoreResult<u64> {
        let mut written = 0;

        for row in rows {
            let result = query(
                r#"
                INSERT INTO categories (odoo_id, name, parent_id, parent_name, active)
                VALUES ($1, $2, $3, $4, TRUE)
                ON CONFLICT (odoo_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    parent_id = EXCLUDED.parent_id,
                    parent_name = EXCLUDED.parent_name,
                    active = TRUE,
                    updated_at = CURRENT_TIMESTAMP
                "#
            )
            .bind(row.odoo_id)
            .bind(&row.name)
            .bind(row.parent_id)
            .bind(&row.parent_name)
            .execute(&self.pool)
            .await?;

            written += result.rows_affected();
        }

        Ok(written)
    }

    async fn upsert_products(&self, rows: &[ProductUpsert]) -> StoreResult<u64> {
        let mut written = 0;

        for row in rows {
            let result = query(
                r#"
                INSERT INTO products (
                    odoo_id, name, sku, list_price, cost_price, qty_available, virtual_available,
                    description, image_url, category_id, category_name, uom_name, active, write_date
                ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
                ON CONFLICT (odoo_id) DO UPDATE SET
                    name = EXCLUDED.name,
                    sku = EXCLUDED.sku,
                    list_price = EXCLUDED.list_price,
                    cost_price = COALESCE(EXCLUDED.cost_price, products.cost_price),
                    qty_available = EXCLUDED.qty_available,
                    virtual_available = EXCLUDED.virtual_available,
                    description = EXCLUDED.description,
                    image_url = EXCLUDED.image_url,
                    category_id = EXCLUDED.category_id,
                    category_name = EXCLUDED.category_name,
                    uom_name = EXCLUDED.uom_name,
                    active = EXCLUDED.active,
                    write_date = EXCLUDED.write_date,
                    updated_at = CURRENT_TIMESTAMP
                "#
            )
            .bind(row.odoo_id)
            .bind(&row.name)
            .bind(&row.sku)
            .bind(row.list_price)
            .bind(row.cost_price)
            .bind(row.qty_available)
            .bind(row.virtual_available)
            .bind(&row.description)
            .bind(&row.image_url)
            .bind(row.category_id)
            .bind(&row.category_name)
            .bind(&row.uom_name)
            .bind(row.active)
            .bind(row.write_date)
            .execute(&self.pool)
            .await?;

            written += result.rows_affected();
        }

        Ok(written)
    }

    async fn list_categories(&self) -> StoreResult<Vec<Category>> {
        let categories = query_as::<_, Category>(
            "SELECT id, odoo_id, name, parent_id, parent_name, active FROM categories WHERE active = TRUE ORDER BY name"
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    async fn search_products(&self, request: &ProductQuery) -> StoreResult<ProductPage> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) AS count FROM products");
        Self::push_filters(&mut count_query, request);
        let total: i64 = count_query
            .build()
            .fetch_one(&self.pool)
            .await?
            .try_get("count")?;

        let mut list_query = QueryBuilder::<Postgres>::new(format!("SELECT {} FROM products", PRODUCT_COLUMNS));
        Self::push_filters(&mut list_query, request);
        list_query
            .push(" ORDER BY name, id LIMIT ")
            .push_bind(request.limit)
            .push(" OFFSET ")
            .push_bind(request.offset());

        let products = list_query
            .build_query_as::<Product>()
            .fetch_all(&self.pool)
            .await?;

        Ok(ProductPage { products, total })
    }
}
