use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Category {
    pub id: i64,
    pub odoo_id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub parent_name: Option<String>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: i64,
    pub odoo_id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub list_price: Decimal,
    pub cost_price: Option<Decimal>,
    pub qty_available: Decimal,
    pub virtual_available: Decimal,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub uom_name: Option<String>,
    pub active: bool,
    pub write_date: DateTime<Utc>,
}

/// Category row as produced from an Odoo record, keyed by `odoo_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct CategoryUpsert {
    pub odoo_id: i64,
    pub name: String,
    pub parent_id: Option<i64>,
    pub parent_name: Option<String>,
}

/// Product row as produced from an Odoo record, keyed by `odoo_id`.
///
/// `cost_price` is `None` when the fetch did not include it; the stored
/// value is kept in that case.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductUpsert {
    pub odoo_id: i64,
    pub name: String,
    pub sku: Option<String>,
    pub list_price: Decimal,
    pub cost_price: Option<Decimal>,
    pub qty_available: Decimal,
    pub virtual_available: Decimal,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category_id: Option<i64>,
    pub category_name: Option<String>,
    pub uom_name: Option<String>,
    pub active: bool,
    pub write_date: DateTime<Utc>,
}

/// Listing filter for the storefront. Only active products are returned.
#[derive(Debug, Clone)]
pub struct ProductQuery {
    pub page: i64,
    pub limit: i64,
    pub category_id: Option<i64>,
    pub search: Option<String>,
}

impl ProductQuery {
    pub fn offset(&self) -> i64 {
        (self.page.max(1) - 1).saturating_mul(self.limit.max(0))
    }
}

#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
    pub total: i64,
    pub total_pages: i64,
}

impl Pagination {
    pub fn new(page: i64, limit: i64, total: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self { page, limit, total, total_pages }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pagination_rounds_up() {
        assert_eq!(Pagination::new(1, 12, 25).total_pages, 3);
        assert_eq!(Pagination::new(1, 12, 24).total_pages, 2);
        assert_eq!(Pagination::new(1, 12, 0).total_pages, 0);
    }
}
