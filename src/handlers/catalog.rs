use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::middleware::error_handling::{AppError, Result};
use crate::models::catalog::{Category, Pagination, Product, ProductQuery};
use crate::AppState;

const DEFAULT_PAGE_SIZE: i64 = 12;
const MAX_PAGE_SIZE: i64 = 100;
/// Pages past this are answered as empty pages.
const MAX_PAGE: i64 = 1_000_000;

#[derive(Debug, Deserialize)]
pub struct ProductListParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub category: Option<i64>,
    pub search: Option<String>,
}

impl ProductListParams {
    pub fn into_query(self) -> ProductQuery {
        ProductQuery {
            page: self.page.unwrap_or(1).clamp(1, MAX_PAGE),
            limit: self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
            category_id: self.category,
            search: self.search.map(|s| s.trim().to_string()).filter(|s| !s.is_empty()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub success: bool,
    pub data: Vec<Product>,
    pub pagination: Pagination,
}

#[derive(Debug, Serialize)]
pub struct CategoryListResponse {
    pub success: bool,
    pub data: Vec<Category>,
}

pub async fn list_products(
    State(state): State<AppState>,
    params: std::result::Result<Query<ProductListParams>, QueryRejection>,
) -> Result<Json<ProductListResponse>> {
    let Query(params) = params.map_err(|e| AppError::BadRequest(e.body_text()))?;
    let query = params.into_query();

    let page = state.catalog.search_products(&query).await?;

    Ok(Json(ProductListResponse {
        success: true,
        data: page.products,
        pagination: Pagination::new(query.page, query.limit, page.total),
    }))
}

pub async fn list_categories(State(state): State<AppState>) -> Result<Json<CategoryListResponse>> {
    let categories = state.catalog.list_categories().await?;

    Ok(Json(CategoryListResponse {
        success: true,
        data: categories,
    }))
}
