use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Status given to every order the bridge records; there is no local-only
/// pending state.
pub const ORDER_STATUS_CONFIRMED: &str = "confirmed";

/// Largest value the `NUMERIC(14, 4)` money columns hold.
pub const MAX_AMOUNT: Decimal = dec!(9999999999.9999);

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Customer {
    pub id: Uuid,
    pub odoo_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// Customer row keyed by email.
#[derive(Debug, Clone)]
pub struct CustomerUpsert {
    pub odoo_id: Option<i64>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Order {
    pub id: Uuid,
    pub customer_id: Option<Uuid>,
    pub odoo_id: Option<String>,
    pub odoo_name: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub total_amount: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub synced_to_odoo: bool,
    pub synced_at: Option<DateTime<Utc>>,
    pub idempotency_key: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn remote_order_id(&self) -> Option<i64> {
        self.odoo_id.as_deref().and_then(|id| id.parse().ok())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OrderLine {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub price_unit: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderWithLines {
    #[serde(flatten)]
    pub order: Order,
    pub order_lines: Vec<OrderLine>,
}

/// Order header written after the remote sale order exists.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer_id: Option<Uuid>,
    pub odoo_id: String,
    pub odoo_name: Option<String>,
    pub customer_name: String,
    pub customer_email: String,
    pub customer_phone: Option<String>,
    pub total_amount: Decimal,
    pub status: String,
    pub notes: Option<String>,
    pub synced_at: DateTime<Utc>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub product_name: String,
    pub quantity: i32,
    pub price_unit: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct OrderItemRequest {
    pub product_id: i64,
    #[validate(length(min = 1, message = "Product name is required"))]
    pub name: String,
    pub sku: Option<String>,
    #[validate(custom(function = "validate_price"))]
    pub price: Decimal,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
}

impl OrderItemRequest {
    /// `None` when price × quantity does not fit a money column.
    pub fn subtotal(&self) -> Option<Decimal> {
        self.price
            .checked_mul(Decimal::from(self.quantity))
            .filter(|subtotal| *subtotal <= MAX_AMOUNT)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[validate(schema(function = "validate_order_total"))]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(email(message = "A valid email is required"))]
    pub customer_email: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub customer_address: Option<String>,
    #[validate(length(min = 1, message = "An order needs at least one item"), nested)]
    pub items: Vec<OrderItemRequest>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Client-generated token; resubmitting with the same key returns the
    /// first order instead of creating another.
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl CreateOrderRequest {
    /// `None` when any subtotal or the sum does not fit a money column.
    pub fn total_amount(&self) -> Option<Decimal> {
        self.items
            .iter()
            .try_fold(Decimal::ZERO, |total, item| total.checked_add(item.subtotal()?))
            .filter(|total| *total <= MAX_AMOUNT)
    }
}

fn validate_price(price: &Decimal) -> Result<(), ValidationError> {
    if price.is_sign_negative() {
        return Err(ValidationError::new("negative_price"));
    }
    if *price > MAX_AMOUNT {
        return Err(ValidationError::new("price_too_large"));
    }
    Ok(())
}

fn validate_order_total(request: &CreateOrderRequest) -> Result<(), ValidationError> {
    if request.total_amount().is_none() {
        return Err(ValidationError::new("total_too_large"));
    }
    Ok(())
}

/// Identifiers of both sides of a submitted order.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct OrderSubmission {
    pub order_uuid: Uuid,
    pub odoo_order_id: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReconcileReport {
    pub examined: usize,
    pub already_recorded: usize,
    pub restored: usize,
    pub skipped_without_email: usize,
    pub skipped_without_lines: usize,
    /// Web orders whose client reference is already recorded for another Odoo order.
    pub duplicate_remote_orders: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(price: Decimal, quantity: i32) -> OrderItemRequest {
        OrderItemRequest {
            product_id: 1,
            name: "Item".to_string(),
            sku: None,
            price,
            quantity,
        }
    }

    fn request(items: Vec<OrderItemRequest>) -> CreateOrderRequest {
        CreateOrderRequest {
            customer_name: "Ana Torres".to_string(),
            customer_email: "ana@example.com".to_string(),
            customer_phone: None,
            customer_address: None,
            items,
            notes: None,
            idempotency_key: None,
        }
    }

    #[test]
    fn test_total_is_sum_of_subtotals() {
        let req = request(vec![item(dec!(10.50), 2), item(dec!(3.00), 1)]);
        assert_eq!(req.total_amount(), Some(dec!(24.00)));
        assert_eq!(req.items[0].subtotal(), Some(dec!(21.00)));
    }

    #[test]
    fn test_validation_rejects_empty_and_bad_items() {
        assert!(request(vec![]).validate().is_err());
        assert!(request(vec![item(dec!(1), 0)]).validate().is_err());
        assert!(request(vec![item(dec!(-1), 1)]).validate().is_err());
        assert!(request(vec![item(dec!(1), 1)]).validate().is_ok());

        let mut bad_email = request(vec![item(dec!(1), 1)]);
        bad_email.customer_email = "not-an-email".to_string();
        assert!(bad_email.validate().is_err());
    }

    #[test]
    fn test_amounts_beyond_money_columns_are_rejected() {
        let huge = Decimal::from_str_exact("50000000000000000000000000000").unwrap();
        let overflowing = request(vec![item(huge, 2)]);
        assert_eq!(overflowing.items[0].subtotal(), None);
        assert_eq!(overflowing.total_amount(), None);
        assert!(overflowing.validate().is_err());

        assert!(request(vec![item(MAX_AMOUNT, 1)]).validate().is_ok());
        assert!(request(vec![item(MAX_AMOUNT + dec!(1), 1)]).validate().is_err());

        // each line fits, the sum does not
        let summed = request(vec![item(dec!(6000000000), 1), item(dec!(6000000000), 1)]);
        assert_eq!(summed.items[0].subtotal(), Some(dec!(6000000000)));
        assert_eq!(summed.total_amount(), None);
        assert!(summed.validate().is_err());
    }
}
