// Odoo <-> local record mapping
// Pure functions: absent or falsy upstream values map to None/zero, never to an error.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::{DateTime, NaiveDateTime, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::models::catalog::{CategoryUpsert, ProductUpsert};
use crate::models::odoo::{OdooCategory, OdooProduct, OdooSaleOrderLine, RemoteRef};
use crate::models::order::{NewOrderLine, OrderItemRequest};

pub const PRODUCT_MODEL: &str = "product.product";

/// Format of Odoo datetime fields (naive, UTC).
pub const ODOO_DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Characters escaped in the `unique=` cache-busting parameter.
const QUERY_VALUE: &AsciiSet = &CONTROLS.add(b' ').add(b'"').add(b'#').add(b'&').add(b'+').add(b'<').add(b'>');

/// How product images are carried into the local store.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageMode {
    /// URL into Odoo's image controller; no binary payload is fetched.
    Listing { base_url: String },
    /// Inline data URI built from the fetched `image_1920` field.
    Detail,
}

pub fn map_category(record: &OdooCategory) -> CategoryUpsert {
    let (parent_id, parent_name) = split_ref(record.parent_id.as_ref());
    CategoryUpsert {
        odoo_id: record.id,
        name: record.name.clone(),
        parent_id,
        parent_name,
    }
}

/// `fetched_at` stands in for a missing or unreadable `write_date`.
pub fn map_product(record: &OdooProduct, mode: &ImageMode, fetched_at: DateTime<Utc>) -> ProductUpsert {
    let (category_id, category_name) = split_ref(record.categ_id.as_ref());

    let image_url = match mode {
        ImageMode::Listing { base_url } => Some(listing_image_url(
            base_url,
            PRODUCT_MODEL,
            record.id,
            record.write_date.as_deref().unwrap_or_default(),
        )),
        ImageMode::Detail => record
            .image_1920
            .as_deref()
            .filter(|data| !data.is_empty())
            .map(image_data_uri),
    };

    // Listing fetches only cover active products and skip the cost field.
    let (cost_price, active) = match mode {
        ImageMode::Listing { .. } => (None, true),
        ImageMode::Detail => (
            Some(decimal_or_zero(record.standard_price)),
            record.active.unwrap_or(true),
        ),
    };

    ProductUpsert {
        odoo_id: record.id,
        name: record.name.clone(),
        sku: non_empty(record.default_code.as_deref()),
        list_price: decimal_or_zero(record.list_price),
        cost_price,
        qty_available: decimal_or_zero(record.qty_available),
        virtual_available: decimal_or_zero(record.virtual_available),
        description: non_empty(record.description_sale.as_deref()),
        image_url,
        category_id,
        category_name,
        uom_name: record.uom_id.as_ref().map(|uom| uom.display_name.clone()),
        active,
        write_date: record
            .write_date
            .as_deref()
            .and_then(parse_odoo_datetime)
            .unwrap_or(fetched_at),
    }
}

/// One2many "create" command `[0, 0, values]` for a sale order line.
pub fn order_line_command(item: &OrderItemRequest) -> Value {
    json!([
        0,
        0,
        {
            "product_id": item.product_id,
            "product_uom_qty": item.quantity,
            "price_unit": item.price.to_f64().unwrap_or_default(),
            "name": item.name,
        }
    ])
}

/// `None` when the line total does not fit a money column.
pub fn map_order_item(item: &OrderItemRequest) -> Option<NewOrderLine> {
    Some(NewOrderLine {
        product_id: item.product_id,
        product_name: item.name.clone(),
        quantity: item.quantity,
        price_unit: item.price,
        subtotal: item.subtotal()?,
    })
}

/// Local line rebuilt from a remote sale order line. Lines without a
/// product (section or note lines) yield `None`.
pub fn map_remote_order_line(line: &OdooSaleOrderLine) -> Option<NewOrderLine> {
    let product = line.product_id.as_ref()?;
    let quantity = line.product_uom_qty.unwrap_or_default().round() as i32;
    if quantity <= 0 {
        return None;
    }
    let price_unit = decimal_or_zero(line.price_unit);

    Some(NewOrderLine {
        product_id: product.id,
        product_name: non_empty(line.name.as_deref()).unwrap_or_else(|| product.display_name.clone()),
        quantity,
        price_unit,
        subtotal: price_unit.checked_mul(Decimal::from(quantity))?,
    })
}

pub fn listing_image_url(base_url: &str, model: &str, remote_id: i64, write_date: &str) -> String {
    format!(
        "{}/web/image/{}/{}/image_512?unique={}",
        base_url.trim_end_matches('/'),
        model,
        remote_id,
        utf8_percent_encode(write_date, QUERY_VALUE)
    )
}

/// `data:` URI for base64 image data, with the mime type sniffed from the
/// decoded header bytes.
pub fn image_data_uri(base64_data: &str) -> String {
    format!("data:{};base64,{}", sniff_image_mime(base64_data), base64_data)
}

fn sniff_image_mime(base64_data: &str) -> &'static str {
    let prefix_len = base64_data.len().min(16) / 4 * 4;
    let header = base64_data
        .get(..prefix_len)
        .and_then(|prefix| STANDARD.decode(prefix).ok())
        .unwrap_or_default();

    if header.starts_with(&[0x89, b'P', b'N', b'G']) {
        "image/png"
    } else if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        "image/jpeg"
    } else if header.starts_with(b"GIF8") {
        "image/gif"
    } else if header.len() >= 12 && &header[..4] == b"RIFF" && &header[8..12] == b"WEBP" {
        "image/webp"
    } else {
        "image/png"
    }
}

pub fn parse_odoo_datetime(raw: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(raw, ODOO_DATETIME_FORMAT)
        .map(|naive| naive.and_utc())
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.with_timezone(&Utc)))
}

pub fn format_odoo_datetime(value: DateTime<Utc>) -> String {
    value.format(ODOO_DATETIME_FORMAT).to_string()
}

fn split_ref(reference: Option<&RemoteRef>) -> (Option<i64>, Option<String>) {
    match reference {
        Some(r) => (Some(r.id), Some(r.display_name.clone())),
        None => (None, None),
    }
}

fn decimal_or_zero(value: Option<f64>) -> Decimal {
    value
        .and_then(Decimal::from_f64)
        .map(|d| d.normalize())
        .unwrap_or(Decimal::ZERO)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty()).map(str::to_string)
}
