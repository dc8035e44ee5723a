// Odoo record shapes as returned by search_read/read.
// Odoo encodes empty scalars as `false` and many2one fields as `[id, "name"]`;
// both are decoded here so nothing downstream touches raw positional arrays.

use serde::{Deserialize, Deserializer, Serialize};

/// A many2one reference: `[id, "display name"]` on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "(i64, String)")]
pub struct RemoteRef {
    pub id: i64,
    pub display_name: String,
}

impl From<(i64, String)> for RemoteRef {
    fn from((id, display_name): (i64, String)) -> Self {
        Self { id, display_name }
    }
}

/// Deserialize a field that Odoo sends as either a value, `false` or `null`.
pub fn falsy<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OrFalse<T> {
        Value(T),
        Flag(bool),
    }

    Ok(match Option::<OrFalse<T>>::deserialize(deserializer)? {
        Some(OrFalse::Value(value)) => Some(value),
        _ => None,
    })
}

#[derive(Debug, Clone, Deserialize)]
pub struct OdooCategory {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "falsy")]
    pub parent_id: Option<RemoteRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OdooProduct {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "falsy")]
    pub default_code: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub list_price: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub standard_price: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub qty_available: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub virtual_available: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub description_sale: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub categ_id: Option<RemoteRef>,
    #[serde(default, deserialize_with = "falsy")]
    pub uom_id: Option<RemoteRef>,
    #[serde(default, deserialize_with = "falsy")]
    pub write_date: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
    #[serde(default, deserialize_with = "falsy")]
    pub image_1920: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OdooPartner {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "falsy")]
    pub email: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub street: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OdooSaleOrder {
    pub id: i64,
    pub name: String,
    #[serde(default, deserialize_with = "falsy")]
    pub partner_id: Option<RemoteRef>,
    #[serde(default, deserialize_with = "falsy")]
    pub origin: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub client_order_ref: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub note: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub date_order: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OdooSaleOrderLine {
    pub id: i64,
    #[serde(default, deserialize_with = "falsy")]
    pub product_id: Option<RemoteRef>,
    #[serde(default, deserialize_with = "falsy")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "falsy")]
    pub product_uom_qty: Option<f64>,
    #[serde(default, deserialize_with = "falsy")]
    pub price_unit: Option<f64>,
}

/// Just the display name of a record, as returned by `read(fields=["name"])`.
#[derive(Debug, Clone, Deserialize)]
pub struct OdooDisplayName {
    pub id: i64,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_false_fields_decode_as_none() {
        let product: OdooProduct = serde_json::from_value(json!({
            "id": 7,
            "name": "Paracetamol 500mg",
            "default_code": false,
            "list_price": 4.5,
            "qty_available": false,
            "categ_id": false,
            "uom_id": [1, "Units"],
            "write_date": "2024-05-01 08:30:00"
        }))
        .unwrap();

        assert_eq!(product.default_code, None);
        assert_eq!(product.list_price, Some(4.5));
        assert_eq!(product.qty_available, None);
        assert_eq!(product.categ_id, None);
        assert_eq!(product.uom_id.unwrap().display_name, "Units");
        assert_eq!(product.active, None);
    }

    #[test]
    fn test_many2one_decodes_into_remote_ref() {
        let category: OdooCategory = serde_json::from_value(json!({
            "id": 12,
            "name": "Analgesicos",
            "parent_id": [5, "Otc"]
        }))
        .unwrap();

        assert_eq!(category.parent_id, Some(RemoteRef { id: 5, display_name: "Otc".to_string() }));
    }
}
