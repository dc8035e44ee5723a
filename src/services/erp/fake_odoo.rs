// In-process stand-in for an Odoo server, used by unit tests.
// Understands authenticate plus search/search_read/read/create over a few models.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};

use super::odoo_client::{OdooClient, RpcTransport, TransportError};
use crate::config::OdooConfig;

#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// `common` for session calls, the model name for execute_kw.
    pub target: String,
    pub method: String,
    pub args: Vec<Value>,
    pub kwargs: Map<String, Value>,
}

#[derive(Default)]
struct FakeState {
    categories: Vec<Value>,
    products: Vec<Value>,
    partners: Vec<Value>,
    sale_orders: Vec<Value>,
    order_lines: Vec<Value>,
    next_id: i64,
    calls: Vec<RecordedCall>,
    failing: HashSet<(String, String)>,
}

impl FakeState {
    fn table(&mut self, model: &str) -> Option<&mut Vec<Value>> {
        match model {
            "product.category" => Some(&mut self.categories),
            "product.product" => Some(&mut self.products),
            "res.partner" => Some(&mut self.partners),
            "sale.order" => Some(&mut self.sale_orders),
            "sale.order.line" => Some(&mut self.order_lines),
            _ => None,
        }
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        1000 + self.next_id
    }
}

#[derive(Clone, Default)]
pub struct FakeOdoo {
    state: Arc<Mutex<FakeState>>,
}

impl FakeOdoo {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config() -> OdooConfig {
        OdooConfig {
            url: "https://erp.test".to_string(),
            database: "giofarma".to_string(),
            username: "bot@example.com".to_string(),
            api_key: "secret".to_string(),
            timeout_secs: 5,
        }
    }

    pub fn client(&self) -> OdooClient {
        OdooClient::new(Self::config(), Arc::new(self.clone()))
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut guard = self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut guard)
    }

    pub fn add_category(&self, id: i64, name: &str, parent: Option<(i64, &str)>) {
        let parent = parent.map(|(pid, pname)| json!([pid, pname])).unwrap_or(json!(false));
        self.with_state(|s| s.categories.push(json!({"id": id, "name": name, "parent_id": parent})));
    }

    pub fn add_product(&self, id: i64, name: &str, write_date: &str) {
        self.with_state(|s| {
            s.products.push(json!({
                "id": id,
                "name": name,
                "default_code": format!("SKU-{}", id),
                "list_price": 10.0,
                "standard_price": 6.0,
                "qty_available": 5.0,
                "virtual_available": 4.0,
                "description_sale": false,
                "categ_id": [1, "Salud"],
                "uom_id": [1, "Unidades"],
                "write_date": write_date,
                "sale_ok": true,
                "active": true,
                "image_1920": false,
            }))
        });
    }

    pub fn add_products(&self, count: i64, write_date: &str) {
        for id in 1..=count {
            self.add_product(id, &format!("Producto {}", id), write_date);
        }
    }

    pub fn set_product_field(&self, id: i64, field: &str, value: Value) {
        self.with_state(|s| {
            if let Some(record) = s.products.iter_mut().find(|p| p["id"] == json!(id)) {
                record[field] = value;
            }
        });
    }

    pub fn add_partner(&self, name: &str, email: &str) -> i64 {
        self.with_state(|s| {
            let id = s.allocate_id();
            s.partners.push(json!({"id": id, "name": name, "email": email, "phone": false, "street": false}));
            id
        })
    }

    pub fn fail_method(&self, model: &str, method: &str) {
        self.with_state(|s| s.failing.insert((model.to_string(), method.to_string())));
    }

    pub fn clear_failures(&self) {
        self.with_state(|s| s.failing.clear());
    }

    pub fn calls(&self, target: &str, method: &str) -> Vec<RecordedCall> {
        self.with_state(|s| {
            s.calls
                .iter()
                .filter(|c| c.target == target && c.method == method)
                .cloned()
                .collect()
        })
    }

    pub fn call_count(&self, target: &str, method: &str) -> usize {
        self.calls(target, method).len()
    }

    pub fn partners(&self) -> Vec<Value> {
        self.with_state(|s| s.partners.clone())
    }

    pub fn order_lines(&self) -> Vec<Value> {
        self.with_state(|s| s.order_lines.clone())
    }

    pub fn sale_orders(&self) -> Vec<Value> {
        self.with_state(|s| s.sale_orders.clone())
    }

    fn execute(state: &mut FakeState, model: &str, method: &str, args: &[Value], kwargs: &Map<String, Value>) -> Result<Value, String> {
        match method {
            "search_read" | "search" => {
                let domain = args.first().cloned().unwrap_or(json!([]));
                let active_test = kwargs
                    .get("context")
                    .and_then(|c| c.get("active_test"))
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                let offset = kwargs.get("offset").and_then(Value::as_u64).unwrap_or(0) as usize;
                let limit = kwargs.get("limit").and_then(Value::as_u64).map(|l| l as usize);

                let table = state.table(model).ok_or_else(|| format!("unknown model {}", model))?;
                let matched = table
                    .iter()
                    .filter(|r| !active_test || r.get("active") != Some(&json!(false)))
                    .filter(|r| matches_domain(r, &domain))
                    .skip(offset)
                    .take(limit.unwrap_or(usize::MAX));

                if method == "search" {
                    Ok(Value::Array(matched.map(|r| r["id"].clone()).collect()))
                } else {
                    Ok(Value::Array(matched.cloned().collect()))
                }
            }
            "read" => {
                let ids = args.first().and_then(Value::as_array).cloned().unwrap_or_default();
                let table = state.table(model).ok_or_else(|| format!("unknown model {}", model))?;
                Ok(Value::Array(
                    table.iter().filter(|r| ids.contains(&r["id"])).cloned().collect(),
                ))
            }
            "create" => {
                let mut values = args.first().cloned().unwrap_or(json!({}));
                let id = state.allocate_id();
                values["id"] = json!(id);

                if model == "sale.order" {
                    let name = format!("S{:05}", id);
                    values["name"] = json!(name);
                    if values.get("date_order").is_none() {
                        values["date_order"] = json!(Utc::now().format("%Y-%m-%d %H:%M:%S").to_string());
                    }
                    let partner_id = values["partner_id"].as_i64().unwrap_or_default();
                    let partner_name = state
                        .partners
                        .iter()
                        .find(|p| p["id"] == json!(partner_id))
                        .map(|p| p["name"].clone())
                        .unwrap_or(json!(""));
                    values["partner_id"] = json!([partner_id, partner_name]);

                    let commands = values["order_line"].as_array().cloned().unwrap_or_default();
                    for command in commands {
                        let line = &command[2];
                        let line_id = state.allocate_id();
                        state.order_lines.push(json!({
                            "id": line_id,
                            "order_id": [id, name],
                            "product_id": [line["product_id"], line["name"]],
                            "name": line["name"],
                            "product_uom_qty": line["product_uom_qty"],
                            "price_unit": line["price_unit"],
                        }));
                    }
                    if let Some(fields) = values.as_object_mut() {
                        fields.remove("order_line");
                    }
                }

                let table = state.table(model).ok_or_else(|| format!("unknown model {}", model))?;
                table.push(values);
                Ok(json!(id))
            }
            other => Err(format!("method {} not supported", other)),
        }
    }
}

fn field_matches(field_value: &Value, op: &str, expected: &Value) -> bool {
    // many2one values compare on their id
    let actual = match field_value {
        Value::Array(pair) if !expected.is_array() => pair.first().unwrap_or(&Value::Null),
        other => other,
    };

    match op {
        "=" => actual == expected,
        "!=" => actual != expected,
        ">=" => match (actual, expected) {
            (Value::String(a), Value::String(b)) => a >= b,
            (Value::Number(a), Value::Number(b)) => a.as_f64() >= b.as_f64(),
            _ => false,
        },
        _ => false,
    }
}

fn matches_domain(record: &Value, domain: &Value) -> bool {
    domain.as_array().map_or(true, |conditions| {
        conditions.iter().all(|condition| match condition.as_array().map(Vec::as_slice) {
            Some([field, op, expected]) => {
                let field = field.as_str().unwrap_or_default();
                let op = op.as_str().unwrap_or_default();
                field_matches(record.get(field).unwrap_or(&Value::Null), op, expected)
            }
            _ => true,
        })
    })
}

#[async_trait]
impl RpcTransport for FakeOdoo {
    async fn call(&self, service: &str, method: &str, args: Vec<Value>) -> Result<Value, TransportError> {
        self.with_state(|state| {
            if service == "common" {
                state.calls.push(RecordedCall {
                    target: "common".to_string(),
                    method: method.to_string(),
                    args: args.clone(),
                    kwargs: Map::new(),
                });
                return match method {
                    "authenticate" if args.get(2) == Some(&json!("secret")) => Ok(json!(2)),
                    "authenticate" => Ok(json!(false)),
                    other => Err(TransportError::Fault { code: 404, message: format!("no method {}", other) }),
                };
            }

            let model = args.get(3).and_then(Value::as_str).unwrap_or_default().to_string();
            let model_method = args.get(4).and_then(Value::as_str).unwrap_or_default().to_string();
            let call_args = args.get(5).and_then(Value::as_array).cloned().unwrap_or_default();
            let kwargs = args.get(6).and_then(Value::as_object).cloned().unwrap_or_default();

            state.calls.push(RecordedCall {
                target: model.clone(),
                method: model_method.clone(),
                args: call_args.clone(),
                kwargs: kwargs.clone(),
            });

            if args.get(2) != Some(&json!("secret")) {
                return Err(TransportError::Fault { code: 100, message: "Access Denied".to_string() });
            }
            if state.failing.contains(&(model.clone(), model_method.clone())) {
                return Err(TransportError::Fault {
                    code: 200,
                    message: format!("{}.{} rejected", model, model_method),
                });
            }

            FakeOdoo::execute(state, &model, &model_method, &call_args, &kwargs)
                .map_err(|message| TransportError::Fault { code: 300, message })
        })
    }
}
