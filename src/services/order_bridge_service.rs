// Order Bridge Service
// Checkout orders are written to Odoo first; the local copy follows.
// A remote order whose local write failed is an orphan that
// reconcile_remote_orders() restores later.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Map, Value};
use thiserror::Error;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::models::odoo::{OdooDisplayName, OdooPartner, OdooSaleOrder, OdooSaleOrderLine};
use crate::models::order::{
    CreateOrderRequest, CustomerUpsert, NewOrder, NewOrderLine, Order, OrderSubmission, OrderWithLines,
    ReconcileReport, ORDER_STATUS_CONFIRMED,
};
use crate::repositories::{OrderStore, StoreError};
use crate::services::erp::entity_mapper::{self, format_odoo_datetime};
use crate::services::erp::{OdooClient, OdooError};
use crate::utils::log_sanitizer::{mask_email, sanitize_for_log};

/// `origin` stamped on every sale order created from the web catalog.
pub const ORDER_ORIGIN: &str = "Catálogo Web GioFarma";

const PARTNER_MODEL: &str = "res.partner";
const SALE_ORDER_MODEL: &str = "sale.order";
const SALE_ORDER_LINE_MODEL: &str = "sale.order.line";

#[derive(Error, Debug)]
pub enum OrderError {
    #[error("Invalid order: {0}")]
    Validation(#[from] ValidationErrors),

    #[error("Odoo error: {0}")]
    Remote(#[from] OdooError),

    #[error("Local storage error: {0}")]
    Storage(#[from] StoreError),

    /// The key already names a sale order that belongs to someone else.
    #[error("Client reference {key} is already used by another Odoo order")]
    KeyConflict { key: String },

    /// The sale order exists in Odoo but the local record could not be written.
    #[error("Odoo order {remote_order_id} was created but could not be stored locally: {source}")]
    LocalPersist {
        remote_order_id: i64,
        #[source]
        source: StoreError,
    },
}

pub type Result<T> = std::result::Result<T, OrderError>;

/// Remote side of a submission, known before anything is written locally.
/// Lines and total of a validated request, fixed before any remote call.
struct PricedOrder {
    lines: Vec<NewOrderLine>,
    total: Decimal,
}

struct RemoteOrder {
    partner_id: i64,
    order_id: i64,
    order_name: Option<String>,
}

pub struct OrderBridgeService {
    odoo: Arc<OdooClient>,
    store: Arc<dyn OrderStore>,
}

impl OrderBridgeService {
    pub fn new(odoo: Arc<OdooClient>, store: Arc<dyn OrderStore>) -> Self {
        Self { odoo, store }
    }

    // ========================================================================
    // Submission
    // ========================================================================

    pub async fn submit(&self, request: &CreateOrderRequest) -> Result<OrderSubmission> {
        request.validate()?;
        let priced = price_order(request)?;

        let key = request
            .idempotency_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty());

        if let Some(key) = key {
            if let Some(existing) = self.store.find_order_by_idempotency_key(key).await? {
                tracing::info!("Order {} already submitted under key {}", existing.id, sanitize_for_log(key));
                return submission_for(&existing);
            }
        }

        let remote = self.push_remote(request, key).await?;

        match self.persist_local(request, key, &remote, &priced).await {
            Ok(order) => {
                tracing::info!(
                    "Order {} recorded for {} as Odoo order {}",
                    order.id,
                    mask_email(&request.customer_email),
                    remote.order_id
                );
                Ok(OrderSubmission {
                    order_uuid: order.id,
                    odoo_order_id: remote.order_id,
                })
            }
            // A concurrent submit with the same key won the insert.
            Err(StoreError::Conflict(what)) => {
                let existing = match key {
                    Some(key) => self.store.find_order_by_idempotency_key(key).await?,
                    None => None,
                };
                match existing {
                    Some(order) => {
                        if order.remote_order_id() != Some(remote.order_id) {
                            tracing::error!(
                                "Duplicate Odoo order {}: key already recorded for Odoo order {}",
                                remote.order_id,
                                order.odoo_id.as_deref().unwrap_or("?")
                            );
                        }
                        submission_for(&order)
                    }
                    None => Err(self.orphaned(remote.order_id, StoreError::Conflict(what))),
                }
            }
            Err(e) => Err(self.orphaned(remote.order_id, e)),
        }
    }

    fn orphaned(&self, remote_order_id: i64, source: StoreError) -> OrderError {
        tracing::error!(
            "Orphaned Odoo order {}: created remotely but not stored locally: {}",
            remote_order_id,
            source
        );
        OrderError::LocalPersist { remote_order_id, source }
    }

    /// Steps on the Odoo side. Nothing local is written until these succeed.
    async fn push_remote(&self, request: &CreateOrderRequest, key: Option<&str>) -> Result<RemoteOrder> {
        let partner_id = self.find_or_create_partner(request).await?;

        let reused = match key {
            Some(key) => self.find_remote_order_by_ref(key, partner_id).await?,
            None => None,
        };

        let order_id = match reused {
            Some(id) => {
                tracing::warn!(
                    "Reusing Odoo order {} carrying client reference {}",
                    id,
                    sanitize_for_log(key.unwrap_or_default())
                );
                id
            }
            None => {
                let id = self
                    .odoo
                    .create(SALE_ORDER_MODEL, sale_order_values(request, partner_id, key))
                    .await?;
                tracing::info!("Created Odoo sale order {} with {} lines", id, request.items.len());
                id
            }
        };

        let names: Vec<OdooDisplayName> = self.odoo.read(SALE_ORDER_MODEL, &[order_id], &["name"]).await?;

        Ok(RemoteOrder {
            partner_id,
            order_id,
            order_name: names.into_iter().next().map(|n| n.name),
        })
    }

    async fn find_or_create_partner(&self, request: &CreateOrderRequest) -> Result<i64> {
        let mut kwargs = Map::new();
        kwargs.insert("limit".to_string(), json!(1));

        let existing = self
            .odoo
            .search(PARTNER_MODEL, json!([["email", "=", request.customer_email]]), kwargs)
            .await?;

        if let Some(&id) = existing.first() {
            return Ok(id);
        }

        let mut values = Map::new();
        values.insert("name".to_string(), json!(request.customer_name));
        values.insert("email".to_string(), json!(request.customer_email));
        values.insert("customer_rank".to_string(), json!(1));
        if let Some(phone) = &request.customer_phone {
            values.insert("phone".to_string(), json!(phone));
        }
        if let Some(address) = &request.customer_address {
            values.insert("street".to_string(), json!(address));
        }

        let id = self.odoo.create(PARTNER_MODEL, Value::Object(values)).await?;
        tracing::info!("Created Odoo partner {} for {}", id, mask_email(&request.customer_email));
        Ok(id)
    }

    /// A sale order is only reused when it is a web order of this partner.
    /// The same reference on any other order is a conflict.
    async fn find_remote_order_by_ref(&self, key: &str, partner_id: i64) -> Result<Option<i64>> {
        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), json!(["id", "name", "origin", "partner_id"]));

        let orders: Vec<OdooSaleOrder> = self
            .odoo
            .search_read(SALE_ORDER_MODEL, json!([["client_order_ref", "=", key]]), kwargs)
            .await?;

        let own = orders.iter().find(|order| {
            order.origin.as_deref() == Some(ORDER_ORIGIN)
                && order.partner_id.as_ref().map(|p| p.id) == Some(partner_id)
        });

        match own {
            Some(order) => Ok(Some(order.id)),
            None if orders.is_empty() => Ok(None),
            None => {
                tracing::warn!(
                    "Client reference {} belongs to Odoo order {}, refusing to reuse it",
                    sanitize_for_log(key),
                    orders[0].id
                );
                Err(OrderError::KeyConflict { key: key.to_string() })
            }
        }
    }

    async fn persist_local(
        &self,
        request: &CreateOrderRequest,
        key: Option<&str>,
        remote: &RemoteOrder,
        priced: &PricedOrder,
    ) -> std::result::Result<Order, StoreError> {
        let customer = self
            .store
            .upsert_customer(&CustomerUpsert {
                odoo_id: Some(remote.partner_id),
                name: request.customer_name.clone(),
                email: request.customer_email.clone(),
                phone: request.customer_phone.clone(),
                address: request.customer_address.clone(),
            })
            .await?;

        self.store
            .insert_order(
                &NewOrder {
                    customer_id: Some(customer.id),
                    odoo_id: remote.order_id.to_string(),
                    odoo_name: remote.order_name.clone(),
                    customer_name: request.customer_name.clone(),
                    customer_email: request.customer_email.clone(),
                    customer_phone: request.customer_phone.clone(),
                    total_amount: priced.total,
                    status: ORDER_STATUS_CONFIRMED.to_string(),
                    notes: request.notes.clone(),
                    synced_at: Utc::now(),
                    idempotency_key: key.map(str::to_string),
                },
                &priced.lines,
            )
            .await
    }

    pub async fn orders_by_email(&self, email: &str) -> Result<Vec<OrderWithLines>> {
        Ok(self.store.orders_by_email(email.trim()).await?)
    }

    // ========================================================================
    // Reconciliation
    // ========================================================================

    /// Restore local records for web-origin Odoo orders dated at or after
    /// `since` that have no local order. Orders already recorded are left
    /// untouched, so repeated passes are harmless.
    pub async fn reconcile_remote_orders(&self, since: DateTime<Utc>) -> Result<ReconcileReport> {
        let mut kwargs = Map::new();
        kwargs.insert(
            "fields".to_string(),
            json!(["id", "name", "partner_id", "client_order_ref", "note", "date_order"]),
        );
        kwargs.insert("order".to_string(), json!("id asc"));

        let remote_orders: Vec<OdooSaleOrder> = self
            .odoo
            .search_read(
                SALE_ORDER_MODEL,
                json!([["origin", "=", ORDER_ORIGIN], ["date_order", ">=", format_odoo_datetime(since)]]),
                kwargs,
            )
            .await?;

        let mut report = ReconcileReport::default();

        for remote in &remote_orders {
            report.examined += 1;

            if self.store.find_order_by_remote_id(remote.id).await?.is_some() {
                report.already_recorded += 1;
                continue;
            }

            let contact = self.remote_partner(remote).await?.and_then(|partner| {
                let email = partner.email.clone().filter(|e| !e.trim().is_empty())?;
                Some((partner, email))
            });
            let Some((partner, email)) = contact else {
                tracing::warn!("Odoo order {} has no partner with an email, skipping", remote.id);
                report.skipped_without_email += 1;
                continue;
            };

            let lines = self.remote_order_lines(remote.id).await?;
            if lines.is_empty() {
                tracing::warn!("Odoo order {} has no product lines, skipping", remote.id);
                report.skipped_without_lines += 1;
                continue;
            }

            match self.restore_order(remote, &partner, email, &lines).await {
                Ok(order) => {
                    tracing::info!("Restored local order {} for Odoo order {}", order.id, remote.id);
                    report.restored += 1;
                }
                Err(StoreError::Conflict(_)) => {
                    if self.is_duplicate_of_recorded_key(remote).await? {
                        tracing::error!(
                            "Odoo order {} duplicates a recorded order with the same client reference",
                            remote.id
                        );
                        report.duplicate_remote_orders += 1;
                    } else {
                        report.already_recorded += 1;
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            "Reconciliation examined {} orders: {} recorded, {} restored, {} skipped",
            report.examined,
            report.already_recorded,
            report.restored,
            report.skipped_without_email + report.skipped_without_lines
        );
        if report.duplicate_remote_orders > 0 {
            tracing::error!("{} duplicate Odoo orders need manual review", report.duplicate_remote_orders);
        }

        Ok(report)
    }

    async fn is_duplicate_of_recorded_key(&self, remote: &OdooSaleOrder) -> Result<bool> {
        let Some(key) = remote.client_order_ref.as_deref() else {
            return Ok(false);
        };
        let recorded = self.store.find_order_by_idempotency_key(key).await?;
        Ok(recorded.is_some_and(|order| order.remote_order_id() != Some(remote.id)))
    }

    async fn remote_partner(&self, remote: &OdooSaleOrder) -> Result<Option<OdooPartner>> {
        let Some(partner_ref) = &remote.partner_id else {
            return Ok(None);
        };
        let partners: Vec<OdooPartner> = self
            .odoo
            .read(PARTNER_MODEL, &[partner_ref.id], &["id", "name", "email", "phone", "street"])
            .await?;
        Ok(partners.into_iter().next())
    }

    async fn remote_order_lines(&self, order_id: i64) -> Result<Vec<NewOrderLine>> {
        let mut kwargs = Map::new();
        kwargs.insert(
            "fields".to_string(),
            json!(["id", "product_id", "name", "product_uom_qty", "price_unit"]),
        );

        let lines: Vec<OdooSaleOrderLine> = self
            .odoo
            .search_read(SALE_ORDER_LINE_MODEL, json!([["order_id", "=", order_id]]), kwargs)
            .await?;

        Ok(lines.iter().filter_map(entity_mapper::map_remote_order_line).collect())
    }

    async fn restore_order(
        &self,
        remote: &OdooSaleOrder,
        partner: &OdooPartner,
        email: String,
        lines: &[NewOrderLine],
    ) -> std::result::Result<Order, StoreError> {
        let customer = self
            .store
            .upsert_customer(&CustomerUpsert {
                odoo_id: Some(partner.id),
                name: partner.name.clone(),
                email: email.clone(),
                phone: partner.phone.clone(),
                address: partner.street.clone(),
            })
            .await?;

        let total_amount = lines
            .iter()
            .try_fold(Decimal::ZERO, |total, line| total.checked_add(line.subtotal))
            .ok_or_else(|| StoreError::Corrupt(format!("Odoo order {} total overflows", remote.id)))?;

        let synced_at = remote
            .date_order
            .as_deref()
            .and_then(entity_mapper::parse_odoo_datetime)
            .unwrap_or_else(Utc::now);

        self.store
            .insert_order(
                &NewOrder {
                    customer_id: Some(customer.id),
                    odoo_id: remote.id.to_string(),
                    odoo_name: Some(remote.name.clone()),
                    customer_name: partner.name.clone(),
                    customer_email: email,
                    customer_phone: partner.phone.clone(),
                    total_amount,
                    status: ORDER_STATUS_CONFIRMED.to_string(),
                    notes: remote.note.clone(),
                    synced_at,
                    idempotency_key: remote.client_order_ref.clone(),
                },
                lines,
            )
            .await
    }
}

fn price_order(request: &CreateOrderRequest) -> Result<PricedOrder> {
    let lines: Option<Vec<NewOrderLine>> = request.items.iter().map(entity_mapper::map_order_item).collect();

    match (lines, request.total_amount()) {
        (Some(lines), Some(total)) => Ok(PricedOrder { lines, total }),
        _ => {
            let mut errors = ValidationErrors::new();
            errors.add("items", ValidationError::new("total_too_large"));
            Err(errors.into())
        }
    }
}

fn sale_order_values(request: &CreateOrderRequest, partner_id: i64, key: Option<&str>) -> Value {
    let order_lines: Vec<Value> = request.items.iter().map(entity_mapper::order_line_command).collect();

    let mut values = Map::new();
    values.insert("partner_id".to_string(), json!(partner_id));
    values.insert("order_line".to_string(), Value::Array(order_lines));
    values.insert("origin".to_string(), json!(ORDER_ORIGIN));
    if let Some(notes) = &request.notes {
        values.insert("note".to_string(), json!(notes));
    }
    if let Some(key) = key {
        values.insert("client_order_ref".to_string(), json!(key));
    }
    Value::Object(values)
}

fn submission_for(order: &Order) -> Result<OrderSubmission> {
    let odoo_order_id = order
        .remote_order_id()
        .ok_or_else(|| StoreError::Corrupt(format!("order {} has no Odoo id", order.id)))?;

    Ok(OrderSubmission {
        order_uuid: order.id,
        odoo_order_id,
    })
}
