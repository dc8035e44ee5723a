// Odoo remote-procedure client
// Authenticates once per process and invokes model methods through execute_kw.
// The wire protocol sits behind `RpcTransport`; `JsonRpcTransport` speaks
// Odoo's /jsonrpc endpoint.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::config::OdooConfig;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("remote fault {code}: {message}")]
    Fault { code: i64, message: String },

    #[error("malformed response: {0}")]
    Decode(String),
}

#[derive(Error, Debug)]
pub enum OdooError {
    #[error("Invalid Odoo configuration: {0}")]
    ConfigError(String),

    #[error("Odoo authentication failed: {0}")]
    AuthError(String),

    #[error("Odoo call {model}.{method} failed: {source}")]
    Invocation {
        model: String,
        method: String,
        #[source]
        source: TransportError,
    },

    #[error("Unexpected result from {model}.{method}: {detail}")]
    UnexpectedResponse {
        model: String,
        method: String,
        detail: String,
    },
}

pub type Result<T> = std::result::Result<T, OdooError>;

// ============================================================================
// Transport
// ============================================================================

/// One request/response exchange with an Odoo service (`common`, `object`).
#[async_trait]
pub trait RpcTransport: Send + Sync {
    async fn call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> std::result::Result<Value, TransportError>;
}

#[derive(Debug, Deserialize)]
struct JsonRpcFault {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<JsonRpcFaultData>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcFaultData {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<JsonRpcFault>,
}

pub struct JsonRpcTransport {
    endpoint: String,
    http_client: Client,
    next_id: AtomicU64,
}

impl JsonRpcTransport {
    pub fn new(base_url: &str, timeout: Duration) -> std::result::Result<Self, TransportError> {
        let http_client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            endpoint: format!("{}/jsonrpc", base_url.trim_end_matches('/')),
            http_client,
            next_id: AtomicU64::new(1),
        })
    }
}

#[async_trait]
impl RpcTransport for JsonRpcTransport {
    async fn call(
        &self,
        service: &str,
        method: &str,
        args: Vec<Value>,
    ) -> std::result::Result<Value, TransportError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let payload = json!({
            "jsonrpc": "2.0",
            "method": "call",
            "params": {
                "service": service,
                "method": method,
                "args": args,
            },
            "id": id,
        });

        let response = self
            .http_client
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status));
        }

        let body: JsonRpcResponse = response
            .json()
            .await
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        if let Some(fault) = body.error {
            let message = fault
                .data
                .and_then(|d| d.message)
                .unwrap_or(fault.message);
            return Err(TransportError::Fault { code: fault.code, message });
        }

        Ok(body.result.unwrap_or(Value::Null))
    }
}

// ============================================================================
// Session + Client
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSession {
    pub uid: i64,
}

/// Odoo client shared by the catalog sync and the order bridge.
///
/// The session is established lazily on the first call and cached for the
/// lifetime of the client. Two concurrent first calls may both authenticate;
/// either uid is valid, whichever is written last is kept.
pub struct OdooClient {
    config: OdooConfig,
    transport: Arc<dyn RpcTransport>,
    session: RwLock<Option<RemoteSession>>,
}

impl OdooClient {
    pub fn new(config: OdooConfig, transport: Arc<dyn RpcTransport>) -> Self {
        Self {
            config,
            transport,
            session: RwLock::new(None),
        }
    }

    /// Client over the JSON-RPC endpoint at `config.url`.
    pub fn from_config(config: OdooConfig) -> std::result::Result<Self, TransportError> {
        let transport = JsonRpcTransport::new(
            &config.url,
            Duration::from_secs(config.timeout_secs.max(1)),
        )?;
        Ok(Self::new(config, Arc::new(transport)))
    }

    pub fn base_url(&self) -> &str {
        &self.config.url
    }

    fn validate_config(&self) -> Result<()> {
        let required = [
            ("ODOO_URL", &self.config.url),
            ("ODOO_DB", &self.config.database),
            ("ODOO_USERNAME", &self.config.username),
            ("ODOO_API_KEY", &self.config.api_key),
        ];
        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(name, _)| *name)
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(OdooError::ConfigError(format!("missing {}", missing.join(", "))))
        }
    }

    fn cached_session(&self) -> Option<RemoteSession> {
        match self.session.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn store_session(&self, session: RemoteSession) {
        match self.session.write() {
            Ok(mut guard) => *guard = Some(session),
            Err(poisoned) => *poisoned.into_inner() = Some(session),
        }
    }

    /// Return the cached session, authenticating first if there is none.
    pub async fn connect(&self) -> Result<RemoteSession> {
        if let Some(session) = self.cached_session() {
            return Ok(session);
        }

        self.validate_config()?;

        let result = self
            .transport
            .call(
                "common",
                "authenticate",
                vec![
                    json!(self.config.database),
                    json!(self.config.username),
                    json!(self.config.api_key),
                    json!({}),
                ],
            )
            .await
            .map_err(|e| OdooError::AuthError(e.to_string()))?;

        // Odoo answers `false` for rejected credentials.
        let uid = result
            .as_i64()
            .filter(|&uid| uid > 0)
            .ok_or_else(|| OdooError::AuthError("credentials rejected".to_string()))?;

        tracing::info!("Authenticated against Odoo database {} as uid {}", self.config.database, uid);

        let session = RemoteSession { uid };
        self.store_session(session.clone());
        Ok(session)
    }

    /// `execute_kw(model, method, args, kwargs)` under the cached session.
    /// Failures are returned as-is; retrying is up to the caller.
    pub async fn invoke(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<Value> {
        let session = self.connect().await?;

        tracing::debug!("Odoo call {}.{}", model, method);

        self.transport
            .call(
                "object",
                "execute_kw",
                vec![
                    json!(self.config.database),
                    json!(session.uid),
                    json!(self.config.api_key),
                    json!(model),
                    json!(method),
                    Value::Array(args),
                    Value::Object(kwargs),
                ],
            )
            .await
            .map_err(|source| OdooError::Invocation {
                model: model.to_string(),
                method: method.to_string(),
                source,
            })
    }

    async fn invoke_as<T: DeserializeOwned>(
        &self,
        model: &str,
        method: &str,
        args: Vec<Value>,
        kwargs: Map<String, Value>,
    ) -> Result<T> {
        let value = self.invoke(model, method, args, kwargs).await?;
        serde_json::from_value(value).map_err(|e| OdooError::UnexpectedResponse {
            model: model.to_string(),
            method: method.to_string(),
            detail: e.to_string(),
        })
    }

    pub async fn search(&self, model: &str, domain: Value, kwargs: Map<String, Value>) -> Result<Vec<i64>> {
        self.invoke_as(model, "search", vec![domain], kwargs).await
    }

    pub async fn search_read<T: DeserializeOwned>(
        &self,
        model: &str,
        domain: Value,
        kwargs: Map<String, Value>,
    ) -> Result<Vec<T>> {
        self.invoke_as(model, "search_read", vec![domain], kwargs).await
    }

    pub async fn read<T: DeserializeOwned>(&self, model: &str, ids: &[i64], fields: &[&str]) -> Result<Vec<T>> {
        let mut kwargs = Map::new();
        kwargs.insert("fields".to_string(), json!(fields));
        self.invoke_as(model, "read", vec![json!(ids)], kwargs).await
    }

    /// Create one record and return its id.
    pub async fn create(&self, model: &str, values: Value) -> Result<i64> {
        let value = self.invoke(model, "create", vec![values], Map::new()).await?;

        // Newer servers answer a list of ids even for a single record.
        value
            .as_i64()
            .or_else(|| value.as_array().and_then(|ids| ids.first()).and_then(Value::as_i64))
            .ok_or_else(|| OdooError::UnexpectedResponse {
                model: model.to_string(),
                method: "create".to_string(),
                detail: format!("expected a record id, got {}", value),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::erp::fake_odoo::FakeOdoo;

    #[tokio::test]
    async fn test_connect_authenticates_once() {
        let fake = FakeOdoo::new();
        let client = fake.client();

        let first = client.connect().await.unwrap();
        let second = client.connect().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(fake.call_count("common", "authenticate"), 1);
    }

    #[tokio::test]
    async fn test_missing_settings_are_a_config_error() {
        let fake = FakeOdoo::new();
        let mut config = FakeOdoo::config();
        config.api_key = String::new();
        config.database = "  ".to_string();
        let client = OdooClient::new(config, Arc::new(fake.clone()));

        match client.connect().await {
            Err(OdooError::ConfigError(msg)) => {
                assert!(msg.contains("ODOO_API_KEY"));
                assert!(msg.contains("ODOO_DB"));
            }
            other => panic!("expected config error, got {:?}", other),
        }
        assert_eq!(fake.call_count("common", "authenticate"), 0);
    }

    #[tokio::test]
    async fn test_rejected_credentials_are_an_auth_error() {
        let fake = FakeOdoo::new();
        let mut config = FakeOdoo::config();
        config.api_key = "wrong".to_string();
        let client = OdooClient::new(config, Arc::new(fake.clone()));

        assert!(matches!(client.connect().await, Err(OdooError::AuthError(_))));
        // nothing cached, the next call tries again
        assert!(client.connect().await.is_err());
        assert_eq!(fake.call_count("common", "authenticate"), 2);
    }

    #[tokio::test]
    async fn test_invoke_error_names_model_and_method() {
        let fake = FakeOdoo::new();
        fake.fail_method("sale.order", "create");
        let client = fake.client();

        let err = client.create("sale.order", json!({})).await.unwrap_err();
        match err {
            OdooError::Invocation { model, method, .. } => {
                assert_eq!(model, "sale.order");
                assert_eq!(method, "create");
            }
            other => panic!("expected invocation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_read_decodes_records() {
        let fake = FakeOdoo::new();
        fake.add_category(1, "Salud", None);
        fake.add_category(2, "Analgesicos", Some((1, "Salud")));
        let client = fake.client();

        let categories: Vec<crate::models::odoo::OdooCategory> = client
            .search_read("product.category", json!([]), Map::new())
            .await
            .unwrap();

        assert_eq!(categories.len(), 2);
        assert_eq!(categories[1].parent_id.as_ref().map(|p| p.id), Some(1));
    }
}
