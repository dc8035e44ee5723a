pub mod database;

use std::env;
use anyhow::Result;
use chrono::Duration;

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub ssl_mode: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            url: env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            host: env::var("DATABASE_HOST").unwrap_or_else(|_| "localhost".to_string()),
            port: env::var("DATABASE_PORT")
                .unwrap_or_else(|_| "5432".to_string())
                .parse()?,
            username: env::var("DATABASE_USER").unwrap_or_else(|_| "postgres".to_string()),
            password: env::var("DATABASE_PASSWORD").unwrap_or_default(),
            database: env::var("DATABASE_NAME").unwrap_or_else(|_| "giofarma_catalog".to_string()),
            ssl_mode: env::var("DATABASE_SSL_MODE").unwrap_or_else(|_| "prefer".to_string()),
            max_connections: env::var("DATABASE_MAX_CONNECTIONS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        })
    }

    /// `DATABASE_URL` wins over the individual settings.
    pub fn connection_string(&self) -> String {
        if let Some(url) = &self.url {
            return url.clone();
        }
        format!(
            "postgres://{}:{}@{}:{}/{}?sslmode={}",
            self.username, self.password, self.host, self.port, self.database, self.ssl_mode
        )
    }
}

/// Connection settings for the Odoo instance.
///
/// Values are not checked here: a missing setting only surfaces as a
/// configuration error on the first remote call, so the storefront can keep
/// serving the local catalog while the ERP side is misconfigured.
#[derive(Debug, Clone, Default)]
pub struct OdooConfig {
    pub url: String,
    pub database: String,
    pub username: String,
    pub api_key: String,
    pub timeout_secs: u64,
}

impl OdooConfig {
    pub fn from_env() -> Self {
        Self {
            url: env::var("ODOO_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or_default(),
            database: env::var("ODOO_DB").unwrap_or_default(),
            username: env::var("ODOO_USERNAME").unwrap_or_default(),
            api_key: env::var("ODOO_API_KEY").unwrap_or_default(),
            timeout_secs: env::var("ODOO_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(60),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// Products fetched per `search_read` page.
    pub page_size: i64,
    /// Watermark used when no run has ever succeeded.
    pub lookback: Duration,
    /// Subtracted from the last success time to widen the incremental window.
    pub watermark_margin: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            page_size: 100,
            lookback: Duration::minutes(30),
            watermark_margin: Duration::zero(),
        }
    }
}

impl SyncSettings {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            page_size: env::var("SYNC_PAGE_SIZE")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|&v: &i64| v > 0)
                .unwrap_or(defaults.page_size),
            lookback: env::var("SYNC_LOOKBACK_MINUTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::minutes)
                .unwrap_or(defaults.lookback),
            watermark_margin: env::var("SYNC_WATERMARK_MARGIN_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::seconds)
                .unwrap_or(defaults.watermark_margin),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub odoo: OdooConfig,
    pub sync: SyncSettings,
    pub cron_secret: Option<String>,
    pub server_host: String,
    pub server_port: u16,
    pub cors_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let cors_origins = env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3000".to_string())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        Ok(Self {
            database: DatabaseConfig::from_env()?,
            odoo: OdooConfig::from_env(),
            sync: SyncSettings::from_env(),
            cron_secret: env::var("CRON_SECRET").ok().filter(|s| !s.is_empty()),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            cors_origins,
        })
    }

    pub fn server_address(&self) -> String {
        format!("{}:{}", self.server_host, self.server_port)
    }
}
