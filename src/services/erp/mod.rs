// Odoo integration
// Remote-procedure client and the pure record mappers built on top of it.

pub mod entity_mapper;
pub mod odoo_client;

#[cfg(test)]
pub(crate) mod fake_odoo;

pub use entity_mapper::{ImageMode, PRODUCT_MODEL};
pub use odoo_client::{JsonRpcTransport, OdooClient, OdooError, RemoteSession, RpcTransport, TransportError};
