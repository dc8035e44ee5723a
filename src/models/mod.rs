pub mod catalog;
pub mod odoo;
pub mod order;
pub mod sync_log;
