pub mod cron_auth;
pub mod error_handling;
pub mod request_id;

pub use cron_auth::*;
pub use error_handling::*;
pub use request_id::*;
