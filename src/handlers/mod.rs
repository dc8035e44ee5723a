pub mod catalog;
pub mod health;
pub mod orders;
pub mod sync;
