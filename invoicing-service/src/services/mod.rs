//! Services module for invoicing-service.

pub mod database;
pub mod metrics;
pub mod numbering;
pub mod totals;

pub use database::Database;
pub use metrics::{get_metrics, init_metrics};
