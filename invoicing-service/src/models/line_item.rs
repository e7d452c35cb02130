//! Line item model for invoicing-service.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Line item on an invoice. `unit_price` and `line_total` are integer minor
/// units (cents); `quantity` and `tax_rate` are exact decimals.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LineItem {
    pub line_item_id: Uuid,
    pub invoice_id: Uuid,
    pub org_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: i64,
    pub tax_rate: Decimal,
    pub line_total: i64,
    pub sort_order: i32,
    pub created_utc: DateTime<Utc>,
}

/// Input for creating or replacing a line item. `tax_rate` is a percentage
/// (0-100); `product_id` is absent for ad-hoc items.
#[derive(Debug, Clone)]
pub struct LineItemInput {
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: i64,
    pub tax_rate: Decimal,
}
