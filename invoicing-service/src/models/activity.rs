//! Append-only invoice activity log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Activity type tag. Every state-changing operation appends exactly one
/// activity; header updates append none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityType {
    Created,
    Sent,
    Paid,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Created => "created",
            ActivityType::Sent => "sent",
            ActivityType::Paid => "paid",
        }
    }
}

/// Activity log entry. Never mutated or individually deleted; rows cascade
/// with their invoice.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InvoiceActivity {
    pub activity_id: Uuid,
    pub invoice_id: Uuid,
    pub org_id: Uuid,
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
    pub channel: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Uuid,
    pub created_utc: DateTime<Utc>,
}
