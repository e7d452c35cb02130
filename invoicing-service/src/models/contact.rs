//! Contact lookup model. Contacts are owned by the CRM; the invoice engine
//! reads them to validate the billed party and hydrate responses.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Contact {
    pub contact_id: Uuid,
    pub org_id: Uuid,
    pub name: String,
    pub email: Option<String>,
    pub created_utc: DateTime<Utc>,
}
