//! Invoice model for invoicing-service.

use crate::models::LineItemInput;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Invoice status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceStatus {
    Draft,
    Sent,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Draft => "draft",
            InvoiceStatus::Sent => "sent",
            InvoiceStatus::Paid => "paid",
            InvoiceStatus::Overdue => "overdue",
        }
    }

    pub fn from_string(s: &str) -> Self {
        match s {
            "sent" => InvoiceStatus::Sent,
            "paid" => InvoiceStatus::Paid,
            "overdue" => InvoiceStatus::Overdue,
            _ => InvoiceStatus::Draft,
        }
    }

    /// Only drafts can be sent.
    pub fn can_send(&self) -> bool {
        matches!(self, InvoiceStatus::Draft)
    }

    /// Payment can be recorded against sent or overdue invoices.
    pub fn can_mark_paid(&self) -> bool {
        matches!(self, InvoiceStatus::Sent | InvoiceStatus::Overdue)
    }

    /// Header fields and line items freeze once an invoice is paid.
    pub fn can_update(&self) -> bool {
        !matches!(self, InvoiceStatus::Paid)
    }

    /// Effective status for display: a sent invoice past its due date reads
    /// as overdue without mutating the stored row.
    pub fn effective(stored: &str, due_date: Option<NaiveDate>, today: NaiveDate) -> Self {
        let status = Self::from_string(stored);
        if status == InvoiceStatus::Sent {
            if let Some(due) = due_date {
                if due < today {
                    return InvoiceStatus::Overdue;
                }
            }
        }
        status
    }
}

/// Invoice document. Monetary aggregates are integer minor units (cents).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Invoice {
    pub invoice_id: Uuid,
    pub org_id: Uuid,
    pub invoice_number: String,
    pub status: String,
    pub contact_id: Uuid,
    pub subtotal: i64,
    pub tax_total: i64,
    pub total: i64,
    pub currency: String,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub owner_id: Uuid,
    pub sent_utc: Option<DateTime<Utc>>,
    pub paid_utc: Option<DateTime<Utc>>,
    pub created_utc: DateTime<Utc>,
    pub updated_utc: DateTime<Utc>,
}

/// Filter parameters for listing invoices.
#[derive(Debug, Clone, Default)]
pub struct ListInvoicesFilter {
    pub status: Option<InvoiceStatus>,
    pub contact_id: Option<Uuid>,
    pub page_size: i32,
    pub page_token: Option<Uuid>,
}

/// Input for creating an invoice.
#[derive(Debug, Clone)]
pub struct CreateInvoice {
    pub org_id: Uuid,
    pub owner_id: Uuid,
    pub contact_id: Uuid,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub line_items: Vec<LineItemInput>,
}

/// Input for updating an invoice (any status before paid).
///
/// `line_items: Some(_)` replaces the full line-item set and recomputes
/// all stored totals from scratch.
#[derive(Debug, Clone, Default)]
pub struct UpdateInvoice {
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub line_items: Option<Vec<LineItemInput>>,
}

/// Payment details recorded when an invoice is marked paid.
#[derive(Debug, Clone)]
pub struct PaymentData {
    pub amount: Option<i64>,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

/// Batch operation applied over a set of invoice ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BulkAction {
    Send,
    MarkPaid,
    Delete,
}

impl BulkAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            BulkAction::Send => "send",
            BulkAction::MarkPaid => "mark_paid",
            BulkAction::Delete => "delete",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            InvoiceStatus::Draft,
            InvoiceStatus::Sent,
            InvoiceStatus::Paid,
            InvoiceStatus::Overdue,
        ] {
            assert_eq!(InvoiceStatus::from_string(status.as_str()), status);
        }
        assert_eq!(InvoiceStatus::from_string("garbage"), InvoiceStatus::Draft);
    }

    #[test]
    fn only_drafts_can_be_sent() {
        assert!(InvoiceStatus::Draft.can_send());
        assert!(!InvoiceStatus::Sent.can_send());
        assert!(!InvoiceStatus::Paid.can_send());
        assert!(!InvoiceStatus::Overdue.can_send());
    }

    #[test]
    fn payment_requires_sent_or_overdue() {
        assert!(!InvoiceStatus::Draft.can_mark_paid());
        assert!(InvoiceStatus::Sent.can_mark_paid());
        assert!(InvoiceStatus::Overdue.can_mark_paid());
        assert!(!InvoiceStatus::Paid.can_mark_paid());
    }

    #[test]
    fn paid_invoices_are_frozen() {
        assert!(InvoiceStatus::Draft.can_update());
        assert!(InvoiceStatus::Sent.can_update());
        assert!(InvoiceStatus::Overdue.can_update());
        assert!(!InvoiceStatus::Paid.can_update());
    }

    #[test]
    fn sent_invoice_past_due_reads_as_overdue() {
        let today = NaiveDate::from_ymd_opt(2026, 3, 15).unwrap();
        let past = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        let future = NaiveDate::from_ymd_opt(2026, 4, 1).unwrap();

        assert_eq!(
            InvoiceStatus::effective("sent", Some(past), today),
            InvoiceStatus::Overdue
        );
        assert_eq!(
            InvoiceStatus::effective("sent", Some(future), today),
            InvoiceStatus::Sent
        );
        assert_eq!(
            InvoiceStatus::effective("sent", None, today),
            InvoiceStatus::Sent
        );
        // Draft and paid are never promoted to overdue.
        assert_eq!(
            InvoiceStatus::effective("draft", Some(past), today),
            InvoiceStatus::Draft
        );
        assert_eq!(
            InvoiceStatus::effective("paid", Some(past), today),
            InvoiceStatus::Paid
        );
    }
}
