use crate::models::{
    BulkAction, Contact, CreateInvoice, Invoice, InvoiceActivity, InvoiceStatus, LineItem,
    LineItemInput, PaymentData, UpdateInvoice,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

fn validate_quantity(quantity: &Decimal) -> Result<(), ValidationError> {
    if *quantity <= Decimal::ZERO {
        return Err(ValidationError::new("quantity_not_positive"));
    }
    Ok(())
}

fn validate_tax_rate(tax_rate: &Decimal) -> Result<(), ValidationError> {
    if *tax_rate < Decimal::ZERO || *tax_rate > Decimal::ONE_HUNDRED {
        return Err(ValidationError::new("tax_rate_out_of_range"));
    }
    Ok(())
}

/// One billable row. `unit_price` is integer minor units (cents);
/// `tax_rate` is a percentage.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LineItemRequest {
    pub product_id: Option<Uuid>,
    #[validate(length(min = 1, max = 200))]
    pub product_name: String,
    pub description: Option<String>,
    #[validate(custom(function = validate_quantity))]
    pub quantity: Decimal,
    #[validate(range(min = 0))]
    pub unit_price: i64,
    #[serde(default)]
    #[validate(custom(function = validate_tax_rate))]
    pub tax_rate: Decimal,
}

impl From<LineItemRequest> for LineItemInput {
    fn from(req: LineItemRequest) -> Self {
        LineItemInput {
            product_id: req.product_id,
            product_name: req.product_name,
            description: req.description,
            quantity: req.quantity,
            unit_price: req.unit_price,
            tax_rate: req.tax_rate,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateInvoiceRequest {
    pub contact_id: Uuid,
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    #[serde(default)]
    #[validate(nested)]
    pub line_items: Vec<LineItemRequest>,
}

impl CreateInvoiceRequest {
    pub fn into_input(self, org_id: Uuid, owner_id: Uuid) -> CreateInvoice {
        CreateInvoice {
            org_id,
            owner_id,
            contact_id: self.contact_id,
            notes: self.notes,
            terms: self.terms,
            due_date: self.due_date,
            payment_terms: self.payment_terms,
            line_items: self.line_items.into_iter().map(Into::into).collect(),
        }
    }
}

/// Update payload. `line_items: Some(_)` replaces the full set and triggers
/// a totals recompute; `None` leaves items untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateInvoiceRequest {
    pub notes: Option<String>,
    pub terms: Option<String>,
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    #[validate(nested)]
    pub line_items: Option<Vec<LineItemRequest>>,
}

impl From<UpdateInvoiceRequest> for UpdateInvoice {
    fn from(req: UpdateInvoiceRequest) -> Self {
        UpdateInvoice {
            notes: req.notes,
            terms: req.terms,
            due_date: req.due_date,
            payment_terms: req.payment_terms,
            line_items: req
                .line_items
                .map(|items| items.into_iter().map(Into::into).collect()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendInvoiceRequest {
    #[serde(default)]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarkPaidRequest {
    pub amount: Option<i64>,
    pub method: Option<String>,
    pub reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
}

impl MarkPaidRequest {
    /// Payment metadata is only recorded when the caller supplied any of it.
    pub fn into_payment_data(self) -> Option<PaymentData> {
        if self.amount.is_none()
            && self.method.is_none()
            && self.reference.is_none()
            && self.payment_date.is_none()
        {
            return None;
        }
        Some(PaymentData {
            amount: self.amount,
            method: self.method,
            reference: self.reference,
            payment_date: self.payment_date,
        })
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BulkActionRequest {
    pub action: BulkAction,
    #[validate(length(min = 1))]
    pub invoice_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceListParams {
    pub status: Option<String>,
    pub contact_id: Option<Uuid>,
    pub page_size: Option<i32>,
    pub page_token: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItemResponse {
    pub line_item_id: Uuid,
    pub product_id: Option<Uuid>,
    pub product_name: String,
    pub description: Option<String>,
    pub quantity: Decimal,
    pub unit_price: i64,
    pub tax_rate: Decimal,
    pub line_total: i64,
    pub sort_order: i32,
}

impl From<LineItem> for LineItemResponse {
    fn from(item: LineItem) -> Self {
        LineItemResponse {
            line_item_id: item.line_item_id,
            product_id: item.product_id,
            product_name: item.product_name,
            description: item.description,
            quantity: item.quantity,
            unit_price: item.unit_price,
            tax_rate: item.tax_rate,
            line_total: item.line_total,
            sort_order: item.sort_order,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceResponse {
    pub invoice_id: Uuid,
    pub org_id: Uuid,
    pub invoice_number: String,
    /// Effective status: a sent invoice past its due date reads as overdue.
    pub status: String,
    pub contact_id: Uuid,
    pub contact_name: Option<String>,
    pub contact_email: Option<String>,
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
    pub line_items: Vec<LineItemResponse>,
}

impl InvoiceResponse {
    pub fn from_parts(
        invoice: Invoice,
        contact: Option<Contact>,
        line_items: Vec<LineItem>,
    ) -> Self {
        let today = Utc::now().date_naive();
        let status = InvoiceStatus::effective(&invoice.status, invoice.due_date, today);

        InvoiceResponse {
            invoice_id: invoice.invoice_id,
            org_id: invoice.org_id,
            invoice_number: invoice.invoice_number,
            status: status.as_str().to_string(),
            contact_id: invoice.contact_id,
            contact_name: contact.as_ref().map(|c| c.name.clone()),
            contact_email: contact.and_then(|c| c.email),
            subtotal: invoice.subtotal,
            tax_total: invoice.tax_total,
            total: invoice.total,
            currency: invoice.currency,
            notes: invoice.notes,
            terms: invoice.terms,
            due_date: invoice.due_date,
            payment_terms: invoice.payment_terms,
            owner_id: invoice.owner_id,
            sent_utc: invoice.sent_utc,
            paid_utc: invoice.paid_utc,
            created_utc: invoice.created_utc,
            updated_utc: invoice.updated_utc,
            line_items: line_items.into_iter().map(Into::into).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvoiceListResponse {
    pub invoices: Vec<InvoiceResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ActivityResponse {
    pub activity_id: Uuid,
    pub invoice_id: Uuid,
    pub activity_type: String,
    pub title: String,
    pub description: Option<String>,
    pub channel: Option<String>,
    pub metadata: Option<serde_json::Value>,
    pub created_by: Uuid,
    pub created_utc: DateTime<Utc>,
}

impl From<InvoiceActivity> for ActivityResponse {
    fn from(activity: InvoiceActivity) -> Self {
        ActivityResponse {
            activity_id: activity.activity_id,
            invoice_id: activity.invoice_id,
            activity_type: activity.activity_type,
            title: activity.title,
            description: activity.description,
            channel: activity.channel,
            metadata: activity.metadata,
            created_by: activity.created_by,
            created_utc: activity.created_utc,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BulkActionResponse {
    pub action: BulkAction,
    pub affected_ids: Vec<Uuid>,
    pub affected_count: usize,
}
