use crate::dtos::{
    ActivityResponse, BulkActionRequest, BulkActionResponse, CreateInvoiceRequest,
    InvoiceListParams, InvoiceListResponse, InvoiceResponse, MarkPaidRequest, SendInvoiceRequest,
    UpdateInvoiceRequest,
};
use crate::middleware::TenantContext;
use crate::models::{Invoice, InvoiceStatus, ListInvoicesFilter};
use crate::services::metrics::{
    ERRORS_TOTAL, HTTP_REQUESTS_TOTAL, HTTP_REQUEST_DURATION, INVOICES_TOTAL, INVOICE_AMOUNT_TOTAL,
};
use crate::startup::AppState;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use crm_core::error::AppError;
use tracing::{info, instrument, warn, Span};
use uuid::Uuid;
use validator::Validate;

/// Fetch the contact and line items that complete an invoice payload.
async fn hydrate(
    state: &AppState,
    ctx: TenantContext,
    invoice: Invoice,
) -> Result<InvoiceResponse, AppError> {
    let line_items = state.db.get_line_items(ctx.org_id, invoice.invoice_id).await?;
    let contact = state.db.get_contact(ctx.org_id, invoice.contact_id).await?;
    Ok(InvoiceResponse::from_parts(invoice, contact, line_items))
}

fn parse_status_filter(status: Option<&str>) -> Result<Option<InvoiceStatus>, AppError> {
    match status {
        None => Ok(None),
        Some(s) => match s {
            "draft" => Ok(Some(InvoiceStatus::Draft)),
            "sent" => Ok(Some(InvoiceStatus::Sent)),
            "paid" => Ok(Some(InvoiceStatus::Paid)),
            "overdue" => Ok(Some(InvoiceStatus::Overdue)),
            _ => Err(AppError::BadRequest(anyhow::anyhow!(
                "Invalid status filter: {}",
                s
            ))),
        },
    }
}

#[instrument(
    skip(state, payload),
    fields(
        service = "invoicing-service",
        method = "CreateInvoice",
        org_id,
        user_id,
        invoice_id
    )
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["CreateInvoice"])
        .start_timer();

    payload.validate().map_err(|e| {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["CreateInvoice", "invalid_argument"])
            .inc();
        ERRORS_TOTAL.with_label_values(&["validation_error"]).inc();
        AppError::ValidationError(e)
    })?;

    let input = payload.into_input(ctx.org_id, ctx.user_id);
    let invoice = state.db.create_invoice(&input).await.map_err(|e| {
        warn!(org_id = %ctx.org_id, error = %e, "Failed to create invoice");
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["CreateInvoice", "error"])
            .inc();
        ERRORS_TOTAL.with_label_values(&["db_error"]).inc();
        e
    })?;

    Span::current().record("invoice_id", invoice.invoice_id.to_string());
    HTTP_REQUESTS_TOTAL
        .with_label_values(&["CreateInvoice", "ok"])
        .inc();
    INVOICES_TOTAL.with_label_values(&["draft"]).inc();
    timer.observe_duration();

    info!(
        org_id = %ctx.org_id,
        invoice_id = %invoice.invoice_id,
        invoice_number = %invoice.invoice_number,
        "Draft invoice created"
    );

    let response = hydrate(&state, ctx, invoice).await?;
    Ok((StatusCode::CREATED, Json(response)))
}

#[instrument(
    skip(state, params),
    fields(service = "invoicing-service", method = "ListInvoices", org_id, user_id)
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<InvoiceListParams>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["ListInvoices"])
        .start_timer();

    let status = parse_status_filter(params.status.as_deref()).map_err(|e| {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["ListInvoices", "invalid_argument"])
            .inc();
        e
    })?;

    let page_size = match params.page_size {
        Some(size) if size > 0 => size,
        _ => 20,
    };

    let filter = ListInvoicesFilter {
        status,
        contact_id: params.contact_id,
        page_size,
        page_token: params.page_token,
    };

    let invoices = state.db.list_invoices(ctx.org_id, &filter).await.map_err(|e| {
        warn!(org_id = %ctx.org_id, error = %e, "Failed to list invoices");
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["ListInvoices", "error"])
            .inc();
        ERRORS_TOTAL.with_label_values(&["db_error"]).inc();
        e
    })?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["ListInvoices", "ok"])
        .inc();
    timer.observe_duration();

    let next_page_token = if invoices.len() == filter.page_size as usize {
        invoices.last().map(|i| i.invoice_id.to_string())
    } else {
        None
    };

    Ok(Json(InvoiceListResponse {
        invoices: invoices
            .into_iter()
            .map(|i| InvoiceResponse::from_parts(i, None, Vec::new()))
            .collect(),
        next_page_token,
    }))
}

#[instrument(
    skip(state),
    fields(service = "invoicing-service", method = "GetInvoice", org_id, user_id)
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["GetInvoice"])
        .start_timer();

    let invoice = state
        .db
        .get_invoice(ctx.org_id, invoice_id)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to get invoice");
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["GetInvoice", "error"])
                .inc();
            e
        })?;

    timer.observe_duration();

    match invoice {
        Some(invoice) => {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["GetInvoice", "ok"])
                .inc();
            let response = hydrate(&state, ctx, invoice).await?;
            Ok(Json(response))
        }
        None => {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["GetInvoice", "not_found"])
                .inc();
            Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
        }
    }
}

#[instrument(
    skip(state, payload),
    fields(service = "invoicing-service", method = "UpdateInvoice", org_id, user_id)
)]
pub async fn update_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(invoice_id): Path<Uuid>,
    Json(payload): Json<UpdateInvoiceRequest>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["UpdateInvoice"])
        .start_timer();

    payload.validate().map_err(|e| {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["UpdateInvoice", "invalid_argument"])
            .inc();
        ERRORS_TOTAL.with_label_values(&["validation_error"]).inc();
        AppError::ValidationError(e)
    })?;

    let input = payload.into();
    let invoice = state
        .db
        .update_invoice(ctx.org_id, invoice_id, &input)
        .await
        .map_err(|e| {
            warn!(org_id = %ctx.org_id, invoice_id = %invoice_id, error = %e, "Failed to update invoice");
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["UpdateInvoice", "error"])
                .inc();
            e
        })?;

    timer.observe_duration();

    match invoice {
        Some(invoice) => {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["UpdateInvoice", "ok"])
                .inc();
            let response = hydrate(&state, ctx, invoice).await?;
            Ok(Json(response))
        }
        None => {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["UpdateInvoice", "not_found"])
                .inc();
            Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
        }
    }
}

#[instrument(
    skip(state),
    fields(service = "invoicing-service", method = "DeleteInvoice", org_id, user_id)
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["DeleteInvoice"])
        .start_timer();

    let deleted = state
        .db
        .delete_invoice(ctx.org_id, invoice_id)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to delete invoice");
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["DeleteInvoice", "error"])
                .inc();
            e
        })?;

    timer.observe_duration();

    if !deleted {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["DeleteInvoice", "not_found"])
            .inc();
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["DeleteInvoice", "ok"])
        .inc();
    INVOICES_TOTAL.with_label_values(&["deleted"]).inc();

    Ok(StatusCode::NO_CONTENT)
}

#[instrument(
    skip(state, payload),
    fields(service = "invoicing-service", method = "SendInvoice", org_id, user_id)
)]
pub async fn send_invoice(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(invoice_id): Path<Uuid>,
    payload: Option<Json<SendInvoiceRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["SendInvoice"])
        .start_timer();

    let mut channels = payload.map(|Json(p)| p.channels).unwrap_or_default();
    if channels.is_empty() {
        channels.push("email".to_string());
    }

    let invoice = state
        .db
        .send_invoice(ctx.org_id, invoice_id, ctx.user_id, &channels)
        .await
        .map_err(|e| {
            warn!(org_id = %ctx.org_id, invoice_id = %invoice_id, error = %e, "Failed to send invoice");
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["SendInvoice", "error"])
                .inc();
            ERRORS_TOTAL.with_label_values(&["db_error"]).inc();
            e
        })?;

    timer.observe_duration();

    match invoice {
        Some(invoice) => {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["SendInvoice", "ok"])
                .inc();
            INVOICES_TOTAL.with_label_values(&["sent"]).inc();
            INVOICE_AMOUNT_TOTAL
                .with_label_values(&[&invoice.currency])
                .inc_by(invoice.total as f64);
            info!(
                org_id = %ctx.org_id,
                invoice_id = %invoice.invoice_id,
                invoice_number = %invoice.invoice_number,
                total = invoice.total,
                currency = %invoice.currency,
                "Invoice sent"
            );
            let response = hydrate(&state, ctx, invoice).await?;
            Ok(Json(response))
        }
        None => {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["SendInvoice", "not_found"])
                .inc();
            Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
        }
    }
}

#[instrument(
    skip(state, payload),
    fields(service = "invoicing-service", method = "MarkPaid", org_id, user_id)
)]
pub async fn mark_paid(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(invoice_id): Path<Uuid>,
    payload: Option<Json<MarkPaidRequest>>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["MarkPaid"])
        .start_timer();

    let payment = payload.and_then(|Json(p)| p.into_payment_data());

    let invoice = state
        .db
        .mark_paid(ctx.org_id, invoice_id, ctx.user_id, payment.as_ref())
        .await
        .map_err(|e| {
            warn!(org_id = %ctx.org_id, invoice_id = %invoice_id, error = %e, "Failed to mark invoice paid");
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["MarkPaid", "error"])
                .inc();
            ERRORS_TOTAL.with_label_values(&["db_error"]).inc();
            e
        })?;

    timer.observe_duration();

    match invoice {
        Some(invoice) => {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["MarkPaid", "ok"])
                .inc();
            INVOICES_TOTAL.with_label_values(&["paid"]).inc();
            info!(
                org_id = %ctx.org_id,
                invoice_id = %invoice.invoice_id,
                invoice_number = %invoice.invoice_number,
                "Invoice marked paid"
            );
            let response = hydrate(&state, ctx, invoice).await?;
            Ok(Json(response))
        }
        None => {
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["MarkPaid", "not_found"])
                .inc();
            Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")))
        }
    }
}

#[instrument(
    skip(state, payload),
    fields(service = "invoicing-service", method = "BulkAction", org_id, user_id)
)]
pub async fn bulk_action(
    State(state): State<AppState>,
    ctx: TenantContext,
    Json(payload): Json<BulkActionRequest>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["BulkAction"])
        .start_timer();

    payload.validate().map_err(|e| {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["BulkAction", "invalid_argument"])
            .inc();
        ERRORS_TOTAL.with_label_values(&["validation_error"]).inc();
        AppError::ValidationError(e)
    })?;

    let affected_ids = state
        .db
        .bulk_action(ctx.org_id, ctx.user_id, payload.action, &payload.invoice_ids)
        .await
        .map_err(|e| {
            warn!(org_id = %ctx.org_id, action = %payload.action.as_str(), error = %e, "Bulk action failed");
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["BulkAction", "error"])
                .inc();
            ERRORS_TOTAL.with_label_values(&["db_error"]).inc();
            e
        })?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["BulkAction", "ok"])
        .inc();
    timer.observe_duration();

    info!(
        org_id = %ctx.org_id,
        action = %payload.action.as_str(),
        affected = affected_ids.len(),
        "Bulk action applied"
    );

    Ok(Json(BulkActionResponse {
        action: payload.action,
        affected_count: affected_ids.len(),
        affected_ids,
    }))
}

#[instrument(
    skip(state),
    fields(service = "invoicing-service", method = "ListActivities", org_id, user_id)
)]
pub async fn list_activities(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(invoice_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let timer = HTTP_REQUEST_DURATION
        .with_label_values(&["ListActivities"])
        .start_timer();

    let invoice = state.db.get_invoice(ctx.org_id, invoice_id).await?;
    if invoice.is_none() {
        HTTP_REQUESTS_TOTAL
            .with_label_values(&["ListActivities", "not_found"])
            .inc();
        return Err(AppError::NotFound(anyhow::anyhow!("Invoice not found")));
    }

    let activities = state
        .db
        .list_activities(ctx.org_id, invoice_id)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to list activities");
            HTTP_REQUESTS_TOTAL
                .with_label_values(&["ListActivities", "error"])
                .inc();
            e
        })?;

    HTTP_REQUESTS_TOTAL
        .with_label_values(&["ListActivities", "ok"])
        .inc();
    timer.observe_duration();

    Ok(Json(
        activities
            .into_iter()
            .map(ActivityResponse::from)
            .collect::<Vec<_>>(),
    ))
}
