//! Database service for invoicing-service.
//!
//! Every query is scoped by `org_id`; multi-step flows (create, update,
//! send, mark-paid, bulk) run inside a single transaction so a failure
//! between steps never leaves an orphaned header or a half-replaced
//! line-item set.

use crate::models::{
    ActivityType, BulkAction, Contact, CreateInvoice, Invoice, InvoiceActivity, LineItem,
    LineItemInput, ListInvoicesFilter, PaymentData, UpdateInvoice,
};
use crate::services::metrics::DB_QUERY_DURATION;
use crate::services::numbering::{format_invoice_number, parse_invoice_number};
use crate::services::totals;
use chrono::Utc;
use crm_core::error::AppError;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::{info, instrument};
use uuid::Uuid;

const INVOICE_COLUMNS: &str = "invoice_id, org_id, invoice_number, status, contact_id, \
    subtotal, tax_total, total, currency, notes, terms, due_date, payment_terms, \
    owner_id, sent_utc, paid_utc, created_utc, updated_utc";

const LINE_ITEM_COLUMNS: &str = "line_item_id, invoice_id, org_id, product_id, product_name, \
    description, quantity, unit_price, tax_rate, line_total, sort_order, created_utc";

/// Database connection pool wrapper.
#[derive(Clone)]
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Create a new database connection pool.
    #[instrument(skip(database_url), fields(service = "invoicing-service"))]
    pub async fn new(
        database_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self, AppError> {
        info!(
            max_connections = max_connections,
            min_connections = min_connections,
            "Connecting to PostgreSQL"
        );

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .min_connections(min_connections)
            .acquire_timeout(Duration::from_secs(30))
            .idle_timeout(Duration::from_secs(600))
            .connect(database_url)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to connect: {}", e)))?;

        info!("PostgreSQL connection pool established");

        Ok(Self { pool })
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Check database health.
    #[instrument(skip(self))]
    pub async fn health_check(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Health check failed: {}", e)))?;
        Ok(())
    }

    /// Run database migrations.
    #[instrument(skip(self))]
    pub async fn run_migrations(&self) -> Result<(), AppError> {
        info!("Running database migrations");
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Migration failed: {}", e)))?;
        info!("Database migrations completed");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Contact Lookups (read-only; contacts are owned by the CRM)
    // -------------------------------------------------------------------------

    /// Get a contact by ID within the tenant.
    #[instrument(skip(self), fields(org_id = %org_id, contact_id = %contact_id))]
    pub async fn get_contact(
        &self,
        org_id: Uuid,
        contact_id: Uuid,
    ) -> Result<Option<Contact>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_contact"])
            .start_timer();

        let contact = sqlx::query_as::<_, Contact>(
            r#"
            SELECT contact_id, org_id, name, email, created_utc
            FROM contacts
            WHERE org_id = $1 AND contact_id = $2
            "#,
        )
        .bind(org_id)
        .bind(contact_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get contact: {}", e)))?;

        timer.observe_duration();

        Ok(contact)
    }

    // -------------------------------------------------------------------------
    // Invoice Operations
    // -------------------------------------------------------------------------

    /// Create an invoice with its line items and `created` activity in one
    /// transaction, assigning the next tenant-scoped invoice number.
    #[instrument(skip(self, input), fields(org_id = %input.org_id, contact_id = %input.contact_id))]
    pub async fn create_invoice(&self, input: &CreateInvoice) -> Result<Invoice, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["create_invoice"])
            .start_timer();

        let contact = self.get_contact(input.org_id, input.contact_id).await?;
        let Some(contact) = contact else {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Contact not found for this organization"
            )));
        };

        let invoice_totals = totals::compute_totals(&input.line_items);

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice_number = Self::next_invoice_number(&mut tx, input.org_id).await?;

        let invoice_id = Uuid::new_v4();
        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            INSERT INTO invoices (
                invoice_id, org_id, invoice_number, status, contact_id,
                subtotal, tax_total, total, currency, notes, terms, due_date,
                payment_terms, owner_id
            )
            VALUES ($1, $2, $3, 'draft', $4, $5, $6, $7, 'USD', $8, $9, $10, $11, $12)
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(invoice_id)
        .bind(input.org_id)
        .bind(&invoice_number)
        .bind(input.contact_id)
        .bind(invoice_totals.subtotal)
        .bind(invoice_totals.tax_total)
        .bind(invoice_totals.total)
        .bind(&input.notes)
        .bind(&input.terms)
        .bind(input.due_date)
        .bind(&input.payment_terms)
        .bind(input.owner_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to create invoice: {}", e)))?;

        Self::insert_line_items(&mut tx, input.org_id, invoice_id, &input.line_items).await?;

        Self::append_activity(
            &mut tx,
            input.org_id,
            invoice_id,
            ActivityType::Created,
            &format!("Invoice {} created for {}", invoice_number, contact.name),
            None,
            None,
            None,
            input.owner_id,
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Draft invoice created"
        );

        Ok(invoice)
    }

    /// Get an invoice by ID.
    #[instrument(skip(self), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn get_invoice(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_invoice"])
            .start_timer();

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            SELECT {INVOICE_COLUMNS}
            FROM invoices
            WHERE org_id = $1 AND invoice_id = $2
            "#,
        ))
        .bind(org_id)
        .bind(invoice_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get invoice: {}", e)))?;

        timer.observe_duration();

        Ok(invoice)
    }

    /// List invoices for a tenant.
    #[instrument(skip(self, filter), fields(org_id = %org_id))]
    pub async fn list_invoices(
        &self,
        org_id: Uuid,
        filter: &ListInvoicesFilter,
    ) -> Result<Vec<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_invoices"])
            .start_timer();

        let limit = filter.page_size.clamp(1, 100) as i64;
        let status_str = filter.status.map(|s| s.as_str().to_string());

        let invoices = if let Some(cursor) = filter.page_token {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {INVOICE_COLUMNS}
                FROM invoices
                WHERE org_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR contact_id = $3)
                  AND invoice_id > $4
                ORDER BY invoice_id
                LIMIT $5
                "#,
            ))
            .bind(org_id)
            .bind(&status_str)
            .bind(filter.contact_id)
            .bind(cursor)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        } else {
            sqlx::query_as::<_, Invoice>(&format!(
                r#"
                SELECT {INVOICE_COLUMNS}
                FROM invoices
                WHERE org_id = $1
                  AND ($2::varchar IS NULL OR status = $2)
                  AND ($3::uuid IS NULL OR contact_id = $3)
                ORDER BY invoice_id
                LIMIT $4
                "#,
            ))
            .bind(org_id)
            .bind(&status_str)
            .bind(filter.contact_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
        }
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to list invoices: {}", e)))?;

        timer.observe_duration();

        Ok(invoices)
    }

    /// Update an invoice's header fields and, when given, replace its full
    /// line-item set and recompute all stored totals.
    ///
    /// Rejected once the invoice is paid. Appends no activity.
    #[instrument(skip(self, input), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn update_invoice(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
        input: &UpdateInvoice,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["update_invoice"])
            .start_timer();

        let existing = self.get_invoice(org_id, invoice_id).await?;
        match existing {
            Some(inv) if crate::models::InvoiceStatus::from_string(&inv.status).can_update() => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Cannot update a paid invoice"
                )))
            }
            None => return Ok(None),
        };

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let mut invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET notes = COALESCE($3, notes),
                terms = COALESCE($4, terms),
                due_date = COALESCE($5, due_date),
                payment_terms = COALESCE($6, payment_terms),
                updated_utc = NOW()
            WHERE org_id = $1 AND invoice_id = $2 AND status <> 'paid'
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(org_id)
        .bind(invoice_id)
        .bind(&input.notes)
        .bind(&input.terms)
        .bind(input.due_date)
        .bind(&input.payment_terms)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to update invoice: {}", e)))?;

        if invoice.is_none() {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        }

        if let Some(items) = &input.line_items {
            sqlx::query("DELETE FROM invoice_line_items WHERE org_id = $1 AND invoice_id = $2")
                .bind(org_id)
                .bind(invoice_id)
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to clear line items: {}", e))
                })?;

            Self::insert_line_items(&mut tx, org_id, invoice_id, items).await?;

            let invoice_totals = totals::compute_totals(items);
            invoice = sqlx::query_as::<_, Invoice>(&format!(
                r#"
                UPDATE invoices
                SET subtotal = $3, tax_total = $4, total = $5, updated_utc = NOW()
                WHERE org_id = $1 AND invoice_id = $2
                RETURNING {INVOICE_COLUMNS}
                "#,
            ))
            .bind(org_id)
            .bind(invoice_id)
            .bind(invoice_totals.subtotal)
            .bind(invoice_totals.tax_total)
            .bind(invoice_totals.total)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to update totals: {}", e))
            })?;
        }

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        if let Some(ref inv) = invoice {
            info!(invoice_id = %inv.invoice_id, "Invoice updated");
        }

        Ok(invoice)
    }

    /// Hard-delete an invoice from any status. Line items and activities
    /// cascade with the row.
    #[instrument(skip(self), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn delete_invoice(&self, org_id: Uuid, invoice_id: Uuid) -> Result<bool, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["delete_invoice"])
            .start_timer();

        let result = sqlx::query(
            r#"
            DELETE FROM invoices
            WHERE org_id = $1 AND invoice_id = $2
            "#,
        )
        .bind(org_id)
        .bind(invoice_id)
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to delete invoice: {}", e)))?;

        timer.observe_duration();

        let deleted = result.rows_affected() > 0;
        if deleted {
            info!(invoice_id = %invoice_id, "Invoice deleted");
        }

        Ok(deleted)
    }

    /// Send a draft invoice: set `sent` status and timestamp, append the
    /// `sent` activity. Requires at least one line item.
    #[instrument(skip(self, channels), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn send_invoice(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
        actor: Uuid,
        channels: &[String],
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["send_invoice"])
            .start_timer();

        let existing = self.get_invoice(org_id, invoice_id).await?;
        match existing {
            Some(inv) if crate::models::InvoiceStatus::from_string(&inv.status).can_send() => {}
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only draft invoices can be sent"
                )))
            }
            None => return Ok(None),
        };

        let line_items = self.get_line_items(org_id, invoice_id).await?;
        if line_items.is_empty() {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Cannot send an invoice without line items"
            )));
        }

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'sent', sent_utc = NOW(), updated_utc = NOW()
            WHERE org_id = $1 AND invoice_id = $2 AND status = 'draft'
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(org_id)
        .bind(invoice_id)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to send invoice: {}", e)))?;

        let Some(invoice) = invoice else {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        };

        Self::append_activity(
            &mut tx,
            org_id,
            invoice_id,
            ActivityType::Sent,
            &format!("Invoice sent via {}", channels.join(", ")),
            None,
            channels.first().map(|s| s.as_str()),
            None,
            actor,
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Invoice sent"
        );

        Ok(Some(invoice))
    }

    /// Record payment against a sent or overdue invoice: set `paid` status
    /// and timestamp, append the `paid` activity with payment metadata.
    #[instrument(skip(self, payment), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn mark_paid(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
        actor: Uuid,
        payment: Option<&PaymentData>,
    ) -> Result<Option<Invoice>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["mark_paid"])
            .start_timer();

        let existing = self.get_invoice(org_id, invoice_id).await?;
        match existing {
            Some(inv) if crate::models::InvoiceStatus::from_string(&inv.status).can_mark_paid() => {
            }
            Some(_) => {
                return Err(AppError::BadRequest(anyhow::anyhow!(
                    "Only sent or overdue invoices can be marked paid"
                )))
            }
            None => return Ok(None),
        };

        let paid_utc = payment
            .and_then(|p| p.payment_date)
            .unwrap_or_else(Utc::now);

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let invoice = sqlx::query_as::<_, Invoice>(&format!(
            r#"
            UPDATE invoices
            SET status = 'paid', paid_utc = $3, updated_utc = NOW()
            WHERE org_id = $1 AND invoice_id = $2 AND status IN ('sent', 'overdue')
            RETURNING {INVOICE_COLUMNS}
            "#,
        ))
        .bind(org_id)
        .bind(invoice_id)
        .bind(paid_utc)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to mark invoice paid: {}", e))
        })?;

        let Some(invoice) = invoice else {
            tx.rollback().await.ok();
            timer.observe_duration();
            return Ok(None);
        };

        let metadata = payment.map(|p| {
            serde_json::json!({
                "amount": p.amount,
                "method": p.method,
                "reference": p.reference,
            })
        });

        Self::append_activity(
            &mut tx,
            org_id,
            invoice_id,
            ActivityType::Paid,
            &format!("Invoice {} marked paid", invoice.invoice_number),
            None,
            None,
            metadata,
            actor,
        )
        .await?;

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            invoice_id = %invoice.invoice_id,
            invoice_number = %invoice.invoice_number,
            "Invoice marked paid"
        );

        Ok(Some(invoice))
    }

    /// Apply a bulk transition to every id matching its precondition filter,
    /// in one transaction, appending one activity per affected invoice.
    /// Non-matching ids are skipped, not errors.
    #[instrument(skip(self, invoice_ids), fields(org_id = %org_id, action = %action.as_str()))]
    pub async fn bulk_action(
        &self,
        org_id: Uuid,
        actor: Uuid,
        action: BulkAction,
        invoice_ids: &[Uuid],
    ) -> Result<Vec<Uuid>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["bulk_action"])
            .start_timer();

        let mut tx = self.pool.begin().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to begin transaction: {}", e))
        })?;

        let affected: Vec<Uuid> = match action {
            BulkAction::Send => {
                let ids: Vec<(Uuid,)> = sqlx::query_as(
                    r#"
                    UPDATE invoices
                    SET status = 'sent', sent_utc = NOW(), updated_utc = NOW()
                    WHERE org_id = $1 AND invoice_id = ANY($2) AND status = 'draft'
                      AND EXISTS (
                          SELECT 1 FROM invoice_line_items li
                          WHERE li.invoice_id = invoices.invoice_id
                      )
                    RETURNING invoice_id
                    "#,
                )
                .bind(org_id)
                .bind(invoice_ids)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to bulk send: {}", e))
                })?;

                let ids: Vec<Uuid> = ids.into_iter().map(|(id,)| id).collect();
                for id in &ids {
                    Self::append_activity(
                        &mut tx,
                        org_id,
                        *id,
                        ActivityType::Sent,
                        "Invoice sent via email",
                        None,
                        Some("email"),
                        None,
                        actor,
                    )
                    .await?;
                }
                ids
            }
            BulkAction::MarkPaid => {
                let ids: Vec<(Uuid,)> = sqlx::query_as(
                    r#"
                    UPDATE invoices
                    SET status = 'paid', paid_utc = NOW(), updated_utc = NOW()
                    WHERE org_id = $1 AND invoice_id = ANY($2)
                      AND status IN ('sent', 'overdue')
                    RETURNING invoice_id
                    "#,
                )
                .bind(org_id)
                .bind(invoice_ids)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to bulk mark paid: {}", e))
                })?;

                let ids: Vec<Uuid> = ids.into_iter().map(|(id,)| id).collect();
                for id in &ids {
                    Self::append_activity(
                        &mut tx,
                        org_id,
                        *id,
                        ActivityType::Paid,
                        "Invoice marked paid",
                        None,
                        None,
                        None,
                        actor,
                    )
                    .await?;
                }
                ids
            }
            BulkAction::Delete => {
                let ids: Vec<(Uuid,)> = sqlx::query_as(
                    r#"
                    DELETE FROM invoices
                    WHERE org_id = $1 AND invoice_id = ANY($2)
                    RETURNING invoice_id
                    "#,
                )
                .bind(org_id)
                .bind(invoice_ids)
                .fetch_all(&mut *tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!("Failed to bulk delete: {}", e))
                })?;

                ids.into_iter().map(|(id,)| id).collect()
            }
        };

        tx.commit().await.map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to commit transaction: {}", e))
        })?;

        timer.observe_duration();

        info!(
            affected = affected.len(),
            requested = invoice_ids.len(),
            "Bulk action applied"
        );

        Ok(affected)
    }

    // -------------------------------------------------------------------------
    // Line Item & Activity Reads
    // -------------------------------------------------------------------------

    /// Get line items for an invoice in display order.
    #[instrument(skip(self), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn get_line_items(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<LineItem>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["get_line_items"])
            .start_timer();

        let line_items = sqlx::query_as::<_, LineItem>(&format!(
            r#"
            SELECT {LINE_ITEM_COLUMNS}
            FROM invoice_line_items
            WHERE org_id = $1 AND invoice_id = $2
            ORDER BY sort_order, created_utc
            "#,
        ))
        .bind(org_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::DatabaseError(anyhow::anyhow!("Failed to get line items: {}", e)))?;

        timer.observe_duration();

        Ok(line_items)
    }

    /// Get the activity log for an invoice, oldest first.
    #[instrument(skip(self), fields(org_id = %org_id, invoice_id = %invoice_id))]
    pub async fn list_activities(
        &self,
        org_id: Uuid,
        invoice_id: Uuid,
    ) -> Result<Vec<InvoiceActivity>, AppError> {
        let timer = DB_QUERY_DURATION
            .with_label_values(&["list_activities"])
            .start_timer();

        let activities = sqlx::query_as::<_, InvoiceActivity>(
            r#"
            SELECT activity_id, invoice_id, org_id, activity_type, title, description,
                channel, metadata, created_by, created_utc
            FROM invoice_activities
            WHERE org_id = $1 AND invoice_id = $2
            ORDER BY created_utc
            "#,
        )
        .bind(org_id)
        .bind(invoice_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to list activities: {}", e))
        })?;

        timer.observe_duration();

        Ok(activities)
    }

    // -------------------------------------------------------------------------
    // Transaction Helpers
    // -------------------------------------------------------------------------

    /// Advance the tenant's invoice number sequence under a row lock.
    ///
    /// A missing counter row seeds from the tenant's most recent invoice
    /// number (trailing digit run; 0 when absent or unparsable), so numbering
    /// continues across data imported before the counter existed.
    async fn next_invoice_number(
        tx: &mut Transaction<'_, Postgres>,
        org_id: Uuid,
    ) -> Result<String, AppError> {
        let current: Option<i64> = sqlx::query_scalar(
            r#"
            SELECT last_value FROM invoice_counters
            WHERE org_id = $1
            FOR UPDATE
            "#,
        )
        .bind(org_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to lock invoice counter: {}", e))
        })?;

        let next = match current {
            Some(value) => {
                let next = value + 1;
                sqlx::query("UPDATE invoice_counters SET last_value = $2 WHERE org_id = $1")
                    .bind(org_id)
                    .bind(next)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to advance invoice counter: {}",
                            e
                        ))
                    })?;
                next
            }
            None => {
                let latest: Option<String> = sqlx::query_scalar(
                    r#"
                    SELECT invoice_number FROM invoices
                    WHERE org_id = $1
                    ORDER BY created_utc DESC
                    LIMIT 1
                    "#,
                )
                .bind(org_id)
                .fetch_optional(&mut **tx)
                .await
                .map_err(|e| {
                    AppError::DatabaseError(anyhow::anyhow!(
                        "Failed to read latest invoice number: {}",
                        e
                    ))
                })?;

                let seed = latest
                    .as_deref()
                    .and_then(parse_invoice_number)
                    .unwrap_or(0);
                let next = seed + 1;

                sqlx::query("INSERT INTO invoice_counters (org_id, last_value) VALUES ($1, $2)")
                    .bind(org_id)
                    .bind(next)
                    .execute(&mut **tx)
                    .await
                    .map_err(|e| {
                        AppError::DatabaseError(anyhow::anyhow!(
                            "Failed to seed invoice counter: {}",
                            e
                        ))
                    })?;
                next
            }
        };

        Ok(format_invoice_number(next))
    }

    /// Insert a line-item set preserving input order via `sort_order`.
    async fn insert_line_items(
        tx: &mut Transaction<'_, Postgres>,
        org_id: Uuid,
        invoice_id: Uuid,
        items: &[LineItemInput],
    ) -> Result<(), AppError> {
        for (index, item) in items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO invoice_line_items (
                    line_item_id, invoice_id, org_id, product_id, product_name,
                    description, quantity, unit_price, tax_rate, line_total, sort_order
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(invoice_id)
            .bind(org_id)
            .bind(item.product_id)
            .bind(&item.product_name)
            .bind(&item.description)
            .bind(item.quantity)
            .bind(item.unit_price)
            .bind(item.tax_rate)
            .bind(totals::line_total(item))
            .bind(index as i32)
            .execute(&mut **tx)
            .await
            .map_err(|e| {
                AppError::DatabaseError(anyhow::anyhow!("Failed to insert line item: {}", e))
            })?;
        }

        Ok(())
    }

    /// Append one activity row. Activities are append-only; nothing in this
    /// service updates or deletes them individually.
    #[allow(clippy::too_many_arguments)]
    async fn append_activity(
        tx: &mut Transaction<'_, Postgres>,
        org_id: Uuid,
        invoice_id: Uuid,
        activity_type: ActivityType,
        title: &str,
        description: Option<&str>,
        channel: Option<&str>,
        metadata: Option<serde_json::Value>,
        created_by: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO invoice_activities (
                activity_id, invoice_id, org_id, activity_type, title,
                description, channel, metadata, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(invoice_id)
        .bind(org_id)
        .bind(activity_type.as_str())
        .bind(title)
        .bind(description)
        .bind(channel)
        .bind(metadata)
        .bind(created_by)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            AppError::DatabaseError(anyhow::anyhow!("Failed to append activity: {}", e))
        })?;

        Ok(())
    }
}
