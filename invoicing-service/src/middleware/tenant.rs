//! Tenant context middleware for multi-tenancy support.
//!
//! Extracts tenant information (org_id, user_id) from request headers.
//! These headers are set by the BFF after authenticating the user and
//! validating their organization membership; a request without them has no
//! session and is rejected before any invoice data is touched.

use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use crm_core::error::AppError;
use uuid::Uuid;

/// Tenant context extracted from request headers.
///
/// `org_id` is the isolation boundary: every query and mutation in this
/// service is scoped to it.
#[derive(Debug, Clone, Copy)]
pub struct TenantContext {
    /// Organization the request acts within
    pub org_id: Uuid,
    /// User who is making the request
    pub user_id: Uuid,
}

#[async_trait]
impl<S> FromRequestParts<S> for TenantContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let org_id = parts
            .headers
            .get("X-Org-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing X-Org-ID header (required from BFF)"
                ))
            })?;

        let user_id = parts
            .headers
            .get("X-User-ID")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::AuthError(anyhow::anyhow!(
                    "Missing X-User-ID header (required from BFF)"
                ))
            })?;

        let org_id = Uuid::parse_str(org_id)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid X-Org-ID header")))?;
        let user_id = Uuid::parse_str(user_id)
            .map_err(|_| AppError::AuthError(anyhow::anyhow!("Invalid X-User-ID header")))?;

        // Add to tracing span for observability
        let span = tracing::Span::current();
        span.record("org_id", org_id.to_string());
        span.record("user_id", user_id.to_string());

        Ok(TenantContext { org_id, user_id })
    }
}
