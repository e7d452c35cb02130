use crate::config::InvoicingConfig;
use crate::handlers::{health, invoices};
use crate::services::Database;
use axum::{
    middleware::from_fn,
    routing::{get, post},
    Router,
};
use crm_core::error::AppError;
use crm_core::middleware::security_headers::security_headers_middleware;
use crm_core::middleware::tracing::request_id_middleware;
use std::future::IntoFuture;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

#[derive(Clone)]
pub struct AppState {
    pub config: InvoicingConfig,
    pub db: Database,
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: InvoicingConfig) -> Result<Self, AppError> {
        let db = Database::new(
            &config.database.url,
            config.database.max_connections,
            config.database.min_connections,
        )
        .await
        .map_err(|e| {
            tracing::error!("Failed to connect to PostgreSQL: {}", e);
            e
        })?;

        db.run_migrations().await.map_err(|e| {
            tracing::error!("Failed to run database migrations: {}", e);
            e
        })?;

        let state = AppState {
            config: config.clone(),
            db: db.clone(),
        };

        let app = Router::new()
            .route("/health", get(health::health_check))
            .route("/ready", get(health::readiness_check))
            .route("/metrics", get(health::metrics_endpoint))
            .route(
                "/invoices",
                get(invoices::list_invoices).post(invoices::create_invoice),
            )
            .route("/invoices/bulk", post(invoices::bulk_action))
            .route(
                "/invoices/:invoice_id",
                get(invoices::get_invoice)
                    .put(invoices::update_invoice)
                    .delete(invoices::delete_invoice),
            )
            .route("/invoices/:invoice_id/send", post(invoices::send_invoice))
            .route("/invoices/:invoice_id/pay", post(invoices::mark_paid))
            .route(
                "/invoices/:invoice_id/activities",
                get(invoices::list_activities),
            )
            .layer(from_fn(security_headers_middleware))
            .layer(from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive())
            .with_state(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app);

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn db(&self) -> &Database {
        &self.state.db
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}
