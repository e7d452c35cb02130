//! Shared test harness: spawns the application against a throwaway tenant.
//!
//! Integration tests need a running PostgreSQL; they self-skip when
//! `TEST_DATABASE_URL` is not set. Each `TestApp` acts under a fresh
//! `org_id`, so parallel tests never see each other's data.

use crm_core::config::Config as CoreConfig;
use invoicing_service::config::{DatabaseConfig, InvoicingConfig};
use invoicing_service::services::Database;
use invoicing_service::startup::Application;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub client: reqwest::Client,
    pub org_id: Uuid,
    pub user_id: Uuid,
    pub db: Database,
}

impl TestApp {
    /// Build and start the service. Returns `None` when no test database is
    /// configured, so suites can skip instead of failing.
    pub async fn spawn() -> Option<Self> {
        let Ok(database_url) = std::env::var("TEST_DATABASE_URL") else {
            eprintln!("TEST_DATABASE_URL not set; skipping integration test");
            return None;
        };

        let config = InvoicingConfig {
            common: CoreConfig { port: 0 },
            database: DatabaseConfig {
                url: database_url,
                max_connections: 5,
                min_connections: 1,
            },
        };

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");
        let port = app.port();
        let db = app.db().clone();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for the server to be ready by polling the health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        Some(TestApp {
            address,
            client,
            org_id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            db,
        })
    }

    /// Insert a contact for this tenant (contacts are owned by the CRM; the
    /// service only reads them).
    pub async fn seed_contact(&self, name: &str, email: &str) -> Uuid {
        let contact_id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO contacts (contact_id, org_id, name, email) VALUES ($1, $2, $3, $4)",
        )
        .bind(contact_id)
        .bind(self.org_id)
        .bind(name)
        .bind(email)
        .execute(self.db.pool())
        .await
        .expect("Failed to seed contact");
        contact_id
    }

    pub async fn get(&self, path: &str) -> reqwest::Response {
        self.get_as(self.org_id, path).await
    }

    /// GET acting as an arbitrary tenant; used by isolation tests.
    pub async fn get_as(&self, org_id: Uuid, path: &str) -> reqwest::Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .header("X-Org-ID", org_id.to_string())
            .header("X-User-ID", self.user_id.to_string())
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn post_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}{}", self.address, path))
            .header("X-Org-ID", self.org_id.to_string())
            .header("X-User-ID", self.user_id.to_string())
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn put_json(&self, path: &str, body: &serde_json::Value) -> reqwest::Response {
        self.client
            .put(format!("{}{}", self.address, path))
            .header("X-Org-ID", self.org_id.to_string())
            .header("X-User-ID", self.user_id.to_string())
            .json(body)
            .send()
            .await
            .expect("Request failed")
    }

    pub async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(format!("{}{}", self.address, path))
            .header("X-Org-ID", self.org_id.to_string())
            .header("X-User-ID", self.user_id.to_string())
            .send()
            .await
            .expect("Request failed")
    }
}

/// The worked billing example: 2 x 1000c @ 10% tax plus 1 x 500c untaxed.
pub fn example_line_items() -> serde_json::Value {
    serde_json::json!([
        {
            "product_name": "Consulting",
            "quantity": "2",
            "unit_price": 1000,
            "tax_rate": "10"
        },
        {
            "product_name": "Setup fee",
            "quantity": "1",
            "unit_price": 500,
            "tax_rate": "0"
        }
    ])
}
