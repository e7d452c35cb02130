//! Invoice CRUD integration tests for invoicing-service.

mod common;

use common::{example_line_items, TestApp};
use uuid::Uuid;

#[tokio::test]
async fn create_invoice_computes_totals_and_assigns_first_number() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Acme Corp", "billing@acme.test").await;

    let response = app
        .post_json(
            "/invoices",
            &serde_json::json!({
                "contact_id": contact_id,
                "due_date": "2026-09-30",
                "notes": "Net 30",
                "line_items": example_line_items(),
            }),
        )
        .await;

    assert_eq!(response.status(), 201);
    let invoice: serde_json::Value = response.json().await.expect("Invalid JSON");

    assert_eq!(invoice["invoice_number"], "INV-000001");
    assert_eq!(invoice["status"], "draft");
    assert_eq!(invoice["subtotal"], 2500);
    assert_eq!(invoice["tax_total"], 200);
    assert_eq!(invoice["total"], 2700);
    assert_eq!(invoice["currency"], "USD");
    assert_eq!(invoice["contact_name"], "Acme Corp");
    assert_eq!(invoice["line_items"].as_array().unwrap().len(), 2);
    // Insertion order preserved for display
    assert_eq!(invoice["line_items"][0]["product_name"], "Consulting");
    assert_eq!(invoice["line_items"][1]["product_name"], "Setup fee");
    assert_eq!(invoice["line_items"][0]["line_total"], 2200);
    assert!(invoice["sent_utc"].is_null());
    assert!(invoice["paid_utc"].is_null());
}

#[tokio::test]
async fn invoice_numbers_increase_monotonically_per_tenant() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Numbered Ltd", "ar@numbered.test").await;

    let mut numbers = Vec::new();
    for _ in 0..3 {
        let response = app
            .post_json(
                "/invoices",
                &serde_json::json!({
                    "contact_id": contact_id,
                    "line_items": example_line_items(),
                }),
            )
            .await;
        assert_eq!(response.status(), 201);
        let invoice: serde_json::Value = response.json().await.unwrap();
        numbers.push(invoice["invoice_number"].as_str().unwrap().to_string());
    }

    assert_eq!(numbers, ["INV-000001", "INV-000002", "INV-000003"]);
}

#[tokio::test]
async fn create_invoice_rejects_unknown_contact() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let response = app
        .post_json(
            "/invoices",
            &serde_json::json!({
                "contact_id": Uuid::new_v4(),
                "line_items": example_line_items(),
            }),
        )
        .await;

    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn create_invoice_rejects_invalid_line_items() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Strict Inc", "ap@strict.test").await;

    // Zero quantity
    let response = app
        .post_json(
            "/invoices",
            &serde_json::json!({
                "contact_id": contact_id,
                "line_items": [{
                    "product_name": "Nothing",
                    "quantity": "0",
                    "unit_price": 100,
                    "tax_rate": "10"
                }],
            }),
        )
        .await;
    assert_eq!(response.status(), 422);

    // Tax rate above 100%
    let response = app
        .post_json(
            "/invoices",
            &serde_json::json!({
                "contact_id": contact_id,
                "line_items": [{
                    "product_name": "Overtaxed",
                    "quantity": "1",
                    "unit_price": 100,
                    "tax_rate": "101"
                }],
            }),
        )
        .await;
    assert_eq!(response.status(), 422);
}

#[tokio::test]
async fn invoices_are_invisible_outside_their_tenant() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Tenant A", "a@tenant.test").await;

    let response = app
        .post_json(
            "/invoices",
            &serde_json::json!({
                "contact_id": contact_id,
                "line_items": example_line_items(),
            }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let invoice: serde_json::Value = response.json().await.unwrap();
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    let other_org = Uuid::new_v4();
    let response = app
        .get_as(other_org, &format!("/invoices/{}", invoice_id))
        .await;
    assert_eq!(response.status(), 404);

    let response = app.get_as(other_org, "/invoices").await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["invoices"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn list_invoices_filters_by_status() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Filter Co", "f@filter.test").await;

    for _ in 0..2 {
        let response = app
            .post_json(
                "/invoices",
                &serde_json::json!({
                    "contact_id": contact_id,
                    "line_items": example_line_items(),
                }),
            )
            .await;
        assert_eq!(response.status(), 201);
    }

    let response = app.get("/invoices?status=draft").await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["invoices"].as_array().unwrap().len(), 2);

    let response = app.get("/invoices?status=paid").await;
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["invoices"].as_array().unwrap().len(), 0);

    let response = app.get("/invoices?status=bogus").await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn update_replaces_line_items_and_recomputes_totals() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Recompute LLC", "r@recompute.test").await;

    let response = app
        .post_json(
            "/invoices",
            &serde_json::json!({
                "contact_id": contact_id,
                "line_items": example_line_items(),
            }),
        )
        .await;
    let invoice: serde_json::Value = response.json().await.unwrap();
    let invoice_id = invoice["invoice_id"].as_str().unwrap().to_string();

    let response = app
        .put_json(
            &format!("/invoices/{}", invoice_id),
            &serde_json::json!({
                "notes": "Revised",
                "line_items": [{
                    "product_name": "Single item",
                    "quantity": "3",
                    "unit_price": 200,
                    "tax_rate": "0"
                }],
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let updated: serde_json::Value = response.json().await.unwrap();

    assert_eq!(updated["notes"], "Revised");
    assert_eq!(updated["subtotal"], 600);
    assert_eq!(updated["tax_total"], 0);
    assert_eq!(updated["total"], 600);
    assert_eq!(updated["line_items"].as_array().unwrap().len(), 1);
    // Number and status are untouched by updates
    assert_eq!(updated["invoice_number"], invoice["invoice_number"]);
    assert_eq!(updated["status"], "draft");

    // Updates append no activity: only `created` is on the log
    let response = app
        .get(&format!("/invoices/{}/activities", invoice_id))
        .await;
    let activities: serde_json::Value = response.json().await.unwrap();
    let activities = activities.as_array().unwrap();
    assert_eq!(activities.len(), 1);
    assert_eq!(activities[0]["activity_type"], "created");
}

#[tokio::test]
async fn requests_without_tenant_headers_are_unauthorized() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };

    let response = app
        .client
        .get(format!("{}/invoices", app.address))
        .send()
        .await
        .expect("Request failed");
    assert_eq!(response.status(), 401);
}
