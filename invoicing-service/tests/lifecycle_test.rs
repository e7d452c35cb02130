//! Status lifecycle and bulk action integration tests for invoicing-service.

mod common;

use common::{example_line_items, TestApp};

async fn create_invoice(app: &TestApp, contact_id: uuid::Uuid) -> serde_json::Value {
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
    response.json().await.expect("Invalid JSON")
}

#[tokio::test]
async fn send_transitions_draft_and_appends_activity() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Lifecycle Co", "l@lifecycle.test").await;
    let invoice = create_invoice(&app, contact_id).await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    let response = app
        .post_json(
            &format!("/invoices/{}/send", invoice_id),
            &serde_json::json!({ "channels": ["email", "link"] }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let sent: serde_json::Value = response.json().await.unwrap();

    assert_eq!(sent["status"], "sent");
    assert!(!sent["sent_utc"].is_null());

    let response = app
        .get(&format!("/invoices/{}/activities", invoice_id))
        .await;
    let activities: serde_json::Value = response.json().await.unwrap();
    let activities = activities.as_array().unwrap();
    assert_eq!(activities.len(), 2);
    assert_eq!(activities[0]["activity_type"], "created");
    assert_eq!(activities[1]["activity_type"], "sent");
    assert_eq!(activities[1]["channel"], "email");
    assert_eq!(activities[1]["title"], "Invoice sent via email, link");
}

#[tokio::test]
async fn send_requires_line_items() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Empty Co", "e@empty.test").await;

    let response = app
        .post_json(
            "/invoices",
            &serde_json::json!({ "contact_id": contact_id }),
        )
        .await;
    assert_eq!(response.status(), 201);
    let invoice: serde_json::Value = response.json().await.unwrap();
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    let response = app
        .post_json(
            &format!("/invoices/{}/send", invoice_id),
            &serde_json::json!({}),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn send_rejects_non_draft_invoices() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Twice Co", "t@twice.test").await;
    let invoice = create_invoice(&app, contact_id).await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    let response = app
        .post_json(
            &format!("/invoices/{}/send", invoice_id),
            &serde_json::json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .post_json(
            &format!("/invoices/{}/send", invoice_id),
            &serde_json::json!({}),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn mark_paid_records_payment_metadata() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Payer Inc", "p@payer.test").await;
    let invoice = create_invoice(&app, contact_id).await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    let response = app
        .post_json(
            &format!("/invoices/{}/send", invoice_id),
            &serde_json::json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .post_json(
            &format!("/invoices/{}/pay", invoice_id),
            &serde_json::json!({
                "amount": 2700,
                "method": "wire",
                "reference": "TXN-9912"
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let paid: serde_json::Value = response.json().await.unwrap();

    assert_eq!(paid["status"], "paid");
    assert!(!paid["paid_utc"].is_null());

    let response = app
        .get(&format!("/invoices/{}/activities", invoice_id))
        .await;
    let activities: serde_json::Value = response.json().await.unwrap();
    let activities = activities.as_array().unwrap();
    assert_eq!(activities.len(), 3);
    assert_eq!(activities[2]["activity_type"], "paid");
    assert_eq!(activities[2]["metadata"]["amount"], 2700);
    assert_eq!(activities[2]["metadata"]["method"], "wire");
    assert_eq!(activities[2]["metadata"]["reference"], "TXN-9912");
}

#[tokio::test]
async fn mark_paid_rejects_draft_invoices() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Eager Inc", "e@eager.test").await;
    let invoice = create_invoice(&app, contact_id).await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    let response = app
        .post_json(
            &format!("/invoices/{}/pay", invoice_id),
            &serde_json::json!({}),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn update_rejects_paid_invoices() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Frozen Co", "f@frozen.test").await;
    let invoice = create_invoice(&app, contact_id).await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap();

    app.post_json(
        &format!("/invoices/{}/send", invoice_id),
        &serde_json::json!({}),
    )
    .await;
    app.post_json(
        &format!("/invoices/{}/pay", invoice_id),
        &serde_json::json!({}),
    )
    .await;

    let response = app
        .put_json(
            &format!("/invoices/{}", invoice_id),
            &serde_json::json!({ "notes": "too late" }),
        )
        .await;
    assert_eq!(response.status(), 400);
}

#[tokio::test]
async fn delete_cascades_line_items_and_activities() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Gone Ltd", "g@gone.test").await;
    let invoice = create_invoice(&app, contact_id).await;
    let invoice_id = invoice["invoice_id"].as_str().unwrap().to_string();
    let invoice_uuid: uuid::Uuid = invoice_id.parse().unwrap();

    let response = app.delete(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(response.status(), 204);

    let response = app.get(&format!("/invoices/{}", invoice_id)).await;
    assert_eq!(response.status(), 404);

    let line_items: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM invoice_line_items WHERE invoice_id = $1")
            .bind(invoice_uuid)
            .fetch_one(app.db.pool())
            .await
            .unwrap();
    assert_eq!(line_items, 0);

    let activities: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM invoice_activities WHERE invoice_id = $1")
            .bind(invoice_uuid)
            .fetch_one(app.db.pool())
            .await
            .unwrap();
    assert_eq!(activities, 0);
}

#[tokio::test]
async fn bulk_mark_paid_only_affects_sent_invoices() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Mixed Co", "m@mixed.test").await;

    let draft = create_invoice(&app, contact_id).await;
    let sent = create_invoice(&app, contact_id).await;
    let draft_id = draft["invoice_id"].as_str().unwrap().to_string();
    let sent_id = sent["invoice_id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            &format!("/invoices/{}/send", sent_id),
            &serde_json::json!({}),
        )
        .await;
    assert_eq!(response.status(), 200);

    let response = app
        .post_json(
            "/invoices/bulk",
            &serde_json::json!({
                "action": "mark_paid",
                "invoice_ids": [draft_id, sent_id],
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["affected_count"], 1);
    assert_eq!(body["affected_ids"][0], sent_id);

    let response = app.get(&format!("/invoices/{}", draft_id)).await;
    let invoice: serde_json::Value = response.json().await.unwrap();
    assert_eq!(invoice["status"], "draft");

    let response = app.get(&format!("/invoices/{}", sent_id)).await;
    let invoice: serde_json::Value = response.json().await.unwrap();
    assert_eq!(invoice["status"], "paid");
}

#[tokio::test]
async fn bulk_send_skips_drafts_without_line_items() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Partial Co", "p@partial.test").await;

    let with_items = create_invoice(&app, contact_id).await;
    let response = app
        .post_json(
            "/invoices",
            &serde_json::json!({ "contact_id": contact_id }),
        )
        .await;
    let without_items: serde_json::Value = response.json().await.unwrap();

    let with_id = with_items["invoice_id"].as_str().unwrap().to_string();
    let without_id = without_items["invoice_id"].as_str().unwrap().to_string();

    let response = app
        .post_json(
            "/invoices/bulk",
            &serde_json::json!({
                "action": "send",
                "invoice_ids": [with_id, without_id],
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();

    assert_eq!(body["affected_count"], 1);
    assert_eq!(body["affected_ids"][0], with_id);

    // One `sent` activity per affected invoice, none for the skipped one
    let response = app.get(&format!("/invoices/{}/activities", with_id)).await;
    let activities: serde_json::Value = response.json().await.unwrap();
    assert_eq!(activities.as_array().unwrap().len(), 2);

    let response = app
        .get(&format!("/invoices/{}/activities", without_id))
        .await;
    let activities: serde_json::Value = response.json().await.unwrap();
    assert_eq!(activities.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn bulk_delete_removes_invoices_in_any_status() {
    let Some(app) = TestApp::spawn().await else {
        return;
    };
    let contact_id = app.seed_contact("Purge Co", "p@purge.test").await;

    let draft = create_invoice(&app, contact_id).await;
    let sent = create_invoice(&app, contact_id).await;
    let draft_id = draft["invoice_id"].as_str().unwrap().to_string();
    let sent_id = sent["invoice_id"].as_str().unwrap().to_string();

    app.post_json(
        &format!("/invoices/{}/send", sent_id),
        &serde_json::json!({}),
    )
    .await;

    let response = app
        .post_json(
            "/invoices/bulk",
            &serde_json::json!({
                "action": "delete",
                "invoice_ids": [draft_id, sent_id],
            }),
        )
        .await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["affected_count"], 2);

    for id in [&draft_id, &sent_id] {
        let response = app.get(&format!("/invoices/{}", id)).await;
        assert_eq!(response.status(), 404);
    }
}
