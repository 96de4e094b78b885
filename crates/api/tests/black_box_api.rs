use reqwest::StatusCode;
use serde_json::{json, Value};

use invoicer_api::AppConfig;

const TOKEN: &str = "test-token";

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, in-memory store, ephemeral port.
        let config = AppConfig {
            database_url: "memory".to_string(),
            api_token: TOKEN.to_string(),
            ..AppConfig::default()
        };
        let app = invoicer_api::app::build_app(&config)
            .await
            .expect("failed to build app");
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> reqwest::Response {
        self.client
            .get(self.url(path))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap()
    }

    async fn post(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(path))
            .bearer_auth(TOKEN)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn put(&self, path: &str, body: Value) -> reqwest::Response {
        self.client
            .put(self.url(path))
            .bearer_auth(TOKEN)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    async fn delete(&self, path: &str) -> reqwest::Response {
        self.client
            .delete(self.url(path))
            .bearer_auth(TOKEN)
            .send()
            .await
            .unwrap()
    }

    async fn create_customer(&self, name: &str, email: &str) -> i64 {
        let res = self
            .post("/customers", json!({ "name": name, "email": email }))
            .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn contains(haystack: &[u8], needle: &str) -> bool {
    haystack
        .windows(needle.len())
        .any(|w| w == needle.as_bytes())
}

#[tokio::test]
async fn health_is_public() {
    let srv = TestServer::spawn().await;
    let res = srv.client.get(srv.url("/health")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn auth_required_for_protected_endpoints() {
    let srv = TestServer::spawn().await;

    for path in ["/customers", "/invoices", "/items", "/invoices/1/pdf"] {
        let res = srv.client.get(srv.url(path)).send().await.unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED, "{path}");
    }

    let res = srv
        .client
        .post(srv.url("/customers"))
        .bearer_auth("wrong-token")
        .json(&json!({ "name": "A", "email": "a@x.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "unauthorized");

    // The rejected create never reached the store.
    let res = srv.get("/customers").await;
    let customers: Value = res.json().await.unwrap();
    assert_eq!(customers, json!([]));
}

#[tokio::test]
async fn customer_lifecycle() {
    let srv = TestServer::spawn().await;

    let id = srv.create_customer("A", "a@x.com").await;
    assert_eq!(id, 1);

    let res = srv.get(&format!("/customers/{id}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "id": 1, "name": "A", "email": "a@x.com" }));

    let res = srv
        .put(&format!("/customers/{id}"), json!({ "name": "Acme" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["name"], "Acme");
    assert_eq!(body["email"], "a@x.com");

    let res = srv.delete(&format!("/customers/{id}")).await;
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Customer deleted" }));

    let res = srv.get(&format!("/customers/{id}")).await;
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let srv = TestServer::spawn().await;
    srv.create_customer("A", "a@x.com").await;

    let res = srv
        .post("/customers", json!({ "name": "B", "email": "a@x.com" }))
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");
}

#[tokio::test]
async fn malformed_bodies_and_ids_are_bad_requests() {
    let srv = TestServer::spawn().await;

    let res = srv
        .client
        .post(srv.url("/customers"))
        .bearer_auth(TOKEN)
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    let res = srv.post("/customers", json!({ "name": "A" })).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.get("/customers/abc").await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");
}

#[tokio::test]
async fn widget_invoice_end_to_end() {
    let srv = TestServer::spawn().await;
    let customer_id = srv.create_customer("A", "a@x.com").await;

    let res = srv
        .post(
            "/invoices",
            json!({
                "customer_id": customer_id,
                "items": [{ "description": "Widget", "price": 9.99 }]
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let invoice: Value = res.json().await.unwrap();
    let invoice_id = invoice["id"].as_i64().unwrap();

    assert_eq!(invoice["customer"]["name"], "A");
    assert_eq!(invoice["items"][0]["description"], "Widget");
    assert_eq!(invoice["items"][0]["quantity"], 1);
    assert_eq!(invoice["total"].as_f64().unwrap(), 9.99);
    assert_eq!(invoice["date"].as_str().unwrap().len(), 10);

    let res = srv.get(&format!("/invoices/{invoice_id}/pdf")).await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "application/pdf");
    assert_eq!(
        res.headers()["content-disposition"],
        format!("attachment; filename=\"invoice_{invoice_id}.pdf\"").as_str()
    );
    let pdf = res.bytes().await.unwrap();
    assert!(pdf.starts_with(b"%PDF"));
    assert!(contains(&pdf, "Widget"));
    assert!(contains(&pdf, "$9.99"));
}

#[tokio::test]
async fn invoice_for_unknown_customer_writes_nothing() {
    let srv = TestServer::spawn().await;

    let res = srv
        .post(
            "/invoices",
            json!({ "customer_id": 42, "items": [{ "description": "Widget", "price": 1 }] }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let invoices: Value = srv.get("/invoices").await.json().await.unwrap();
    let items: Value = srv.get("/items").await.json().await.unwrap();
    assert_eq!(invoices, json!([]));
    assert_eq!(items, json!([]));
}

#[tokio::test]
async fn date_only_update_keeps_customer() {
    let srv = TestServer::spawn().await;
    let customer_id = srv.create_customer("A", "a@x.com").await;

    let res = srv
        .post(
            "/invoices",
            json!({ "customer_id": customer_id, "date": "2024-01-31" }),
        )
        .await;
    let invoice: Value = res.json().await.unwrap();
    let invoice_id = invoice["id"].as_i64().unwrap();
    assert_eq!(invoice["date"], "2024-01-31");

    let res = srv
        .put(&format!("/invoices/{invoice_id}"), json!({ "date": "2024-02-29" }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["date"], "2024-02-29");
    assert_eq!(updated["customer"]["id"], customer_id);
}

#[tokio::test]
async fn items_track_their_invoice_total() {
    let srv = TestServer::spawn().await;
    let customer_id = srv.create_customer("A", "a@x.com").await;
    let invoice: Value = srv
        .post("/invoices", json!({ "customer_id": customer_id }))
        .await
        .json()
        .await
        .unwrap();
    let invoice_id = invoice["id"].as_i64().unwrap();
    assert_eq!(invoice["total"].as_f64().unwrap(), 0.0);

    let res = srv
        .post(
            "/items",
            json!({ "invoice_id": invoice_id, "description": "Bolt", "quantity": 4, "price": 0.25 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::CREATED);
    let item: Value = res.json().await.unwrap();
    let item_id = item["id"].as_i64().unwrap();
    assert_eq!(item["invoice_id"], invoice_id);

    let res = srv
        .put(&format!("/items/{item_id}"), json!({ "price": 0.5 }))
        .await;
    assert_eq!(res.status(), StatusCode::OK);
    let item: Value = res.json().await.unwrap();
    assert_eq!(item["description"], "Bolt");
    assert_eq!(item["quantity"], 4);

    let invoice: Value = srv
        .get(&format!("/invoices/{invoice_id}"))
        .await
        .json()
        .await
        .unwrap();
    assert_eq!(invoice["total"].as_f64().unwrap(), 2.0);

    let res = srv.delete(&format!("/items/{item_id}")).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Item deleted" }));
    assert_eq!(
        srv.get(&format!("/items/{item_id}")).await.status(),
        StatusCode::NOT_FOUND
    );
}

#[tokio::test]
async fn zero_quantity_item_is_rejected() {
    let srv = TestServer::spawn().await;
    let customer_id = srv.create_customer("A", "a@x.com").await;
    let invoice: Value = srv
        .post("/invoices", json!({ "customer_id": customer_id }))
        .await
        .json()
        .await
        .unwrap();

    let res = srv
        .post(
            "/items",
            json!({ "invoice_id": invoice["id"], "description": "Bolt", "quantity": 0, "price": 1 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn out_of_range_line_amount_is_rejected_and_listing_survives() {
    let srv = TestServer::spawn().await;
    let customer_id = srv.create_customer("A", "a@x.com").await;

    let res = srv
        .post(
            "/invoices",
            json!({
                "customer_id": customer_id,
                "items": [{ "description": "Bulk", "quantity": 1_000_000_000, "price": 1e20 }]
            }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "validation_error");

    let invoice: Value = srv
        .post("/invoices", json!({ "customer_id": customer_id }))
        .await
        .json()
        .await
        .unwrap();
    let res = srv
        .post(
            "/items",
            json!({ "invoice_id": invoice["id"], "description": "Bulk", "quantity": 1_000_000_000, "price": 1e20 }),
        )
        .await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);

    let res = srv.get("/invoices").await;
    assert_eq!(res.status(), StatusCode::OK);
    let invoices: Value = res.json().await.unwrap();
    assert_eq!(invoices.as_array().unwrap().len(), 1);
    assert_eq!(invoices[0]["items"], json!([]));
}

#[tokio::test]
async fn deleting_customer_cascades_to_invoices_and_items() {
    let srv = TestServer::spawn().await;
    let customer_id = srv.create_customer("A", "a@x.com").await;
    let invoice: Value = srv
        .post(
            "/invoices",
            json!({
                "customer_id": customer_id,
                "items": [
                    { "description": "Widget", "price": 9.99 },
                    { "description": "Gadget", "quantity": 2, "price": 5 }
                ]
            }),
        )
        .await
        .json()
        .await
        .unwrap();
    let invoice_id = invoice["id"].as_i64().unwrap();
    let item_ids: Vec<i64> = invoice["items"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_i64().unwrap())
        .collect();
    assert_eq!(item_ids.len(), 2);

    let res = srv.delete(&format!("/customers/{customer_id}")).await;
    assert_eq!(res.status(), StatusCode::OK);

    assert_eq!(
        srv.get(&format!("/invoices/{invoice_id}")).await.status(),
        StatusCode::NOT_FOUND
    );
    assert_eq!(
        srv.get(&format!("/invoices/{invoice_id}/pdf")).await.status(),
        StatusCode::NOT_FOUND
    );
    for item_id in item_ids {
        assert_eq!(
            srv.get(&format!("/items/{item_id}")).await.status(),
            StatusCode::NOT_FOUND
        );
    }
}

#[tokio::test]
async fn deleting_invoice_removes_its_items() {
    let srv = TestServer::spawn().await;
    let customer_id = srv.create_customer("A", "a@x.com").await;
    let invoice: Value = srv
        .post(
            "/invoices",
            json!({ "customer_id": customer_id, "items": [{ "description": "Widget", "price": 1 }] }),
        )
        .await
        .json()
        .await
        .unwrap();
    let invoice_id = invoice["id"].as_i64().unwrap();

    let res = srv.delete(&format!("/invoices/{invoice_id}")).await;
    let body: Value = res.json().await.unwrap();
    assert_eq!(body, json!({ "message": "Invoice deleted" }));

    let items: Value = srv.get("/items").await.json().await.unwrap();
    assert_eq!(items, json!([]));
    assert_eq!(
        srv.get(&format!("/customers/{customer_id}")).await.status(),
        StatusCode::OK
    );
}
