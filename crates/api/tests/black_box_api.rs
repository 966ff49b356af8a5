use deliverynote_core::{AggregateId, TenantId};
use deliverynote_infra::config::DeliveryConfig;
use reqwest::StatusCode;
use serde_json::{Value, json};

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod, bound to an ephemeral port.
        let app = deliverynote_api::app::build_app(DeliveryConfig::default()).await;
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Client {
    http: reqwest::Client,
    base_url: String,
    tenant: String,
}

impl Client {
    fn new(server: &TestServer, tenant_id: TenantId) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: server.base_url.clone(),
            tenant: tenant_id.to_string(),
        }
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .header("x-tenant-id", &self.tenant)
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("x-tenant-id", &self.tenant)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }
}

fn new_id() -> String {
    AggregateId::new().to_string()
}

struct Seed {
    party_id: String,
    warehouse_id: String,
    product_id: String,
}

async fn seed_catalog(client: &Client) -> Seed {
    let category = new_id();
    let unit = json!({
        "id": new_id(), "name": "Unit", "symbol": "u", "digits": 0, "category": category
    });
    let tax_id = new_id();
    let (party_id, warehouse_id, product_id) = (new_id(), new_id(), new_id());

    let steps = [
        ("/catalog/uoms", unit.clone()),
        (
            "/catalog/taxes",
            json!({ "id": tax_id, "name": "IVA 12%", "kind": { "type": "percentage", "rate": "0.12" } }),
        ),
        (
            "/catalog/warehouses",
            json!({
                "id": warehouse_id, "name": "Main",
                "input_location": new_id(), "output_location": new_id(), "storage_location": new_id()
            }),
        ),
        (
            "/catalog/parties",
            json!({ "id": party_id, "name": "Distribuidora Andina", "customer_location": new_id() }),
        ),
        (
            "/catalog/products",
            json!({
                "id": product_id, "code": "GAS15", "name": "Gas cylinder 15kg", "kind": "goods",
                "sale_uom": unit, "list_price": "10", "customer_taxes": [tax_id]
            }),
        ),
    ];
    for (path, body) in steps {
        let (status, resp) = client.post(path, body).await;
        assert_eq!(status, StatusCode::CREATED, "{path}: {resp}");
    }

    Seed {
        party_id,
        warehouse_id,
        product_id,
    }
}

async fn list_until_status(client: &Client, id: &str, status: &str) -> Value {
    // The list is projection-backed and catches up asynchronously.
    for _ in 0..50 {
        let (_, body) = client.get("/deliveries").await;
        if let Some(row) = body["items"]
            .as_array()
            .and_then(|items| items.iter().find(|r| r["delivery_id"] == id && r["status"] == status))
        {
            return row.clone();
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    panic!("delivery {id} did not reach {status} in the list");
}

#[tokio::test]
async fn health_needs_no_tenant() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/health", server.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn tenant_header_is_required() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(format!("{}/deliveries", server.base_url)).await.unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_tenant");
}

#[tokio::test]
async fn delivery_lifecycle_over_http() {
    let server = TestServer::spawn().await;
    let client = Client::new(&server, TenantId::new());
    let seed = seed_catalog(&client).await;

    let (status, lot) = client
        .post("/lots", json!({ "product_id": seed.product_id, "number": "L-001" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let lot_id = lot["id"].as_str().unwrap().to_string();

    let (status, delivery) = client
        .post(
            "/deliveries",
            json!({ "party_id": seed.party_id, "warehouse_id": seed.warehouse_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{delivery}");
    assert_eq!(delivery["status"], "draft");
    assert_eq!(delivery["currency"], "USD");
    let id = delivery["id"].as_str().unwrap().to_string();

    let (status, delivery) = client
        .post(
            &format!("/deliveries/{id}/lines"),
            json!({ "product_id": seed.product_id, "quantity": "2", "lot_id": lot_id }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{delivery}");
    assert_eq!(delivery["lines"][0]["description"], "[GAS15] Gas cylinder 15kg");

    let (status, totals) = client.get(&format!("/deliveries/{id}/totals")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(totals["total_amount"], "22.40");

    let (status, saved) = client.post(&format!("/deliveries/{id}/save"), json!({})).await;
    assert_eq!(status, StatusCode::OK, "{saved}");
    assert_eq!(saved["number"], "000000001");
    assert_eq!(saved["status"], "saved");

    let (_, lot) = client.get(&format!("/lots/{lot_id}")).await;
    assert_eq!(lot["used"], true);

    let row = list_until_status(&client, &id, "saved").await;
    assert_eq!(row["number"], "000000001");

    let (status, again) = client.post(&format!("/deliveries/{id}/save"), json!({})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{again}");

    let (status, report) = client.get(&format!("/deliveries/{id}/report")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(report["amount_in_words"], "VEINTIDÓS");
    assert_eq!(report["decimals"], "40");

    let (status, consolidated) = client
        .post(&format!("/deliveries/{id}/consolidate"), json!({}))
        .await;
    assert_eq!(status, StatusCode::OK, "{consolidated}");
    assert_eq!(consolidated["delivery"]["status"], "invoiced");
    assert_eq!(consolidated["draft"]["state"], "draft");
    assert_eq!(consolidated["draft"]["total_amount"], "22.40");

    let (_, lot) = client.get(&format!("/lots/{lot_id}")).await;
    assert_eq!(lot["used"], false);

    let row = list_until_status(&client, &id, "invoiced").await;
    assert_eq!(row["totals"]["total"], "22.40");

    let (status, levels) = client.get("/stock/levels").await;
    assert_eq!(status, StatusCode::OK);
    assert!(levels["items"].is_array());
}

#[tokio::test]
async fn errors_map_to_http_statuses() {
    let server = TestServer::spawn().await;
    let client = Client::new(&server, TenantId::new());
    let seed = seed_catalog(&client).await;

    let (status, _) = client.get("/deliveries/not-a-uuid").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = client.get(&format!("/deliveries/{}", new_id())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");

    let (_, delivery) = client
        .post(
            "/deliveries",
            json!({ "party_id": seed.party_id, "warehouse_id": seed.warehouse_id }),
        )
        .await;
    let id = delivery["id"].as_str().unwrap().to_string();

    let (status, body) = client
        .post(
            &format!("/deliveries/{id}/lines"),
            json!({ "quantity": "1", "description": "  " }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let (status, body) = client.post(&format!("/deliveries/{id}/save"), json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

    let other = Client::new(&server, TenantId::new());
    let (status, _) = other.get(&format!("/deliveries/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
