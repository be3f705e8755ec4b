//! Shared harness for integration tests: a wiremock server standing in for
//! the PyrHouse API and a client pointed at it.

#![allow(dead_code)]

use std::time::Duration;

use pyrhouse_client::catalog::HttpCatalogClient;
use serde_json::{json, Value};
use wiremock::MockServer;

pub const TOKEN: &str = "test-token";

pub struct TestApi {
    pub server: MockServer,
    pub client: HttpCatalogClient,
}

impl TestApi {
    pub async fn new() -> Self {
        Self::with_timeout(Duration::from_secs(5)).await
    }

    pub async fn with_timeout(submit_timeout: Duration) -> Self {
        let server = MockServer::start().await;
        let client = HttpCatalogClient::new(
            &format!("{}/api/v1", server.uri()),
            Some(TOKEN.to_string()),
            submit_timeout,
        )
        .expect("mock server uri is a valid base url");
        Self { server, client }
    }

    pub fn bearer() -> String {
        format!("Bearer {}", TOKEN)
    }
}

pub fn lookup_json(id: i64, category: &str) -> Value {
    json!({ "id": id, "category": category })
}

pub fn stock_json(id: i64, label: &str, quantity: u32, location_id: i64) -> Value {
    json!({
        "id": id,
        "category_id": id * 10,
        "category_label": label,
        "origin_tag": null,
        "quantity": quantity,
        "location_id": location_id
    })
}

pub fn receipt_json(id: i64) -> Value {
    json!({ "id": id, "status": "in_transit" })
}
