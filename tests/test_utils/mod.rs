//! Test utilities for running flows against a mocked Grafana.
//!
//! The helpers mount the responses a fresh Grafana instance gives when every
//! entity is created for the first time.

use obs_bootstrap::{
    config::AppConfig,
    credentials::AdminCredential,
    grafana::GrafanaClient,
};
use serde_json::json;
use url::Url;
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{body_partial_json, header, method, path, path_regex},
};

/// `Authorization` header for the fallback `admin:admin` credential.
#[allow(dead_code)]
pub const ADMIN_BASIC_AUTH: &str = "Basic YWRtaW46YWRtaW4=";

/// Client authenticated with the fallback credential.
#[allow(dead_code)]
pub fn client_for(server: &MockServer) -> GrafanaClient {
    GrafanaClient::new(
        Url::parse(&server.uri()).expect("mock server uri"),
        AdminCredential::fallback("admin"),
    )
}

/// Configuration pointing at the mock server with an explicit admin password.
#[allow(dead_code)]
pub fn config_for(server: &MockServer) -> AppConfig {
    AppConfig {
        grafana_url: server.uri(),
        admin_password: Some("admin".to_string()),
        ..AppConfig::default()
    }
}

/// `GET /api/health` answers 200.
#[allow(dead_code)]
pub async fn mount_health(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "commit": "abc123",
            "database": "ok",
            "version": "11.2.0"
        })))
        .mount(server)
        .await;
}

/// Datasource lookups miss and every datasource write succeeds.
#[allow(dead_code)]
pub async fn mount_datasource_creation(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path_regex(r"^/api/datasources/name/.+$"))
        .respond_with(
            ResponseTemplate::new(404).set_body_json(json!({"message": "Data source not found"})),
        )
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/datasources"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Datasource added",
            "id": 1
        })))
        .mount(server)
        .await;
}

/// Org `name` is created with `org_id`; its service account is created with
/// id `org_id + 100` and its token key is `glsa_<name>`.
#[allow(dead_code)]
pub async fn mount_created_tenant(server: &MockServer, name: &str, org_id: i64) {
    let org_header = org_id.to_string();
    let sa_id = org_id + 100;

    Mock::given(method("POST"))
        .and(path("/api/orgs"))
        .and(body_partial_json(json!({ "name": name })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "message": "Organization created",
            "orgId": org_id
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/serviceaccounts/search"))
        .and(header("X-Grafana-Org-Id", org_header.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "totalCount": 0,
            "serviceAccounts": [],
            "page": 1,
            "perPage": 1000
        })))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/api/serviceaccounts"))
        .and(header("X-Grafana-Org-Id", org_header.as_str()))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "id": sa_id,
            "name": format!("sa-{name}"),
            "login": format!("sa-{name}"),
            "orgId": org_id,
            "role": "Editor"
        })))
        .mount(server)
        .await;

    let tokens_path = format!("/api/serviceaccounts/{sa_id}/tokens");
    Mock::given(method("GET"))
        .and(path(tokens_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path(tokens_path.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 1,
            "name": "bootstrap-token",
            "key": format!("glsa_{name}")
        })))
        .mount(server)
        .await;
}
