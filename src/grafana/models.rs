//! Request and response bodies for the Grafana HTTP API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Numeric organization identifier.
pub type OrgId = i64;

/// Header Grafana uses to scope a request to an organization.
pub const ORG_ID_HEADER: &str = "X-Grafana-Org-Id";

/// Header Mimir, Loki and Tempo use to isolate tenants.
pub const TENANT_HEADER: &str = "X-Scope-OrgID";

/// Datasource plugin types known to the bootstrap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatasourceKind {
    Prometheus,
    Loki,
    Tempo,
    Other(String),
}

impl DatasourceKind {
    /// Create a kind from a Grafana plugin id
    pub fn from_slug(slug: &str) -> Self {
        match slug.to_lowercase().as_str() {
            "prometheus" => DatasourceKind::Prometheus,
            "loki" => DatasourceKind::Loki,
            "tempo" => DatasourceKind::Tempo,
            other => DatasourceKind::Other(other.to_string()),
        }
    }

    /// Grafana plugin id
    pub fn as_str(&self) -> &str {
        match self {
            DatasourceKind::Prometheus => "prometheus",
            DatasourceKind::Loki => "loki",
            DatasourceKind::Tempo => "tempo",
            DatasourceKind::Other(name) => name,
        }
    }

    /// Whether the backend expects the tenant header on every query.
    pub fn is_tenant_scoped(&self) -> bool {
        !matches!(self, DatasourceKind::Other(_))
    }
}

#[derive(Debug, Serialize)]
pub struct CreateOrgRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrgResponse {
    pub org_id: OrgId,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub id: OrgId,
}

/// Full datasource body sent on both create and update.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DatasourcePayload {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub url: String,
    pub access: String,
    pub is_default: bool,
    pub json_data: Map<String, Value>,
    pub secure_json_data: Map<String, Value>,
}

impl DatasourcePayload {
    /// Builds the payload, adding the tenant header for tenant-scoped kinds.
    pub fn new(kind: &DatasourceKind, name: &str, url: &str, tenant_id: &str, is_default: bool) -> Self {
        let mut json_data = Map::new();
        let mut secure_json_data = Map::new();

        if kind.is_tenant_scoped() {
            json_data.insert("httpHeaderName1".to_string(), Value::from(TENANT_HEADER));
            secure_json_data.insert("httpHeaderValue1".to_string(), Value::from(tenant_id));
        }

        Self {
            name: name.to_string(),
            kind: kind.as_str().to_string(),
            url: url.to_string(),
            access: "proxy".to_string(),
            is_default,
            json_data,
            secure_json_data,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Datasource {
    pub id: i64,
}

#[derive(Debug, Serialize)]
pub struct CreateServiceAccountRequest<'a> {
    pub name: &'a str,
    pub role: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccount {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccountSearch {
    #[serde(default)]
    pub service_accounts: Vec<ServiceAccount>,
}

#[derive(Debug, Serialize)]
pub struct CreateTokenRequest<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedToken {
    pub name: String,
    pub key: String,
}

/// Maps a dashboard `__inputs` placeholder to a concrete datasource name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardInput {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub plugin_id: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardImportRequest {
    pub dashboard: Value,
    pub overwrite: bool,
    pub folder_id: i64,
    pub inputs: Vec<DashboardInput>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardImportResponse {
    #[serde(default)]
    pub uid: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub imported_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn tenant_scoped_payload_carries_header() {
        let payload = DatasourcePayload::new(
            &DatasourceKind::Loki,
            "Loki",
            "http://loki:80",
            "devteam-1",
            false,
        );
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["type"], "loki");
        assert_eq!(value["access"], "proxy");
        assert_eq!(value["isDefault"], false);
        assert_eq!(value["jsonData"]["httpHeaderName1"], "X-Scope-OrgID");
        assert_eq!(value["secureJsonData"]["httpHeaderValue1"], "devteam-1");
    }

    #[test]
    fn other_kinds_get_no_tenant_header() {
        let kind = DatasourceKind::from_slug("elasticsearch");
        assert_eq!(kind, DatasourceKind::Other("elasticsearch".to_string()));
        let payload = DatasourcePayload::new(&kind, "ES", "http://es:9200", "t", false);
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["jsonData"], json!({}));
        assert_eq!(value["secureJsonData"], json!({}));
    }

    #[test]
    fn import_response_reads_imported_url() {
        let response: DashboardImportResponse = serde_json::from_value(json!({
            "uid": "rYdddlPWk",
            "title": "Node Exporter Full",
            "imported": true,
            "importedUrl": "/d/rYdddlPWk/node-exporter-full"
        }))
        .unwrap();
        assert_eq!(response.uid.as_deref(), Some("rYdddlPWk"));
        assert_eq!(
            response.imported_url.as_deref(),
            Some("/d/rYdddlPWk/node-exporter-full")
        );
    }

    #[test]
    fn kind_slugs_are_case_insensitive() {
        assert_eq!(DatasourceKind::from_slug("Prometheus"), DatasourceKind::Prometheus);
        assert_eq!(DatasourceKind::Tempo.as_str(), "tempo");
        assert!(DatasourceKind::Tempo.is_tenant_scoped());
    }
}
