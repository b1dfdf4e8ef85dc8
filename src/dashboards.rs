//! Dashboard import from the public catalog.
//!
//! Each catalog entry is downloaded, wrapped in an import request whose
//! datasource inputs point at the provisioned datasources, and uploaded with
//! overwrite enabled. Entries are independent: one failing download or upload
//! is recorded and the rest still run.

use reqwest::StatusCode;
use serde_json::Value;
use thiserror::Error;
use tracing::{error, info};

use crate::config::{DashboardSource, DatasourceDefinition};
use crate::error::ApiError;
use crate::grafana::{
    GrafanaClient,
    models::{DashboardImportRequest, DashboardImportResponse, DashboardInput, DatasourceKind, OrgId},
};

/// Errors importing a single dashboard.
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to download {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("catalog returned {status} for {url}")]
    CatalogStatus { url: String, status: StatusCode },
    #[error("definition at {url} is not valid JSON: {source}")]
    InvalidDefinition {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("upload failed: {0}")]
    Upload(#[from] ApiError),
}

/// Result for one catalog entry.
#[derive(Debug)]
pub struct DashboardOutcome {
    pub name: String,
    pub result: Result<DashboardImportResponse, ImportError>,
}

/// Per-dashboard outcomes in catalog order.
#[derive(Debug, Default)]
pub struct ImportSummary {
    pub outcomes: Vec<DashboardOutcome>,
}

impl ImportSummary {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }
}

/// Imports catalog dashboards into one Grafana instance.
pub struct DashboardImporter<'a> {
    grafana: &'a GrafanaClient,
    catalog: reqwest::Client,
    datasources: Vec<DatasourceDefinition>,
    org_id: Option<OrgId>,
}

impl<'a> DashboardImporter<'a> {
    pub fn new(
        grafana: &'a GrafanaClient,
        datasources: Vec<DatasourceDefinition>,
        org_id: Option<OrgId>,
    ) -> Self {
        Self {
            grafana,
            catalog: reqwest::Client::new(),
            datasources,
            org_id,
        }
    }

    /// Import every source, never stopping early.
    pub async fn import_all(&self, sources: &[DashboardSource]) -> ImportSummary {
        let mut summary = ImportSummary::default();

        for source in sources {
            info!(dashboard = %source.name, url = %source.url, "Importing dashboard");
            let result = self.import_one(source).await;
            match &result {
                Ok(response) => info!(
                    dashboard = %source.name,
                    uid = response.uid.as_deref().unwrap_or_default(),
                    title = response.title.as_deref().unwrap_or_default(),
                    "Imported dashboard"
                ),
                Err(err) => error!(dashboard = %source.name, error = %err, "Dashboard import failed"),
            }
            summary.outcomes.push(DashboardOutcome {
                name: source.name.clone(),
                result,
            });
        }

        summary
    }

    async fn import_one(&self, source: &DashboardSource) -> Result<DashboardImportResponse, ImportError> {
        let definition = self.download(&source.url).await?;
        let request = build_import_request(definition, &self.datasources);
        Ok(self.grafana.import_dashboard(self.org_id, &request).await?)
    }

    async fn download(&self, url: &str) -> Result<Value, ImportError> {
        let response = self
            .catalog
            .get(url)
            .send()
            .await
            .map_err(|source| ImportError::Download {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(ImportError::CatalogStatus {
                url: url.to_string(),
                status,
            });
        }

        response
            .json::<Value>()
            .await
            .map_err(|source| ImportError::InvalidDefinition {
                url: url.to_string(),
                source,
            })
    }
}

/// Wrap a catalog definition in an overwrite import request.
pub fn build_import_request(
    mut definition: Value,
    datasources: &[DatasourceDefinition],
) -> DashboardImportRequest {
    let inputs = build_inputs(&definition, datasources);
    // Catalog exports carry the author's numeric id; Grafana assigns its own.
    if let Some(object) = definition.as_object_mut() {
        object.insert("id".to_string(), Value::Null);
    }
    DashboardImportRequest {
        dashboard: definition,
        overwrite: true,
        folder_id: 0,
        inputs,
    }
}

/// Map the definition's datasource placeholders to provisioned datasource names.
///
/// Uses the `__inputs` declared by the definition; when there are none, the
/// conventional `DS_<TYPE>` placeholders are sent for every known datasource.
pub fn build_inputs(definition: &Value, datasources: &[DatasourceDefinition]) -> Vec<DashboardInput> {
    let target_for = |kind: &DatasourceKind| {
        datasources
            .iter()
            .find(|d| d.kind.is_tenant_scoped() && &d.kind == kind)
    };

    let declared = definition
        .get("__inputs")
        .and_then(Value::as_array)
        .filter(|inputs| !inputs.is_empty());

    match declared {
        Some(inputs) => inputs
            .iter()
            .filter(|input| input.get("type").and_then(Value::as_str) == Some("datasource"))
            .filter_map(|input| {
                let name = input.get("name")?.as_str()?;
                let plugin_id = input.get("pluginId")?.as_str()?;
                let target = target_for(&DatasourceKind::from_slug(plugin_id))?;
                Some(DashboardInput {
                    name: name.to_string(),
                    kind: "datasource".to_string(),
                    plugin_id: plugin_id.to_string(),
                    value: target.name.clone(),
                })
            })
            .collect(),
        None => datasources
            .iter()
            .filter(|d| d.kind.is_tenant_scoped())
            .map(|d| DashboardInput {
                name: format!("DS_{}", d.kind.as_str().to_uppercase()),
                kind: "datasource".to_string(),
                plugin_id: d.kind.as_str().to_string(),
                value: d.name.clone(),
            })
            .collect(),
    }
}
