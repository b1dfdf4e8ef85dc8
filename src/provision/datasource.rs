use tracing::{info, warn};

use crate::config::DatasourceDefinition;
use crate::error::ProvisionError;
use crate::grafana::{
    GrafanaClient,
    models::{DatasourcePayload, OrgId},
};

/// What [`ensure_datasource`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasourceAction {
    Created,
    Updated,
}

/// Create or update the datasource named by `definition` inside `org_id`.
///
/// The status of the write itself is not checked; a rejected write is only
/// logged. Errors are returned only when Grafana cannot be reached.
pub async fn ensure_datasource(
    client: &GrafanaClient,
    org_id: OrgId,
    definition: &DatasourceDefinition,
    tenant_id: &str,
) -> Result<DatasourceAction, ProvisionError> {
    let payload = DatasourcePayload::new(
        &definition.kind,
        &definition.name,
        &definition.url,
        tenant_id,
        definition.is_default,
    );
    let to_error = |source| ProvisionError::Datasource {
        name: definition.name.clone(),
        org_id,
        source,
    };

    let existing = client
        .datasource_by_name(org_id, &definition.name)
        .await
        .map_err(to_error)?;

    let (action, status) = match existing {
        Some(datasource) => {
            let status = client
                .update_datasource(org_id, datasource.id, &payload)
                .await
                .map_err(to_error)?;
            (DatasourceAction::Updated, status)
        }
        None => {
            let status = client
                .create_datasource(org_id, &payload)
                .await
                .map_err(to_error)?;
            (DatasourceAction::Created, status)
        }
    };

    if !status.is_success() {
        warn!(
            org_id,
            datasource = %definition.name,
            %status,
            "Grafana did not accept the datasource write"
        );
    }

    match action {
        DatasourceAction::Updated => {
            info!(org_id, datasource = %definition.name, tenant_id, "Updated datasource")
        }
        DatasourceAction::Created => {
            info!(org_id, datasource = %definition.name, tenant_id, "Created datasource")
        }
    }

    Ok(action)
}
