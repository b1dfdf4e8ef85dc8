use tracing::info;

use crate::error::ProvisionError;
use crate::grafana::{CreateOrgOutcome, GrafanaClient, models::OrgId};

/// Ensure an organization named `name` exists and return its id.
///
/// Creation is attempted first; on a conflict the existing org is looked up
/// by name. Any other failure is returned to the caller, which skips the tenant.
pub async fn ensure_org(client: &GrafanaClient, name: &str) -> Result<OrgId, ProvisionError> {
    info!(org = name, "Processing organization");

    let outcome = client
        .create_org(name)
        .await
        .map_err(|source| ProvisionError::Org {
            name: name.to_string(),
            source,
        })?;

    match outcome {
        CreateOrgOutcome::Created(org_id) => {
            info!(org = name, org_id, "Created organization");
            Ok(org_id)
        }
        CreateOrgOutcome::AlreadyExists => {
            let existing = client
                .org_by_name(name)
                .await
                .map_err(|source| ProvisionError::Org {
                    name: name.to_string(),
                    source,
                })?;
            info!(org = name, org_id = existing.id, "Organization already exists");
            Ok(existing.id)
        }
    }
}
