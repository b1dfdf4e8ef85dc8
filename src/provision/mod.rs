//! Per-tenant provisioning.
//!
//! Each tenant gets an organization, the configured datasources and a
//! service account with a fresh token. A failure at any step is logged and
//! the tenant is left out of the results; the remaining tenants still run.

pub mod datasource;
pub mod org;
pub mod service_account;

use tracing::{error, info};

use crate::config::{DatasourceDefinition, TenantDefinition};
use crate::error::ProvisionError;
use crate::grafana::GrafanaClient;
use crate::report::{ProvisioningResults, TenantResult};

pub use datasource::{DatasourceAction, ensure_datasource};
pub use org::ensure_org;
pub use service_account::{IssuedToken, ensure_service_account_and_token, next_token_name};

/// Results of a bootstrap run plus the tenants that were skipped.
#[derive(Debug, Default)]
pub struct BootstrapOutcome {
    pub results: ProvisioningResults,
    pub skipped: Vec<(String, ProvisionError)>,
}

/// Run every provisioning step for one tenant.
pub async fn provision_tenant(
    client: &GrafanaClient,
    tenant: &TenantDefinition,
    datasources: &[DatasourceDefinition],
) -> Result<TenantResult, ProvisionError> {
    let org_id = ensure_org(client, &tenant.name).await?;

    for definition in datasources {
        ensure_datasource(client, org_id, definition, &tenant.tenant_id).await?;
    }

    let token = ensure_service_account_and_token(client, org_id, &tenant.service_account).await?;

    Ok(TenantResult {
        org_id,
        tenant_id: tenant.tenant_id.clone(),
        service_account: tenant.service_account.clone(),
        token: token.key,
    })
}

/// Provision all tenants in order, collecting the ones that succeed.
pub async fn bootstrap_tenants(
    client: &GrafanaClient,
    tenants: &[TenantDefinition],
    datasources: &[DatasourceDefinition],
) -> BootstrapOutcome {
    let mut outcome = BootstrapOutcome::default();

    for tenant in tenants {
        match provision_tenant(client, tenant, datasources).await {
            Ok(result) => {
                info!(tenant = %tenant.name, org_id = result.org_id, "Tenant provisioned");
                outcome.results.insert(tenant.name.clone(), result);
            }
            Err(err) => {
                error!(tenant = %tenant.name, error = %err, "Skipping tenant");
                outcome.skipped.push((tenant.name.clone(), err));
            }
        }
    }

    outcome
}
