//! Flow wiring shared by the binary and the end-to-end tests.
//!
//! A [`Session`] resolves the admin credential, optionally opens the
//! port-forward tunnel and passes the connectivity gate. Both flows run on an
//! open session; dropping it stops the tunnel.

use std::path::Path;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{AppConfig, ConfigError};
use crate::connectivity::{
    ConnectivityError, PortForward, check_connectivity, tunnel_port_mismatch,
};
use crate::credentials::{SecretReader, resolve_admin_credential};
use crate::dashboards::{DashboardImporter, ImportSummary};
use crate::grafana::GrafanaClient;
use crate::provision::{BootstrapOutcome, bootstrap_tenants};
use crate::report::ReportError;

/// Errors that abort a flow.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),
    #[error(transparent)]
    Report(#[from] ReportError),
}

/// An authenticated, reachable Grafana plus the tunnel keeping it reachable.
pub struct Session {
    client: GrafanaClient,
    // Dropped after the client; kills the port-forward child.
    _tunnel: Option<PortForward>,
}

impl Session {
    /// Resolve credentials, start the tunnel if enabled, and check connectivity.
    pub async fn open(config: &AppConfig, secrets: &dyn SecretReader) -> Result<Self, RunError> {
        let base = config.grafana_base()?;
        let credential = resolve_admin_credential(config, secrets).await;

        let tunnel = if config.port_forward.enabled {
            if let Some(port) = tunnel_port_mismatch(&base, &config.port_forward) {
                warn!(
                    grafana_port = port,
                    local_port = config.port_forward.local_port,
                    "GRAFANA_URL does not point at the port-forward's local port"
                );
            }
            Some(PortForward::start(&config.kubectl, &config.port_forward).await?)
        } else {
            None
        };

        let client = GrafanaClient::new(base, credential);
        check_connectivity(&client).await?;

        Ok(Self {
            client,
            _tunnel: tunnel,
        })
    }

    /// Provision every configured tenant and write the result record to `output`.
    pub async fn run_bootstrap(
        &self,
        config: &AppConfig,
        output: &Path,
    ) -> Result<BootstrapOutcome, RunError> {
        info!(tenants = config.tenants.len(), "Starting tenant bootstrap");
        let outcome = bootstrap_tenants(
            &self.client,
            &config.tenants,
            &config.datasource_definitions(),
        )
        .await;

        outcome.results.write_to(output)?;
        info!(
            provisioned = outcome.results.len(),
            skipped = outcome.skipped.len(),
            output = %output.display(),
            "Tenant bootstrap finished"
        );
        Ok(outcome)
    }

    /// Import every configured catalog dashboard.
    pub async fn run_dashboard_import(&self, config: &AppConfig) -> ImportSummary {
        info!(dashboards = config.dashboards.len(), "Starting dashboard import");
        let importer = DashboardImporter::new(
            &self.client,
            config.datasource_definitions(),
            config.dashboard_org_id,
        );
        let summary = importer.import_all(&config.dashboards).await;
        info!(
            succeeded = summary.succeeded(),
            failed = summary.failed(),
            "Dashboard import finished"
        );
        summary
    }
}
