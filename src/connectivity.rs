//! Connectivity gate and optional `kubectl port-forward` tunnel.
//!
//! Nothing mutating is sent to Grafana until [`check_connectivity`] has seen
//! the server answer. When the tunnel is requested, [`PortForward`] owns the
//! child process and kills it when dropped.

use std::{
    io::{self, Read},
    process::{Child, Command, ExitStatus, Stdio},
    time::Duration,
};

use thiserror::Error;
use tokio::{net::TcpStream, time::Instant};
use tracing::{debug, info, warn};

use crate::config::PortForwardConfig;
use crate::error::ApiError;
use crate::grafana::GrafanaClient;
use url::Url;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// Errors that stop a run before any provisioning call is made.
#[derive(Debug, Error)]
pub enum ConnectivityError {
    #[error("could not connect to Grafana at {url}: {source}")]
    Unreachable {
        url: String,
        #[source]
        source: ApiError,
    },
    #[error("failed to start {program} port-forward: {source}")]
    PortForwardSpawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("local port {port} is already in use; port-forward cannot bind it")]
    PortForwardPortInUse { port: u16 },
    #[error("port-forward exited early with {status}: {stderr}")]
    PortForwardExited { status: ExitStatus, stderr: String },
    #[error("port-forward did not accept connections on 127.0.0.1:{port} within {timeout_ms} ms")]
    PortForwardTimeout { port: u16, timeout_ms: u64 },
}

impl ConnectivityError {
    /// What the operator should do about it.
    pub fn remediation_hint(&self) -> &'static str {
        match self {
            ConnectivityError::Unreachable { .. } => {
                "Start a port-forward to Grafana first (or re-run with --port-forward), then retry."
            }
            ConnectivityError::PortForwardSpawn { .. } => {
                "Make sure kubectl is installed and on PATH (or set OBS_KUBECTL)."
            }
            ConnectivityError::PortForwardPortInUse { .. } => {
                "Stop whatever holds the local port or set OBS_PORT_FORWARD_LOCAL_PORT to a free one."
            }
            ConnectivityError::PortForwardExited { .. }
            | ConnectivityError::PortForwardTimeout { .. } => {
                "Check the kube context, OBS_PORT_FORWARD_NAMESPACE and OBS_PORT_FORWARD_TARGET, and that the local port is free."
            }
        }
    }
}

/// Send `GET /api/health`; only a failure to reach the server is fatal.
pub async fn check_connectivity(client: &GrafanaClient) -> Result<(), ConnectivityError> {
    match client.health().await {
        Ok(status) if status.is_success() => {
            info!(url = %client.base_url(), "Grafana is reachable");
            Ok(())
        }
        Ok(status) => {
            warn!(url = %client.base_url(), %status, "Grafana health check returned a non-success status; continuing");
            Ok(())
        }
        Err(source) => Err(ConnectivityError::Unreachable {
            url: client.base_url().to_string(),
            source,
        }),
    }
}

/// A running `kubectl port-forward`, stopped on drop.
pub struct PortForward {
    child: Child,
    local_port: u16,
}

impl PortForward {
    /// Spawn the tunnel and wait until the local port accepts connections.
    pub async fn start(kubectl: &str, config: &PortForwardConfig) -> Result<Self, ConnectivityError> {
        info!(
            namespace = %config.namespace,
            target = %config.target,
            local_port = config.local_port,
            remote_port = config.remote_port,
            "Starting port-forward"
        );

        // A listener that is already there would make the readiness check pass
        // without kubectl ever binding.
        if port_accepts(config.local_port).await {
            return Err(ConnectivityError::PortForwardPortInUse {
                port: config.local_port,
            });
        }

        let child = Command::new(kubectl)
            .args([
                "port-forward",
                "-n",
                &config.namespace,
                &config.target,
                &format!("{}:{}", config.local_port, config.remote_port),
            ])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ConnectivityError::PortForwardSpawn {
                program: kubectl.to_string(),
                source,
            })?;

        let mut tunnel = Self {
            child,
            local_port: config.local_port,
        };
        tunnel.wait_ready(config.ready_timeout_ms).await?;
        Ok(tunnel)
    }

    async fn wait_ready(&mut self, timeout_ms: u64) -> Result<(), ConnectivityError> {
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            if let Ok(Some(status)) = self.child.try_wait() {
                let mut stderr = String::new();
                if let Some(mut pipe) = self.child.stderr.take() {
                    let _ = pipe.read_to_string(&mut stderr);
                }
                return Err(ConnectivityError::PortForwardExited {
                    status,
                    stderr: stderr.trim().to_string(),
                });
            }

            if port_accepts(self.local_port).await {
                info!(local_port = self.local_port, "Port-forward is ready");
                return Ok(());
            }

            if Instant::now() >= deadline {
                return Err(ConnectivityError::PortForwardTimeout {
                    port: self.local_port,
                    timeout_ms,
                });
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }
    }
}

async fn port_accepts(port: u16) -> bool {
    TcpStream::connect(("127.0.0.1", port)).await.is_ok()
}

/// The Grafana port when it differs from the tunnel's local port.
///
/// The health check goes to `GRAFANA_URL`, so a mismatch means the gate is not
/// probing the tunnel at all.
pub fn tunnel_port_mismatch(grafana: &Url, config: &PortForwardConfig) -> Option<u16> {
    let port = grafana.port_or_known_default()?;
    (port != config.local_port).then_some(port)
}

impl Drop for PortForward {
    fn drop(&mut self) {
        if let Ok(None) = self.child.try_wait() {
            info!(local_port = self.local_port, "Stopping port-forward");
            if let Err(err) = self.child.kill() {
                warn!(error = %err, "Failed to stop port-forward");
            }
        }
        let _ = self.child.wait();
        debug!(local_port = self.local_port, "Port-forward process reaped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AdminCredential;

    #[tokio::test]
    async fn unreachable_server_is_an_error() {
        let port = portpicker::pick_unused_port().expect("free port");
        let client = GrafanaClient::new(
            Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            AdminCredential::fallback("admin"),
        );
        let err = check_connectivity(&client).await.unwrap_err();
        assert!(matches!(err, ConnectivityError::Unreachable { .. }));
        assert!(err.remediation_hint().contains("--port-forward"));
    }

    #[test]
    fn grafana_port_must_match_tunnel() {
        let config = PortForwardConfig::default();
        let local = Url::parse("http://localhost:3000").unwrap();
        assert_eq!(tunnel_port_mismatch(&local, &config), None);

        let other = Url::parse("http://localhost:8080/grafana").unwrap();
        assert_eq!(tunnel_port_mismatch(&other, &config), Some(8080));

        let default_port = Url::parse("http://grafana.local").unwrap();
        assert_eq!(tunnel_port_mismatch(&default_port, &config), Some(80));
    }

    #[tokio::test]
    async fn missing_kubectl_fails_to_spawn() {
        let config = PortForwardConfig::default();
        let err = PortForward::start("/nonexistent/kubectl-for-tests", &config)
            .await
            .err()
            .expect("spawn should fail");
        assert!(matches!(err, ConnectivityError::PortForwardSpawn { .. }));
    }
}
