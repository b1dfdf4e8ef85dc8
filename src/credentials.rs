//! Admin credential resolution.
//!
//! The Grafana admin password normally lives in a Kubernetes secret. It is
//! read through `kubectl` and base64-decoded; when that fails for any reason
//! the well-known default password is used instead.

use std::{fmt, io, process::ExitStatus, string::FromUtf8Error};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use thiserror::Error;
use tokio::process::Command;
use tracing::{info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::{AppConfig, SecretRefConfig};

/// Password used when the cluster secret cannot be read.
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin";

/// Where the admin password came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    Configured,
    ClusterSecret,
    Fallback,
}

/// Grafana admin basic-auth credential, wiped from memory on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct AdminCredential {
    user: String,
    password: String,
    #[zeroize(skip)]
    source: CredentialSource,
}

impl AdminCredential {
    pub fn new(user: impl Into<String>, password: impl Into<String>, source: CredentialSource) -> Self {
        Self {
            user: user.into(),
            password: password.into(),
            source,
        }
    }

    /// Credential using [`DEFAULT_ADMIN_PASSWORD`].
    pub fn fallback(user: impl Into<String>) -> Self {
        Self::new(user, DEFAULT_ADMIN_PASSWORD, CredentialSource::Fallback)
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn password(&self) -> &str {
        &self.password
    }

    pub fn source(&self) -> CredentialSource {
        self.source
    }
}

impl fmt::Debug for AdminCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdminCredential")
            .field("user", &self.user)
            .field("password", &"[REDACTED]")
            .field("source", &self.source)
            .finish()
    }
}

/// Errors reading the admin password from the cluster.
#[derive(Debug, Error)]
pub enum SecretError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("{program} exited with {status}: {stderr}")]
    Exit {
        program: String,
        status: ExitStatus,
        stderr: String,
    },
    #[error("secret field is empty")]
    Empty,
    #[error("secret field is not valid base64: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("secret field is not valid UTF-8: {0}")]
    Utf8(#[from] FromUtf8Error),
}

/// Source of the raw admin password.
#[async_trait]
pub trait SecretReader: Send + Sync {
    /// Read and decode the referenced secret field.
    async fn read(&self, secret: &SecretRefConfig) -> Result<String, SecretError>;
}

/// Reads secrets with `kubectl get secret -o jsonpath=...`.
pub struct KubectlSecretReader {
    program: String,
}

impl KubectlSecretReader {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn jsonpath(key: &str) -> String {
        // Dots inside a key must be escaped in kubectl jsonpath.
        format!("jsonpath={{.data.{}}}", key.replace('.', "\\."))
    }
}

#[async_trait]
impl SecretReader for KubectlSecretReader {
    async fn read(&self, secret: &SecretRefConfig) -> Result<String, SecretError> {
        let output = Command::new(&self.program)
            .args([
                "get",
                "secret",
                "-n",
                &secret.namespace,
                &secret.name,
                "-o",
                &Self::jsonpath(&secret.key),
            ])
            .output()
            .await
            .map_err(|source| SecretError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(SecretError::Exit {
                program: self.program.clone(),
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        decode_secret_field(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Decode a base64 secret field as printed by kubectl.
pub fn decode_secret_field(raw: &str) -> Result<String, SecretError> {
    let encoded = raw.trim().trim_matches('\'');
    if encoded.is_empty() {
        return Err(SecretError::Empty);
    }
    let bytes = general_purpose::STANDARD.decode(encoded)?;
    let decoded = String::from_utf8(bytes)?.trim().to_string();
    if decoded.is_empty() {
        return Err(SecretError::Empty);
    }
    Ok(decoded)
}

/// Resolve the admin credential: explicit config, then cluster secret, then fallback.
pub async fn resolve_admin_credential(
    config: &AppConfig,
    reader: &dyn SecretReader,
) -> AdminCredential {
    if let Some(password) = &config.admin_password {
        info!("Using admin password from configuration");
        return AdminCredential::new(&config.admin_user, password, CredentialSource::Configured);
    }

    match reader.read(&config.secret).await {
        Ok(password) => {
            info!(
                namespace = %config.secret.namespace,
                secret = %config.secret.name,
                "Loaded admin password from cluster secret"
            );
            AdminCredential::new(&config.admin_user, password, CredentialSource::ClusterSecret)
        }
        Err(err) => {
            warn!(
                error = %err,
                namespace = %config.secret.namespace,
                secret = %config.secret.name,
                "Could not read admin password from cluster secret; using default"
            );
            AdminCredential::fallback(&config.admin_user)
        }
    }
}
