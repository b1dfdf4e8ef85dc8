//! # Error Handling
//!
//! Errors raised while talking to the Grafana API and while provisioning a
//! tenant. Provisioning errors are soft: the caller logs them and skips the
//! tenant, so they carry enough context to read well in a single log line.

use reqwest::StatusCode;
use thiserror::Error;

/// Maximum number of characters of an upstream body kept in error messages.
const BODY_SNIPPET_CHARS: usize = 200;

/// Failure of a single Grafana API call.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request to {endpoint} failed: {source}")]
    Transport {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{endpoint} returned {status}: {body}")]
    UnexpectedStatus {
        endpoint: String,
        status: StatusCode,
        body: String,
    },
    #[error("failed to decode response from {endpoint}: {source}")]
    Decode {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("cannot build URL for {path}: {source}")]
    Url {
        path: String,
        #[source]
        source: url::ParseError,
    },
}

impl ApiError {
    /// Create an unexpected-status error, truncating the upstream body.
    pub fn unexpected_status(endpoint: impl Into<String>, status: StatusCode, body: &str) -> Self {
        Self::UnexpectedStatus {
            endpoint: endpoint.into(),
            status,
            body: body_snippet(body),
        }
    }

    /// HTTP status returned by Grafana, if the call got that far.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::UnexpectedStatus { status, .. } => Some(*status),
            ApiError::Transport { source, .. } | ApiError::Decode { source, .. } => {
                source.status()
            }
            ApiError::Url { .. } => None,
        }
    }

    /// True when the request never reached the server.
    pub fn is_connect(&self) -> bool {
        matches!(self, ApiError::Transport { source, .. } if source.is_connect())
    }
}

/// A provisioning step that failed for one tenant.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("failed to ensure organization '{name}': {source}")]
    Org {
        name: String,
        #[source]
        source: ApiError,
    },
    #[error("failed to ensure datasource '{name}' in org {org_id}: {source}")]
    Datasource {
        name: String,
        org_id: i64,
        #[source]
        source: ApiError,
    },
    #[error("failed to ensure service account '{name}' in org {org_id}: {source}")]
    ServiceAccount {
        name: String,
        org_id: i64,
        #[source]
        source: ApiError,
    },
    #[error("failed to create token for service account '{name}': {source}")]
    Token {
        name: String,
        #[source]
        source: ApiError,
    },
}

fn body_snippet(body: &str) -> String {
    let body = body.trim();
    if body.chars().count() > BODY_SNIPPET_CHARS {
        let truncated: String = body.chars().take(BODY_SNIPPET_CHARS).collect();
        format!("{}...", truncated)
    } else {
        body.to_string()
    }
}
