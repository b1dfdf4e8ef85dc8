use std::sync::atomic::{AtomicI64, Ordering};

use chrono::Utc;
use tracing::{info, warn};

use crate::error::ProvisionError;
use crate::grafana::{GrafanaClient, models::OrgId};

/// Role granted to bootstrap service accounts.
pub const SERVICE_ACCOUNT_ROLE: &str = "Editor";

const TOKEN_NAME_PREFIX: &str = "bootstrap-token";

static LAST_TOKEN_MILLIS: AtomicI64 = AtomicI64::new(0);

/// A freshly minted service-account token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub service_account_id: i64,
    pub name: String,
    pub key: String,
}

/// Token name derived from the current time in milliseconds.
///
/// Strictly increasing within the process, so two calls never share a name.
pub fn next_token_name() -> String {
    let now = Utc::now().timestamp_millis();
    let previous = LAST_TOKEN_MILLIS
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or_else(|last| last);
    format!("{TOKEN_NAME_PREFIX}-{}", now.max(previous + 1))
}

/// Ensure the service account exists in `org_id` and mint a new token for it.
///
/// A token is issued on every call. Existing tokens are listed for the log
/// but never deleted, so they accumulate across runs.
pub async fn ensure_service_account_and_token(
    client: &GrafanaClient,
    org_id: OrgId,
    name: &str,
) -> Result<IssuedToken, ProvisionError> {
    let existing = match client.search_service_accounts(org_id, name).await {
        Ok(accounts) => accounts.into_iter().find(|account| account.name == name),
        Err(err) => {
            warn!(org_id, service_account = name, error = %err, "Service account search failed; creating");
            None
        }
    };

    let service_account_id = match existing {
        Some(account) => {
            info!(org_id, service_account = name, id = account.id, "Found existing service account");
            account.id
        }
        None => {
            let created = client
                .create_service_account(org_id, name, SERVICE_ACCOUNT_ROLE)
                .await
                .map_err(|source| ProvisionError::ServiceAccount {
                    name: name.to_string(),
                    org_id,
                    source,
                })?;
            info!(org_id, service_account = name, id = created.id, "Created service account");
            created.id
        }
    };

    match client.count_tokens(org_id, service_account_id).await {
        Ok(existing_tokens) => info!(
            org_id,
            service_account = name,
            existing_tokens,
            "Existing tokens are kept"
        ),
        Err(err) => warn!(org_id, service_account = name, error = %err, "Could not list existing tokens"),
    }

    let token_name = next_token_name();
    let token = client
        .create_token(org_id, service_account_id, &token_name)
        .await
        .map_err(|source| ProvisionError::Token {
            name: name.to_string(),
            source,
        })?;
    info!(org_id, service_account = name, token = %token.name, "Generated new access token");

    Ok(IssuedToken {
        service_account_id,
        name: token.name,
        key: token.key,
    })
}
