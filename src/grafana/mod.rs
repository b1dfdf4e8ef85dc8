//! Thin async client over the Grafana HTTP API.
//!
//! Every call authenticates with the admin basic-auth credential. Calls that
//! act inside an organization carry the `X-Grafana-Org-Id` header. Status
//! handling that is part of the provisioning policy (conflict on org create,
//! unchecked datasource writes) is left to the callers in [`crate::provision`].

pub mod models;

use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::{DeserializeOwned, IgnoredAny};
use tracing::debug;
use url::Url;

use crate::credentials::AdminCredential;
use crate::error::ApiError;
use models::{
    CreateOrgRequest, CreateOrgResponse, CreateServiceAccountRequest, CreateTokenRequest,
    CreatedToken, DashboardImportRequest, DashboardImportResponse, Datasource, DatasourcePayload,
    ORG_ID_HEADER, OrgId, Organization, ServiceAccount, ServiceAccountSearch,
};

/// Result of `POST /api/orgs`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOrgOutcome {
    Created(OrgId),
    AlreadyExists,
}

/// Grafana API client bound to one instance and one admin credential.
#[derive(Debug, Clone)]
pub struct GrafanaClient {
    http: reqwest::Client,
    base: Url,
    credential: AdminCredential,
}

impl GrafanaClient {
    /// Create a client for the Grafana instance at `base`.
    pub fn new(mut base: Url, credential: AdminCredential) -> Self {
        // Keep any sub-path (e.g. `/grafana`) when appending API segments.
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        Self {
            http: reqwest::Client::new(),
            base,
            credential,
        }
    }

    /// Base URL of the Grafana instance.
    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// `GET /api/health`; returns the status of a reachable server.
    pub async fn health(&self) -> Result<StatusCode, ApiError> {
        let url = self.endpoint(&["api", "health"])?;
        let response = self
            .send(self.http.get(url), "GET /api/health")
            .await?;
        Ok(response.status())
    }

    /// `POST /api/orgs`. A 409 means an org with that name already exists.
    pub async fn create_org(&self, name: &str) -> Result<CreateOrgOutcome, ApiError> {
        let endpoint = "POST /api/orgs";
        let url = self.endpoint(&["api", "orgs"])?;
        let response = self
            .send(
                self.request(Method::POST, url, None)
                    .json(&CreateOrgRequest { name }),
                endpoint,
            )
            .await?;

        match response.status() {
            StatusCode::CONFLICT => Ok(CreateOrgOutcome::AlreadyExists),
            StatusCode::OK => {
                let body: CreateOrgResponse = decode(response, endpoint).await?;
                Ok(CreateOrgOutcome::Created(body.org_id))
            }
            status => Err(error_from(response, endpoint, status).await),
        }
    }

    /// `GET /api/orgs/name/{name}`.
    pub async fn org_by_name(&self, name: &str) -> Result<Organization, ApiError> {
        let url = self.endpoint(&["api", "orgs", "name", name])?;
        self.expect_json(self.request(Method::GET, url, None), "GET /api/orgs/name")
            .await
    }

    /// `GET /api/datasources/name/{name}`; any non-200 answer counts as absent.
    pub async fn datasource_by_name(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Option<Datasource>, ApiError> {
        let endpoint = "GET /api/datasources/name";
        let url = self.endpoint(&["api", "datasources", "name", name])?;
        let response = self
            .send(self.request(Method::GET, url, Some(org_id)), endpoint)
            .await?;

        if response.status() != StatusCode::OK {
            debug!(org_id, datasource = name, status = %response.status(), "Datasource lookup found nothing");
            return Ok(None);
        }
        decode(response, endpoint).await.map(Some)
    }

    /// `POST /api/datasources`; the status is returned unchecked.
    pub async fn create_datasource(
        &self,
        org_id: OrgId,
        payload: &DatasourcePayload,
    ) -> Result<StatusCode, ApiError> {
        let url = self.endpoint(&["api", "datasources"])?;
        let response = self
            .send(
                self.request(Method::POST, url, Some(org_id)).json(payload),
                "POST /api/datasources",
            )
            .await?;
        Ok(response.status())
    }

    /// `PUT /api/datasources/{id}`; the status is returned unchecked.
    pub async fn update_datasource(
        &self,
        org_id: OrgId,
        datasource_id: i64,
        payload: &DatasourcePayload,
    ) -> Result<StatusCode, ApiError> {
        let id = datasource_id.to_string();
        let url = self.endpoint(&["api", "datasources", &id])?;
        let response = self
            .send(
                self.request(Method::PUT, url, Some(org_id)).json(payload),
                "PUT /api/datasources",
            )
            .await?;
        Ok(response.status())
    }

    /// `GET /api/serviceaccounts/search?query={name}`.
    pub async fn search_service_accounts(
        &self,
        org_id: OrgId,
        name: &str,
    ) -> Result<Vec<ServiceAccount>, ApiError> {
        let mut url = self.endpoint(&["api", "serviceaccounts", "search"])?;
        url.query_pairs_mut().append_pair("query", name);
        let search: ServiceAccountSearch = self
            .expect_json(
                self.request(Method::GET, url, Some(org_id)),
                "GET /api/serviceaccounts/search",
            )
            .await?;
        Ok(search.service_accounts)
    }

    /// `POST /api/serviceaccounts`.
    pub async fn create_service_account(
        &self,
        org_id: OrgId,
        name: &str,
        role: &str,
    ) -> Result<ServiceAccount, ApiError> {
        let url = self.endpoint(&["api", "serviceaccounts"])?;
        self.expect_json(
            self.request(Method::POST, url, Some(org_id))
                .json(&CreateServiceAccountRequest { name, role }),
            "POST /api/serviceaccounts",
        )
        .await
    }

    /// `GET /api/serviceaccounts/{id}/tokens`; returns how many tokens exist.
    pub async fn count_tokens(
        &self,
        org_id: OrgId,
        service_account_id: i64,
    ) -> Result<usize, ApiError> {
        let id = service_account_id.to_string();
        let url = self.endpoint(&["api", "serviceaccounts", &id, "tokens"])?;
        let tokens: Vec<IgnoredAny> = self
            .expect_json(
                self.request(Method::GET, url, Some(org_id)),
                "GET /api/serviceaccounts/tokens",
            )
            .await?;
        Ok(tokens.len())
    }

    /// `POST /api/serviceaccounts/{id}/tokens`.
    pub async fn create_token(
        &self,
        org_id: OrgId,
        service_account_id: i64,
        token_name: &str,
    ) -> Result<CreatedToken, ApiError> {
        let id = service_account_id.to_string();
        let url = self.endpoint(&["api", "serviceaccounts", &id, "tokens"])?;
        self.expect_json(
            self.request(Method::POST, url, Some(org_id))
                .json(&CreateTokenRequest { name: token_name }),
            "POST /api/serviceaccounts/tokens",
        )
        .await
    }

    /// `POST /api/dashboards/import`, optionally scoped to an organization.
    pub async fn import_dashboard(
        &self,
        org_id: Option<OrgId>,
        request: &DashboardImportRequest,
    ) -> Result<DashboardImportResponse, ApiError> {
        let url = self.endpoint(&["api", "dashboards", "import"])?;
        self.expect_json(
            self.request(Method::POST, url, org_id).json(request),
            "POST /api/dashboards/import",
        )
        .await
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| ApiError::Url {
                path: segments.join("/"),
                source: url::ParseError::RelativeUrlWithCannotBeABaseBase,
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn request(&self, method: Method, url: Url, org_id: Option<OrgId>) -> RequestBuilder {
        let builder = self
            .http
            .request(method, url)
            .basic_auth(self.credential.user(), Some(self.credential.password()));
        match org_id {
            Some(id) => builder.header(ORG_ID_HEADER, id.to_string()),
            None => builder,
        }
    }

    async fn send(&self, request: RequestBuilder, endpoint: &str) -> Result<Response, ApiError> {
        request.send().await.map_err(|source| ApiError::Transport {
            endpoint: endpoint.to_string(),
            source,
        })
    }

    async fn expect_json<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        endpoint: &str,
    ) -> Result<T, ApiError> {
        let response = self.send(request, endpoint).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(error_from(response, endpoint, status).await);
        }
        decode(response, endpoint).await
    }
}

async fn decode<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T, ApiError> {
    response.json::<T>().await.map_err(|source| ApiError::Decode {
        endpoint: endpoint.to_string(),
        source,
    })
}

async fn error_from(response: Response, endpoint: &str, status: StatusCode) -> ApiError {
    let body = response.text().await.unwrap_or_default();
    ApiError::unexpected_status(endpoint, status, &body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::AdminCredential;

    fn client(base: &str) -> GrafanaClient {
        GrafanaClient::new(
            Url::parse(base).unwrap(),
            AdminCredential::fallback("admin"),
        )
    }

    #[test]
    fn endpoint_keeps_sub_path() {
        let client = client("http://example.com/grafana");
        let url = client.endpoint(&["api", "orgs"]).unwrap();
        assert_eq!(url.as_str(), "http://example.com/grafana/api/orgs");
    }

    #[test]
    fn endpoint_encodes_names() {
        let client = client("http://localhost:3000");
        let url = client.endpoint(&["api", "orgs", "name", "team a/b"]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:3000/api/orgs/name/team%20a%2Fb");
    }
}
