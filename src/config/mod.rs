//! Configuration loading for the bootstrap tool.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `OBS_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, collections::BTreeSet, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::grafana::models::DatasourceKind;

const ENV_PREFIX: &str = "OBS_";

/// Application configuration derived from `OBS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_grafana_url")]
    pub grafana_url: String,
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    /// Explicit admin password; skips the cluster secret lookup when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
    #[serde(default = "default_kubectl")]
    pub kubectl: String,
    #[serde(default)]
    pub secret: SecretRefConfig,
    #[serde(default)]
    pub port_forward: PortForwardConfig,
    #[serde(default = "default_mimir_url")]
    pub mimir_url: String,
    #[serde(default = "default_loki_url")]
    pub loki_url: String,
    #[serde(default = "default_tempo_url")]
    pub tempo_url: String,
    #[serde(default = "default_tenants")]
    pub tenants: Vec<TenantDefinition>,
    #[serde(default = "default_dashboards")]
    pub dashboards: Vec<DashboardSource>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_org_id: Option<i64>,
    #[serde(default = "default_output_file")]
    pub output_file: PathBuf,
}

/// Location of the Grafana admin password inside the cluster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SecretRefConfig {
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_secret_name")]
    pub name: String,
    #[serde(default = "default_secret_key")]
    pub key: String,
}

impl Default for SecretRefConfig {
    fn default() -> Self {
        Self {
            namespace: default_namespace(),
            name: default_secret_name(),
            key: default_secret_key(),
        }
    }
}

/// Settings for the optional `kubectl port-forward` tunnel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct PortForwardConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_port_forward_target")]
    pub target: String,
    #[serde(default = "default_port_forward_local_port")]
    pub local_port: u16,
    #[serde(default = "default_port_forward_remote_port")]
    pub remote_port: u16,
    #[serde(default = "default_port_forward_ready_timeout_ms")]
    pub ready_timeout_ms: u64,
}

impl Default for PortForwardConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            namespace: default_namespace(),
            target: default_port_forward_target(),
            local_port: default_port_forward_local_port(),
            remote_port: default_port_forward_remote_port(),
            ready_timeout_ms: default_port_forward_ready_timeout_ms(),
        }
    }
}

/// A tenant to bootstrap: one organization, its datasources and a service account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDefinition {
    pub name: String,
    pub tenant_id: String,
    pub service_account: String,
}

impl TenantDefinition {
    /// Tenant whose id matches its name and whose service account is `sa-<name>`.
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            tenant_id: name.to_string(),
            service_account: format!("sa-{name}"),
        }
    }

    /// Parses `name[:tenant_id[:service_account]]`.
    pub fn parse(entry: &str) -> Option<Self> {
        let mut parts = entry.split(':').map(str::trim);
        let name = parts.next().filter(|s| !s.is_empty())?;
        let mut tenant = Self::named(name);
        if let Some(tenant_id) = parts.next() {
            if tenant_id.is_empty() {
                return None;
            }
            tenant.tenant_id = tenant_id.to_string();
        }
        if let Some(service_account) = parts.next() {
            if service_account.is_empty() {
                return None;
            }
            tenant.service_account = service_account.to_string();
        }
        if parts.next().is_some() {
            return None;
        }
        Some(tenant)
    }
}

/// A dashboard in the remote catalog, addressed by display name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSource {
    pub name: String,
    pub url: String,
}

impl DashboardSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Parses `Display Name=https://...`, splitting on the first `=`.
    pub fn parse(entry: &str) -> Option<Self> {
        let (name, url) = entry.split_once('=')?;
        let (name, url) = (name.trim(), url.trim());
        if name.is_empty() || url.is_empty() {
            return None;
        }
        Some(Self::new(name, url))
    }
}

/// A datasource provisioned into every tenant organization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasourceDefinition {
    pub name: String,
    pub kind: DatasourceKind,
    pub url: String,
    pub is_default: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            grafana_url: default_grafana_url(),
            admin_user: default_admin_user(),
            admin_password: None,
            kubectl: default_kubectl(),
            secret: SecretRefConfig::default(),
            port_forward: PortForwardConfig::default(),
            mimir_url: default_mimir_url(),
            loki_url: default_loki_url(),
            tempo_url: default_tempo_url(),
            tenants: default_tenants(),
            dashboards: default_dashboards(),
            dashboard_org_id: None,
            output_file: default_output_file(),
        }
    }
}

impl AppConfig {
    /// Returns the Grafana base URL.
    pub fn grafana_base(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.grafana_url).map_err(|source| ConfigError::InvalidGrafanaUrl {
            value: self.grafana_url.clone(),
            source,
        })
    }

    /// Datasources created in each tenant organization, in provisioning order.
    pub fn datasource_definitions(&self) -> Vec<DatasourceDefinition> {
        vec![
            DatasourceDefinition {
                name: "Mimir".to_string(),
                kind: DatasourceKind::Prometheus,
                url: self.mimir_url.clone(),
                is_default: true,
            },
            DatasourceDefinition {
                name: "Loki".to_string(),
                kind: DatasourceKind::Loki,
                url: self.loki_url.clone(),
                is_default: false,
            },
            DatasourceDefinition {
                name: "Tempo".to_string(),
                kind: DatasourceKind::Tempo,
                url: self.tempo_url.clone(),
                is_default: false,
            },
        ]
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.admin_password.is_some() {
            config.admin_password = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.grafana_base()?;

        if !matches!(self.log_format.as_str(), "json" | "pretty" | "compact") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        for (field, value) in [
            ("MIMIR_URL", &self.mimir_url),
            ("LOKI_URL", &self.loki_url),
            ("TEMPO_URL", &self.tempo_url),
        ] {
            if let Err(source) = Url::parse(value) {
                return Err(ConfigError::InvalidDatasourceUrl {
                    field,
                    value: value.clone(),
                    source,
                });
            }
        }

        if self.tenants.is_empty() {
            return Err(ConfigError::NoTenants);
        }
        let mut seen = BTreeSet::new();
        for tenant in &self.tenants {
            if !seen.insert(tenant.name.as_str()) {
                return Err(ConfigError::DuplicateTenant {
                    name: tenant.name.clone(),
                });
            }
        }

        for dashboard in &self.dashboards {
            if let Err(source) = Url::parse(&dashboard.url) {
                return Err(ConfigError::InvalidDashboardUrl {
                    name: dashboard.name.clone(),
                    value: dashboard.url.clone(),
                    source,
                });
            }
        }

        self.port_forward.validate()?;

        Ok(())
    }
}

impl PortForwardConfig {
    /// Validate tunnel ports.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_port == 0 {
            return Err(ConfigError::InvalidPort {
                field: "PORT_FORWARD_LOCAL_PORT",
            });
        }
        if self.remote_port == 0 {
            return Err(ConfigError::InvalidPort {
                field: "PORT_FORWARD_REMOTE_PORT",
            });
        }
        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_grafana_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_admin_user() -> String {
    "admin".to_string()
}

fn default_kubectl() -> String {
    "kubectl".to_string()
}

fn default_namespace() -> String {
    "observability-prd".to_string()
}

fn default_secret_name() -> String {
    "grafana-admin-creds".to_string()
}

fn default_secret_key() -> String {
    "admin-password".to_string()
}

fn default_port_forward_target() -> String {
    "svc/grafana".to_string()
}

fn default_port_forward_local_port() -> u16 {
    3000
}

fn default_port_forward_remote_port() -> u16 {
    80
}

fn default_port_forward_ready_timeout_ms() -> u64 {
    10_000
}

fn default_mimir_url() -> String {
    "http://mimir-nginx.observability-prd.svc:80/prometheus".to_string()
}

fn default_loki_url() -> String {
    "http://loki-gateway.observability-prd.svc:80".to_string()
}

fn default_tempo_url() -> String {
    "http://tempo.observability-prd.svc:3100".to_string()
}

fn default_tenants() -> Vec<TenantDefinition> {
    ["platform-k8s", "platform-obs", "devteam-1"]
        .into_iter()
        .map(TenantDefinition::named)
        .collect()
}

fn default_dashboards() -> Vec<DashboardSource> {
    vec![
        DashboardSource::new(
            "Node Exporter Full",
            "https://grafana.com/api/dashboards/1860/revisions/37/download",
        ),
        DashboardSource::new(
            "Kubernetes / Views / Global",
            "https://grafana.com/api/dashboards/15757/revisions/42/download",
        ),
        DashboardSource::new(
            "Loki Kubernetes Logs",
            "https://grafana.com/api/dashboards/15141/revisions/1/download",
        ),
    ]
}

fn default_output_file() -> PathBuf {
    PathBuf::from("bootstrap-results.json")
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid Grafana URL '{value}': {source}")]
    InvalidGrafanaUrl {
        value: String,
        source: url::ParseError,
    },
    #[error("invalid {field} '{value}': {source}")]
    InvalidDatasourceUrl {
        field: &'static str,
        value: String,
        source: url::ParseError,
    },
    #[error("log format must be one of json, pretty, compact; got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("invalid tenant entry '{entry}'; expected name[:tenant_id[:service_account]]")]
    InvalidTenantEntry { entry: String },
    #[error("no tenants configured; set OBS_TENANTS or leave it unset for the defaults")]
    NoTenants,
    #[error("tenant '{name}' is defined more than once")]
    DuplicateTenant { name: String },
    #[error("invalid dashboard entry '{entry}'; expected 'Display Name=url'")]
    InvalidDashboardEntry { entry: String },
    #[error("invalid URL '{value}' for dashboard '{name}': {source}")]
    InvalidDashboardUrl {
        name: String,
        value: String,
        source: url::ParseError,
    },
    #[error("invalid dashboard org id '{value}'")]
    InvalidDashboardOrgId { value: String },
    #[error("{field} must be a non-zero port")]
    InvalidPort { field: &'static str },
}

/// Loads configuration using layered `.env` files and `OBS_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads and validates configuration. Process variables win over dotenv files.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_non_empty(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let log_level = take_non_empty(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_non_empty(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let grafana_url = take_non_empty(&mut layered, "GRAFANA_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(default_grafana_url);
        let admin_user =
            take_non_empty(&mut layered, "ADMIN_USER").unwrap_or_else(default_admin_user);
        let admin_password = take_non_empty(&mut layered, "ADMIN_PASSWORD");
        let kubectl = take_non_empty(&mut layered, "KUBECTL").unwrap_or_else(default_kubectl);

        let secret = SecretRefConfig {
            namespace: take_non_empty(&mut layered, "SECRET_NAMESPACE")
                .unwrap_or_else(default_namespace),
            name: take_non_empty(&mut layered, "SECRET_NAME").unwrap_or_else(default_secret_name),
            key: take_non_empty(&mut layered, "SECRET_KEY").unwrap_or_else(default_secret_key),
        };

        let port_forward = PortForwardConfig {
            enabled: layered
                .remove("PORT_FORWARD")
                .map(|v| parse_flag(&v))
                .unwrap_or(false),
            namespace: take_non_empty(&mut layered, "PORT_FORWARD_NAMESPACE")
                .unwrap_or_else(default_namespace),
            target: take_non_empty(&mut layered, "PORT_FORWARD_TARGET")
                .unwrap_or_else(default_port_forward_target),
            local_port: layered
                .remove("PORT_FORWARD_LOCAL_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_port_forward_local_port),
            remote_port: layered
                .remove("PORT_FORWARD_REMOTE_PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_port_forward_remote_port),
            ready_timeout_ms: layered
                .remove("PORT_FORWARD_READY_TIMEOUT_MS")
                .and_then(|v| v.parse().ok())
                .unwrap_or_else(default_port_forward_ready_timeout_ms),
        };

        let mimir_url = take_non_empty(&mut layered, "MIMIR_URL").unwrap_or_else(default_mimir_url);
        let loki_url = take_non_empty(&mut layered, "LOKI_URL").unwrap_or_else(default_loki_url);
        let tempo_url = take_non_empty(&mut layered, "TEMPO_URL").unwrap_or_else(default_tempo_url);

        // Tenants - comma-separated `name[:tenant_id[:service_account]]`
        let tenants = match take_non_empty(&mut layered, "TENANTS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|entry| {
                    TenantDefinition::parse(entry).ok_or_else(|| ConfigError::InvalidTenantEntry {
                        entry: entry.to_string(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => default_tenants(),
        };

        // Dashboards - semicolon-separated `Display Name=url`
        let dashboards = match take_non_empty(&mut layered, "DASHBOARDS") {
            Some(raw) => raw
                .split(';')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|entry| {
                    DashboardSource::parse(entry).ok_or_else(|| {
                        ConfigError::InvalidDashboardEntry {
                            entry: entry.to_string(),
                        }
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => default_dashboards(),
        };

        let dashboard_org_id = match take_non_empty(&mut layered, "DASHBOARD_ORG_ID") {
            Some(raw) => Some(
                raw.trim()
                    .parse::<i64>()
                    .map_err(|_| ConfigError::InvalidDashboardOrgId { value: raw.clone() })?,
            ),
            None => None,
        };

        let output_file = take_non_empty(&mut layered, "OUTPUT_FILE")
            .map(PathBuf::from)
            .unwrap_or_else(default_output_file);

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            grafana_url,
            admin_user,
            admin_password,
            kubectl,
            secret,
            port_forward,
            mimir_url,
            loki_url,
            tempo_url,
            tenants,
            dashboards,
            dashboard_org_id,
            output_file,
        };

        config.validate()?;

        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("OBS_PROFILE")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_non_empty(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values.remove(key).filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
