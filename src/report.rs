//! Provisioning result record.
//!
//! Only tenants that finished every step are recorded. The record is written
//! once at the end of a run as indented JSON, replacing any earlier file.

use std::{
    collections::BTreeMap,
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::ser::{PrettyFormatter, Serializer};
use thiserror::Error;

use crate::grafana::models::OrgId;

/// Outcome of a fully provisioned tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantResult {
    pub org_id: OrgId,
    pub tenant_id: String,
    pub service_account: String,
    pub token: String,
}

/// Results keyed by tenant display name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProvisioningResults {
    tenants: BTreeMap<String, TenantResult>,
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to serialize provisioning results: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ProvisioningResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, tenant_name: impl Into<String>, result: TenantResult) {
        self.tenants.insert(tenant_name.into(), result);
    }

    pub fn get(&self, tenant_name: &str) -> Option<&TenantResult> {
        self.tenants.get(tenant_name)
    }

    pub fn len(&self) -> usize {
        self.tenants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tenants.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &TenantResult)> {
        self.tenants.iter()
    }

    /// Render as JSON with four-space indentation.
    pub fn to_pretty_json(&self) -> Result<String, ReportError> {
        let mut buf = Vec::new();
        let mut serializer = Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
        self.serialize(&mut serializer)?;
        buf.push(b'\n');
        // serde_json only ever emits UTF-8
        Ok(String::from_utf8_lossy(&buf).into_owned())
    }

    /// Write the record to `path`, overwriting previous content.
    pub fn write_to(&self, path: &Path) -> Result<(), ReportError> {
        let rendered = self.to_pretty_json()?;
        fs::write(path, rendered).map_err(|source| ReportError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> TenantResult {
        TenantResult {
            org_id: 4,
            tenant_id: "devteam-1".to_string(),
            service_account: "sa-devteam-1".to_string(),
            token: "glsa_abc".to_string(),
        }
    }

    #[test]
    fn renders_with_four_space_indent() {
        let mut results = ProvisioningResults::new();
        results.insert("devteam-1", sample());
        let rendered = results.to_pretty_json().unwrap();
        assert!(rendered.starts_with("{\n    \"devteam-1\": {\n        \"org_id\": 4,"));
    }

    #[test]
    fn write_overwrites_previous_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bootstrap-results.json");
        fs::write(&path, "stale content that is much longer than the new record").unwrap();

        ProvisioningResults::new().write_to(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "{}\n");

        let mut results = ProvisioningResults::new();
        results.insert("devteam-1", sample());
        results.write_to(&path).unwrap();
        let parsed: ProvisioningResults =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed, results);
    }

    #[test]
    fn write_reports_missing_directory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing").join("out.json");
        let err = ProvisioningResults::new().write_to(&path).unwrap_err();
        assert!(matches!(err, ReportError::Write { .. }));
    }
}
