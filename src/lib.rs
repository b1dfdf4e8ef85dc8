//! # Observability Bootstrap Library
//!
//! This library provides the building blocks of the `obs-bootstrap` tool:
//! configuration loading, admin credential resolution, the Grafana API
//! client, the per-tenant provisioners, the dashboard importer and the
//! result reporter.

pub mod config;
pub mod connectivity;
pub mod credentials;
pub mod dashboards;
pub mod error;
pub mod grafana;
pub mod provision;
pub mod report;
pub mod runner;
pub mod telemetry;
