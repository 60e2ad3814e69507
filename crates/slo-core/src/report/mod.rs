//! SLO reports
//!
//! Turns objective results queried from the entity service into
//! per-service reports and renders them as text, table, JSON, YAML,
//! markdown or a user template.

pub mod budget;
mod builder;
mod model;
pub mod template;
mod trend;
pub mod writer;


pub use builder::{filter_by_manifest, map_to_reports, parse_selector, parse_time};
pub use model::{Report, Service, ServiceLevel, ServiceLevelResult, Window};
pub use trend::{slo_movement, slo_trend, trend_ticks};
pub use writer::{parse_outputs, render, Format, ReportOutput};

use crate::client::{ClientError, EntityClient, QueryBody};
use crate::entities::Labels;
use crate::manifest::{EntityError, Manifest};
use chrono::Utc;
use thiserror::Error;
use tracing::debug;

/// Result slots fetched per objective, hence reports per fetch
pub const REPORT_LIMIT: usize = 5;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("time '{label}' not parsed correctly: {value:?}")]
    Time { label: &'static str, value: String },

    #[error("selector string incorrectly delimited")]
    Selector,

    #[error("Format '{0}' is not valid. Use one of the supported formats: json, yaml, text, table, markdown, template")]
    UnknownFormat(String),

    #[error("{0}")]
    InvalidOutputs(&'static str),

    #[error("failed to render template: {0}")]
    Template(String),

    #[error("failed to encode report: {0}")]
    Json(#[from] serde_json::Error),

    #[error("failed to encode report: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("failed to get objective results: {0}")]
    Client(#[from] ClientError),

    #[error("failed to read manifest: {0}")]
    Manifest(#[from] EntityError),
}

/// Query the objective results of `org` and build the reports, newest
/// first. With a manifest, only its objectives are kept.
pub async fn fetch_reports(
    client: &EntityClient,
    org: &str,
    selector: Labels,
    manifest: Option<&Manifest>,
) -> Result<Vec<Report>, ReportError> {
    let api_version = crate::API_VERSION;
    let body = QueryBody::objectives(selector, REPORT_LIMIT);
    let mut objectives = client.query(org, api_version, &body).await?.objectives;

    if let Some(manifest) = manifest {
        debug!(objectives = manifest.len(), "filtering results with manifest");
        objectives = filter_by_manifest(org, api_version, manifest, objectives);
    }

    map_to_reports(&objectives, REPORT_LIMIT, api_version, Utc::now())
}
