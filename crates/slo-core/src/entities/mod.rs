//! Entity model shared with the entity service
//!
//! Objectives are authored in manifests, Indicators are produced by the
//! agent and ObjectiveResults come back from queries. All three share the
//! same `apiVersion`/`kind`/`metadata`/`spec` envelope.

mod graph;

pub use graph::{Edge, Node, NodeGraph};

use crate::duration::{deserialize_window, MachineDuration};
use base64::Engine;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Label map; keys are unique and iteration order is sorted
pub type Labels = BTreeMap<String, String>;

pub const OBJECTIVE_KIND: &str = "Objective";
pub const INDICATOR_KIND: &str = "Indicator";

/// Selector keys recognized across providers
pub mod selector {
    pub const CATEGORY: &str = "category";
    pub const LATENCY_TARGET: &str = "latency_target";
    pub const PERCENTILE: &str = "percentile";
    pub const SERVICE: &str = "service";
    pub const NAME: &str = "name";
    pub const FROM: &str = "from";
    pub const TO: &str = "to";

    pub const AVAILABILITY: &str = "availability";
    pub const LATENCY: &str = "latency";
}

/// Common envelope accessors
pub trait Entity {
    fn api_version(&self) -> &str;
    fn kind(&self) -> &str;
    fn metadata(&self) -> &Metadata;
}

/// Entity metadata
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Human handle; never sent to the entity service
    #[serde(default, skip_serializing)]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,

    /// Relationship predicates: AND within a map, OR across maps
    #[serde(
        default,
        rename = "relatedTo",
        skip_serializing_if = "Vec::is_empty"
    )]
    pub related_to: Vec<Labels>,
}

impl Metadata {
    pub fn with_labels(labels: Labels) -> Self {
        Self {
            labels,
            ..Default::default()
        }
    }

    /// True when any predicate is fully contained in `other`
    pub fn is_related_to(&self, other: &Labels) -> bool {
        self.related_to.iter().any(|predicate| {
            !predicate.is_empty()
                && predicate
                    .iter()
                    .all(|(k, v)| other.get(k).map(|o| o == v).unwrap_or(false))
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveSpec {
    #[serde(rename = "indicatorSelector", default)]
    pub indicator_selector: Labels,

    #[serde(rename = "objectivePercent", default)]
    pub objective_percent: f64,

    #[serde(deserialize_with = "deserialize_window", default)]
    pub window: MachineDuration,
}

/// Target SLO over a window, bound to a measurement source by its selector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Objective {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub spec: ObjectiveSpec,
}

impl Objective {
    pub fn new(labels: Labels, spec: ObjectiveSpec) -> Self {
        Self {
            api_version: crate::API_VERSION.to_string(),
            kind: OBJECTIVE_KIND.to_string(),
            metadata: Metadata::with_labels(labels),
            spec,
        }
    }

    pub fn labels(&self) -> &Labels {
        &self.metadata.labels
    }

    pub fn selector(&self) -> &Labels {
        &self.spec.indicator_selector
    }

    pub fn service(&self) -> Option<&str> {
        self.metadata.labels.get(selector::SERVICE).map(String::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.metadata.labels.get(selector::NAME).map(String::as_str)
    }

    pub fn category(&self) -> Option<&str> {
        self.spec
            .indicator_selector
            .get(selector::CATEGORY)
            .map(String::as_str)
    }
}

impl Entity for Objective {
    fn api_version(&self) -> &str {
        &self.api_version
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    pub percent: f64,
}

/// One realised SLI observation over `[from, to]`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indicator {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub metadata: Metadata,

    pub spec: IndicatorSpec,
}

/// Instant stamp used in `from`/`to` labels
pub fn format_instant(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

impl Indicator {
    /// Indicator for `objective` over `[from, to]` with a zero percent.
    ///
    /// Labels are the objective's selector plus the `from`/`to` stamps,
    /// which keep indicators unique on the entity service.
    pub fn for_objective(objective: &Objective, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        let mut labels = objective.spec.indicator_selector.clone();
        labels.insert(selector::FROM.to_string(), format_instant(&from));
        labels.insert(selector::TO.to_string(), format_instant(&to));

        Self {
            api_version: objective.api_version.clone(),
            kind: INDICATOR_KIND.to_string(),
            metadata: Metadata::with_labels(labels),
            spec: IndicatorSpec {
                from,
                to,
                percent: 0.0,
            },
        }
    }

    pub fn with_percent(mut self, percent: f64) -> Self {
        self.spec.percent = percent;
        self
    }
}

impl Entity for Indicator {
    fn api_version(&self) -> &str {
        &self.api_version
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveResultSpec {
    #[serde(rename = "indicatorSelector", default)]
    pub indicator_selector: Labels,

    #[serde(rename = "objectivePercent", default)]
    pub objective_percent: f64,

    #[serde(rename = "actualPercent", default)]
    pub actual_percent: f64,

    /// `actual - objective`
    #[serde(rename = "remainingPercent", default)]
    pub remaining_percent: f64,
}

/// Server-side aggregation of indicators for one objective window
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectiveResult {
    #[serde(rename = "apiVersion", default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kind: String,

    #[serde(default)]
    pub metadata: Metadata,

    #[serde(default)]
    pub spec: ObjectiveResultSpec,
}

impl Entity for ObjectiveResult {
    fn api_version(&self) -> &str {
        &self.api_version
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// Identity hash the entity service keys upserts on.
///
/// SHA-256 over `org || kind || apiVersion || key1 || value1 || ...` with
/// keys sorted, base64 encoded.
pub fn entity_id(org: &str, kind: &str, api_version: &str, labels: &Labels) -> String {
    let mut hasher = Sha256::new();
    hasher.update(org.as_bytes());
    hasher.update(kind.as_bytes());
    hasher.update(api_version.as_bytes());
    for (key, value) in labels {
        hasher.update(key.as_bytes());
        hasher.update(value.as_bytes());
    }
    base64::engine::general_purpose::STANDARD.encode(hasher.finalize())
}

/// Render labels as `k='v', k2='v2'` for log lines
pub fn format_labels(labels: &Labels) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}='{v}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build a label map from string pairs
pub fn labels<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Labels {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}
