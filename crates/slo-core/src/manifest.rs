//! Objective manifest loading
//!
//! A manifest is a multi-document YAML stream of Objectives. Empty
//! documents are skipped. The MD5 of its JSON encoding is used to detect
//! changes between two reads of the same file.

use crate::entities::{selector, Objective};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_MANIFEST_PATH: &str = "./reliably.yaml";

#[derive(Debug, Error)]
pub enum EntityError {
    #[error("failed to read manifest {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse manifest: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("no objectives found in manifest {0}")]
    Empty(String),

    #[error("objective #{index}: {reason}")]
    Invalid { index: usize, reason: String },

    #[error("duplicated objective name '{name}' for service '{service}'")]
    Duplicate { service: String, name: String },
}

/// Ordered objectives decoded from a manifest
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest(pub Vec<Objective>);

impl Manifest {
    pub fn new(objectives: Vec<Objective>) -> Self {
        Self(objectives)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, EntityError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| EntityError::Read {
            path: path.display().to_string(),
            source,
        })?;

        let manifest = Self::from_yaml(&content)?;
        if manifest.is_empty() {
            return Err(EntityError::Empty(path.display().to_string()));
        }
        Ok(manifest)
    }

    /// Decode every non-empty document of a YAML stream
    pub fn from_yaml(content: &str) -> Result<Self, EntityError> {
        let mut objectives = Vec::new();
        for document in serde_yaml::Deserializer::from_str(content) {
            let value = serde_yaml::Value::deserialize(document)?;
            if value.is_null() {
                continue;
            }
            objectives.push(serde_yaml::from_value(value)?);
        }
        Ok(Self(objectives))
    }

    /// Multi-document YAML, documents separated by `---`
    pub fn to_yaml(&self) -> Result<String, EntityError> {
        let mut out = String::new();
        for (i, objective) in self.0.iter().enumerate() {
            if i > 0 {
                out.push_str("---\n");
            }
            out.push_str(&serde_yaml::to_string(objective)?);
        }
        Ok(out)
    }

    pub fn objectives(&self) -> &[Objective] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Objective> {
        self.0.iter()
    }

    /// MD5 (hex) of the JSON encoding
    pub fn hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        format!("{:x}", md5::compute(bytes))
    }

    pub fn validate(&self) -> Result<(), EntityError> {
        let mut seen = HashSet::new();

        for (index, o) in self.0.iter().enumerate() {
            let invalid = |reason: &str| EntityError::Invalid {
                index,
                reason: reason.to_string(),
            };

            if o.api_version.is_empty() {
                return Err(invalid("apiVersion is required"));
            }
            if o.kind.is_empty() {
                return Err(invalid("kind is required"));
            }
            if o.metadata.labels.is_empty() {
                return Err(invalid("metadata.labels must not be empty"));
            }
            if o.spec.indicator_selector.is_empty() {
                return Err(invalid("spec.indicatorSelector must not be empty"));
            }
            if !(0.0..=100.0).contains(&o.spec.objective_percent) {
                return Err(invalid("spec.objectivePercent must be between 0 and 100"));
            }
            if o.spec.window.as_nanos() <= 0 {
                return Err(invalid("spec.window must be greater than zero"));
            }
            if let Some(category) = o.category() {
                if category != selector::AVAILABILITY && category != selector::LATENCY {
                    return Err(invalid("spec.indicatorSelector.category must be availability or latency"));
                }
            }

            let key = (
                o.service().unwrap_or_default().to_string(),
                o.name().unwrap_or_default().to_string(),
            );
            if !seen.insert(key.clone()) {
                return Err(EntityError::Duplicate {
                    service: key.0,
                    name: key.1,
                });
            }
        }

        Ok(())
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Objective;
    type IntoIter = std::slice::Iter<'a, Objective>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
