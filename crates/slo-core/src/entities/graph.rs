//! Relationship graph returned by the `relatedto` endpoint
//!
//! Cycles are legal: nodes are referenced by id only.

use super::{entity_id, Entity, Metadata, Objective};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;
use tracing::debug;

/// Accepted `key=value` filter shape
const FILTER_PATTERN: &str = r"^[a-zA-Z0-9_-]+=[a-zA-Z0-9\s_-]+$";

static FILTER_RE: OnceLock<Option<Regex>> = OnceLock::new();

fn filter_regex() -> Option<&'static Regex> {
    FILTER_RE
        .get_or_init(|| Regex::new(FILTER_PATTERN).ok())
        .as_ref()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub kind: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
}

/// Both collections always serialize, empty as `[]`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeGraph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl NodeGraph {
    /// Keep nodes matching any `key=value` filter and the edges whose ends
    /// both survive. Malformed filters are skipped; with no valid filter
    /// the graph is returned unchanged.
    pub fn filter<S: AsRef<str>>(&self, filters: &[S]) -> NodeGraph {
        let pairs: Vec<(&str, &str)> = filters
            .iter()
            .map(|f| AsRef::<str>::as_ref(f))
            .filter(|f| {
                let valid = filter_regex().map(|re| re.is_match(f)).unwrap_or(false);
                if !valid {
                    debug!(filter = %f, "invalid key=value pair detected for filter");
                }
                valid
            })
            .filter_map(|f| f.split_once('='))
            .collect();

        if pairs.is_empty() {
            return self.clone();
        }

        let nodes: Vec<Node> = self
            .nodes
            .iter()
            .filter(|node| {
                pairs
                    .iter()
                    .any(|(k, v)| node.metadata.labels.get(*k).map(String::as_str) == Some(*v))
            })
            .cloned()
            .collect();

        let kept: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
        let edges = self
            .edges
            .iter()
            .filter(|e| kept.contains(e.source.as_str()) && kept.contains(e.target.as_str()))
            .cloned()
            .collect();

        NodeGraph { nodes, edges }
    }

    /// Build the graph locally from the objectives' relationship predicates
    pub fn from_objectives(org: &str, objectives: &[Objective]) -> NodeGraph {
        let nodes: Vec<Node> = objectives
            .iter()
            .map(|o| Node {
                id: entity_id(org, &o.kind().to_lowercase(), o.api_version(), o.labels()),
                metadata: o.metadata.clone(),
                kind: o.kind().to_string(),
            })
            .collect();

        let mut edges = Vec::new();
        let mut seen = HashSet::new();
        for source in &nodes {
            for target in &nodes {
                if source.id == target.id {
                    continue;
                }
                if source.metadata.is_related_to(&target.metadata.labels) {
                    let edge = Edge {
                        source: source.id.clone(),
                        target: target.id.clone(),
                    };
                    if seen.insert(edge.clone()) {
                        edges.push(edge);
                    }
                }
            }
        }

        NodeGraph { nodes, edges }
    }
}
