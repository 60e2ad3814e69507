use super::{ClientError, EntityClient};
use crate::entities::NodeGraph;
use crate::manifest::Manifest;
use tracing::{debug, info};

/// Fetches the relationship graph of a manifest, re-syncing the manifest
/// only when its content hash changed since the previous refresh.
pub struct GraphRefresher {
    client: EntityClient,
    org: String,
    last_hash: Option<String>,
}

impl GraphRefresher {
    pub fn new(client: EntityClient, org: impl Into<String>) -> Self {
        Self {
            client,
            org: org.into(),
            last_hash: None,
        }
    }

    /// Hash of the last manifest synced successfully
    pub fn last_hash(&self) -> Option<&str> {
        self.last_hash.as_deref()
    }

    pub async fn refresh(&mut self, manifest: &Manifest) -> Result<NodeGraph, ClientError> {
        let hash = manifest.hash();
        if self.last_hash.as_deref() != Some(hash.as_str()) {
            info!(objectives = manifest.len(), hash = %hash, "manifest changed, syncing");
            self.client.sync_manifest(&self.org, manifest).await?;
            self.last_hash = Some(hash);
        } else {
            debug!(hash = %hash, "manifest unchanged, skipping sync");
        }

        self.client.related(&self.org, manifest).await
    }
}
