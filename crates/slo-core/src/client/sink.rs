use super::EntityClient;
use crate::agent::IndicatorSink;
use crate::entities::Indicator;
use async_trait::async_trait;

/// Pushes indicators to the entity service
pub struct EntityIndicatorSink {
    client: EntityClient,
    org: String,
}

impl EntityIndicatorSink {
    pub fn new(client: EntityClient, org: impl Into<String>) -> Self {
        Self {
            client,
            org: org.into(),
        }
    }
}

#[async_trait]
impl IndicatorSink for EntityIndicatorSink {
    async fn deliver(&self, indicator: &Indicator) -> anyhow::Result<()> {
        self.client.upsert_entity(&self.org, indicator).await?;
        Ok(())
    }
}
