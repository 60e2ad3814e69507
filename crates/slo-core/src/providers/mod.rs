//! Metric providers
//!
//! A provider turns an Objective and a time range into an Indicator by
//! querying an external telemetry back-end. Providers are created per
//! computation by the factories of a [`ProviderRegistry`], which picks the
//! first one able to handle the objective's indicator selector.

pub mod aws;
pub mod datadog;
pub mod gcp;


use crate::duration::{DurationError, MachineDuration};
use crate::entities::{selector, Indicator, Labels, Objective};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::{Arc, OnceLock};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no provider able to compute objective")]
    NotHandled,

    #[error("unsupported service: {0}")]
    UnsupportedService(String),

    #[error("unsupported indicator category: {0}")]
    UnsupportedCategory(String),

    #[error("{0} not defined in objective indicator selector")]
    MissingSelector(&'static str),

    #[error("no data for resource {0}")]
    NoData(String),

    #[error("invalid resource {0}")]
    InvalidResource(String),

    #[error("invalid latency target: {0}")]
    Duration(#[from] DurationError),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// SLI flavour requested by an indicator selector
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Category {
    /// `100 - error rate`
    Availability,
    /// Share of 1-minute p99 buckets within the target
    Latency { target: MachineDuration },
}

impl Category {
    pub fn from_selector(labels: &Labels) -> Result<Self, ProviderError> {
        match labels.get(selector::CATEGORY).map(String::as_str) {
            Some(selector::AVAILABILITY) => Ok(Category::Availability),
            Some(selector::LATENCY) => {
                let raw = labels
                    .get(selector::LATENCY_TARGET)
                    .ok_or(ProviderError::MissingSelector(selector::LATENCY_TARGET))?;
                let target: MachineDuration = raw.parse()?;
                Ok(Category::Latency { target })
            }
            Some(other) => Err(ProviderError::UnsupportedCategory(other.to_string())),
            None => Err(ProviderError::MissingSelector(selector::CATEGORY)),
        }
    }
}

/// Latency target in (fractional) milliseconds
pub fn target_millis(target: MachineDuration) -> f64 {
    target.as_nanos() as f64 / 1_000_000.0
}

/// Share of `values` satisfying `good`, as a percentage
pub fn percent_of<F>(values: &[f64], good: F) -> Option<f64>
where
    F: Fn(f64) -> bool,
{
    if values.is_empty() {
        return None;
    }
    let count = values.iter().filter(|v| good(**v)).count();
    Some(count as f64 / values.len() as f64 * 100.0)
}

/// Metric back-end capable of computing indicators
#[async_trait]
pub trait MetricsProvider: Send + Sync {
    fn name(&self) -> &'static str;

    /// Back-end resource addressed by the selector, if any
    fn resource_from_selector(&self, selector: &Labels) -> Option<String>;

    /// Whether the selector carries enough keys for this provider
    fn can_handle_selector(&self, selector: &Labels) -> bool {
        self.resource_from_selector(selector).is_some()
    }

    async fn compute_objective(
        &self,
        objective: &Objective,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Indicator, ProviderError>;

    /// Release owned clients
    async fn close(&self) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Built-in provider tags, in dispatch order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Aws,
    Gcp,
    Datadog,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Aws, ProviderKind::Gcp, ProviderKind::Datadog];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Aws => "aws",
            ProviderKind::Gcp => "gcp",
            ProviderKind::Datadog => "datadog",
        }
    }

    pub fn create(&self) -> anyhow::Result<Box<dyn MetricsProvider>> {
        Ok(match self {
            ProviderKind::Aws => Box::new(aws::AwsCloudWatch::new()),
            ProviderKind::Gcp => Box::new(gcp::GcpMonitoring::from_env()?),
            ProviderKind::Datadog => Box::new(datadog::Datadog::from_env()?),
        })
    }
}

pub type ProviderFactory =
    Arc<dyn Fn() -> anyhow::Result<Box<dyn MetricsProvider>> + Send + Sync>;

/// Ordered table of provider factories
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    factories: Vec<(String, ProviderFactory)>,
}

static GLOBAL_REGISTRY: OnceLock<Arc<ProviderRegistry>> = OnceLock::new();

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// `aws`, `gcp`, `datadog`
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for kind in ProviderKind::ALL {
            registry.register(kind.as_str(), move || kind.create());
        }
        registry
    }

    /// Process-wide built-in registry, created on first use
    pub fn global() -> Arc<ProviderRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(Self::builtin()))
            .clone()
    }

    pub fn register<F>(&mut self, tag: impl Into<String>, factory: F)
    where
        F: Fn() -> anyhow::Result<Box<dyn MetricsProvider>> + Send + Sync + 'static,
    {
        self.factories.push((tag.into(), Arc::new(factory)));
    }

    pub fn tags(&self) -> Vec<&str> {
        self.factories.iter().map(|(tag, _)| tag.as_str()).collect()
    }

    /// Dispatch to the first provider handling the selector.
    ///
    /// A provider that accepts the selector owns the outcome: its error is
    /// returned without trying the remaining providers.
    pub async fn compute(
        &self,
        objective: &Objective,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Indicator, ProviderError> {
        for (tag, factory) in &self.factories {
            let provider = match factory() {
                Ok(provider) => provider,
                Err(e) => {
                    debug!(provider = %tag, error = %e, "provider unavailable");
                    continue;
                }
            };

            if !provider.can_handle_selector(objective.selector()) {
                close_provider(tag, provider.as_ref()).await;
                continue;
            }

            debug!(provider = %tag, "computing objective");
            let result = provider.compute_objective(objective, from, to).await;
            close_provider(tag, provider.as_ref()).await;
            return result;
        }

        Err(ProviderError::NotHandled)
    }
}

async fn close_provider(tag: &str, provider: &dyn MetricsProvider) {
    if let Err(e) = provider.close().await {
        debug!(provider = %tag, error = %e, "failed to close provider");
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderRegistry")
            .field("providers", &self.tags())
            .finish()
    }
}
