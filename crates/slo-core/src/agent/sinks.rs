//! Destinations for agent output
//!
//! Sinks are called concurrently with the workers of the next tick and must
//! be thread-safe.

use super::job::{AgentError, AgentFailure};
use crate::entities::Indicator;
use crate::observability::AgentLogger;
use async_trait::async_trait;

/// Receives every computed indicator
#[async_trait]
pub trait IndicatorSink: Send + Sync {
    async fn deliver(&self, indicator: &Indicator) -> anyhow::Result<()>;
}

/// Receives per-objective failures
pub trait ErrorSink: Send + Sync {
    fn handle(&self, error: AgentError);
}

/// Logs indicators as JSON
#[derive(Debug, Clone, Default)]
pub struct LogIndicatorSink {
    logger: AgentLogger,
}

impl LogIndicatorSink {
    pub fn new(logger: AgentLogger) -> Self {
        Self { logger }
    }
}

#[async_trait]
impl IndicatorSink for LogIndicatorSink {
    async fn deliver(&self, indicator: &Indicator) -> anyhow::Result<()> {
        self.logger.log_indicator(indicator);
        Ok(())
    }
}

/// Logs failures at error level with the objective labels
#[derive(Debug, Clone, Default)]
pub struct LogErrorSink {
    logger: AgentLogger,
}

impl LogErrorSink {
    pub fn new(logger: AgentLogger) -> Self {
        Self { logger }
    }
}

impl ErrorSink for LogErrorSink {
    fn handle(&self, error: AgentError) {
        match &error.source {
            AgentFailure::Delivery(e) => {
                self.logger.log_sink_failure(error.objective.labels(), e)
            }
            AgentFailure::Provider(e) => {
                self.logger.log_objective_failure(error.objective.labels(), e)
            }
        }
    }
}
