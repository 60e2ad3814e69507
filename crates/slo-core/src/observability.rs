//! Logging setup and structured agent events
//!
//! Provides:
//! - tracing subscriber initialisation (JSON for the agent, compact on
//!   stderr for interactive commands)
//! - `AgentLogger`, which emits agent lifecycle events with an `event` field

use crate::entities::{format_labels, Indicator, Labels};
use anyhow::Result;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Subscriber output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per line on stdout
    Json,
    /// Human readable, on stderr
    Compact,
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins when set; otherwise the level is `info`, or `debug`
/// when `debug` is true.
pub fn init_logging(format: LogFormat, debug: bool) -> Result<()> {
    let default_level = if debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Compact => registry
            .with(
                fmt::layer()
                    .compact()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?,
    }
    Ok(())
}

/// Structured logger for agent events
#[derive(Debug, Clone)]
pub struct AgentLogger {
    org: String,
}

impl AgentLogger {
    pub fn new(org: impl Into<String>) -> Self {
        Self { org: org.into() }
    }

    pub fn log_startup(&self, version: &str, objectives: usize, interval_secs: u64) {
        info!(
            event = "agent_started",
            org = %self.org,
            agent_version = %version,
            objectives = objectives,
            interval_secs = interval_secs,
            "starting slo indicator agent"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "agent_shutdown",
            org = %self.org,
            reason = %reason,
            "slo indicator agent shutting down"
        );
    }

    pub fn log_tick(&self, indicators: usize, errors: usize, elapsed_ms: u128) {
        info!(
            event = "tick_completed",
            org = %self.org,
            indicators = indicators,
            errors = errors,
            elapsed_ms = elapsed_ms,
            "indicator tick complete"
        );
    }

    /// Log a computed indicator with its JSON payload
    pub fn log_indicator(&self, indicator: &Indicator) {
        let payload = serde_json::to_string(indicator).unwrap_or_default();
        info!(
            event = "indicator_generated",
            org = %self.org,
            percent = indicator.spec.percent,
            indicator = %payload,
            "indicator generated"
        );
    }

    pub fn log_objective_failure(&self, labels: &Labels, err: &dyn std::fmt::Display) {
        error!(
            event = "objective_failed",
            org = %self.org,
            objective = %format_labels(labels),
            error = %err,
            "failed to compute indicator for objective"
        );
    }

    pub fn log_sink_failure(&self, labels: &Labels, err: &dyn std::fmt::Display) {
        warn!(
            event = "indicator_delivery_failed",
            org = %self.org,
            objective = %format_labels(labels),
            error = %err,
            "failed to deliver indicator"
        );
    }
}

impl Default for AgentLogger {
    fn default() -> Self {
        Self::new("")
    }
}
