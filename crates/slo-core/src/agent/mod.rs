//! SLO indicator agent
//!
//! Periodically computes an Indicator for every Objective of a manifest
//! and hands it to a sink.

mod job;
mod sinks;

#[cfg(test)]
mod tests;

pub use job::{
    AgentError, AgentFailure, Job, JobConfig, TickStats, DEFAULT_INTERVAL, WORKER_COUNT,
};
pub use sinks::{ErrorSink, IndicatorSink, LogErrorSink, LogIndicatorSink};

/// Wait for SIGINT, or SIGTERM on unix. Returns the signal name.
pub async fn wait_for_shutdown_signal() -> anyhow::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            res = tokio::signal::ctrl_c() => res.map(|_| "SIGINT").map_err(Into::into),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        Ok("SIGINT")
    }
}
