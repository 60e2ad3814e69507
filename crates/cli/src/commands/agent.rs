//! `reliably slo agent`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use slo_core::agent::{wait_for_shutdown_signal, Job, JobConfig, LogErrorSink};
use slo_core::client::EntityIndicatorSink;
use slo_core::{AgentLogger, Manifest};
use tokio::sync::broadcast;
use tracing::warn;

use super::report::{report_view, ReportJob};

pub const DEFAULT_INTERVAL_SECS: u64 = 300;

pub struct AgentArgs {
    pub manifest: PathBuf,
    pub interval: u64,
    /// Objectives selector of the report view
    pub selector: String,
    /// Redraw the table report while pushing indicators
    pub report_view: bool,
}

/// Compute and push indicators for every objective of the manifest until
/// SIGINT or SIGTERM.
pub async fn run(ctx: &super::SloContext, args: AgentArgs) -> Result<()> {
    let manifest = Manifest::load_from_file(&args.manifest)?;
    manifest.validate()?;

    let org = ctx.org()?;
    let client = ctx.entity_client()?;
    let view = if args.report_view {
        Some(ReportJob::table_view(ctx, &args.selector, Some(manifest.clone()))?)
    } else {
        None
    };

    let interval = args.interval.max(1);
    let logger = AgentLogger::new(&org);
    logger.log_startup(slo_core::VERSION, manifest.len(), interval);

    let config = JobConfig::new(manifest.0)
        .with_interval(Duration::from_secs(interval))
        .with_indicator_sink(Arc::new(EntityIndicatorSink::new(client, &org)))
        .with_error_sink(Arc::new(LogErrorSink::new(logger.clone())))
        .with_logger(logger.clone());

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    let view = view.map(|job| tokio::spawn(report_view(job, shutdown_tx.subscribe())));
    let job = tokio::spawn(Job::new(config).run(shutdown_rx));

    let reason = match wait_for_shutdown_signal().await {
        Ok(signal) => format!("{signal} received"),
        Err(e) => {
            warn!(error = %e, "Failed to listen for shutdown signals");
            "signal listener failed".to_string()
        }
    };
    logger.log_shutdown(&reason);

    let _ = shutdown_tx.send(());
    job.await.context("indicator job panicked")?;
    if let Some(view) = view {
        view.await.context("report view panicked")?;
    }
    Ok(())
}
