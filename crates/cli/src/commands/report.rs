//! `reliably slo report`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use colored::Colorize;
use slo_core::client::EntityClient;
use slo_core::entities::Labels;
use slo_core::report::{
    fetch_reports, parse_outputs, parse_selector, render, Format, Report, ReportOutput,
};
use slo_core::Manifest;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::output::{clear_screen, print_info, print_success};

pub const EXAMPLES: &str = "Examples:
  $ reliably slo report
  $ reliably slo report -f text
  $ reliably slo report -f markdown -o report.md
  $ reliably slo report -f yaml,json -o o.yaml,o.json
  $ reliably slo report -t slo-report.tmpl
  $ reliably slo report -t slo-report.tmpl -o slo-report.txt";

const WATCH_INTERVAL: Duration = Duration::from_secs(3);

pub struct ReportArgs {
    pub manifest: Option<PathBuf>,
    pub selector: String,
    pub format: String,
    pub output: String,
    pub template: Option<PathBuf>,
    pub watch: bool,
}

/// Everything needed to fetch and render one round of reports
pub struct ReportJob {
    client: EntityClient,
    org: String,
    selector: Labels,
    manifest: Option<Manifest>,
    outputs: Vec<ReportOutput>,
    template: Option<String>,
}

pub async fn run(ctx: &super::SloContext, args: ReportArgs) -> Result<()> {
    let template = match &args.template {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Error opening template file: {}", path.display()))?,
        ),
        None => None,
    };

    let outputs = parse_outputs(&args.format, &args.output, template.is_some())?;
    let selector = parse_selector(&args.selector)?;
    let manifest = args
        .manifest
        .as_ref()
        .map(Manifest::load_from_file)
        .transpose()?;

    let job = ReportJob {
        client: ctx.entity_client()?,
        org: ctx.org()?,
        selector,
        manifest,
        outputs,
        template,
    };

    if args.watch {
        return watch(&job).await;
    }

    let reports = job.fetch().await?;
    if !has_results(&reports) {
        print_no_results();
        return Ok(());
    }
    job.write(&reports)
}

impl ReportJob {
    /// Job drawing only the table view, for `slo agent --report-view`
    pub fn table_view(
        ctx: &super::SloContext,
        selector: &str,
        manifest: Option<Manifest>,
    ) -> Result<Self> {
        Ok(Self {
            client: ctx.entity_client()?,
            org: ctx.org()?,
            selector: parse_selector(selector)?,
            manifest,
            outputs: Vec::new(),
            template: None,
        })
    }

    async fn fetch(&self) -> Result<Vec<Report>> {
        let reports = fetch_reports(
            &self.client,
            &self.org,
            self.selector.clone(),
            self.manifest.as_ref(),
        )
        .await
        .context("reports error")?;
        debug!(reports = reports.len(), "fetched reports");
        Ok(reports)
    }

    fn write(&self, reports: &[Report]) -> Result<()> {
        let Some(current) = reports.first() else {
            return Ok(());
        };

        for output in &self.outputs {
            let rendered = render(output.format, current, reports, self.template.as_deref())?;
            match &output.path {
                Some(path) => {
                    std::fs::write(path, rendered)
                        .with_context(|| format!("error creating output file {}", path.display()))?;
                    print_success(&format!(
                        "{} report written to {}",
                        output.format.as_str(),
                        path.display()
                    ));
                }
                None => print!("{}", rendered),
            }
        }
        Ok(())
    }
}

fn has_results(reports: &[Report]) -> bool {
    reports.first().map(|r| !r.is_empty()).unwrap_or(false)
}

/// Redraw the table report every few seconds until Ctrl+C
async fn watch(job: &ReportJob) -> Result<()> {
    let mut ticker = tokio::time::interval(WATCH_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => watch_round(job).await?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                print_info("CTRL+C pressed... exiting");
                return Ok(());
            }
        }
    }
}

/// Redraw the table report every few seconds until `shutdown` fires
pub async fn report_view(job: ReportJob, mut shutdown: broadcast::Receiver<()>) {
    let mut ticker = tokio::time::interval(WATCH_INTERVAL);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                if let Err(e) = watch_round(&job).await {
                    warn!(error = %format!("{e:#}"), "failed to render report view");
                }
            }
            _ = shutdown.recv() => break,
        }
    }
}

/// Fetch and redraw once. A failed fetch keeps the previous screen and is
/// retried on the next tick.
async fn watch_round(job: &ReportJob) -> Result<()> {
    let reports = match job.fetch().await {
        Ok(reports) => reports,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "failed to refresh report, retrying on next tick");
            return Ok(());
        }
    };

    clear_screen();
    println!(
        "{} Press CTRL+C to quit.",
        "Refreshing SLO report every 3 seconds.".magenta()
    );
    match reports.first() {
        Some(current) if !current.is_empty() => {
            print!("{}", render(Format::Table, current, &reports, None)?);
        }
        _ => print_no_results(),
    }
    Ok(())
}

fn print_no_results() {
    eprintln!(
        "{}",
        "No relevant objective results were found. To generate them, follow these steps:".yellow()
    );
    eprintln!(" 1. Define objectives with 'reliably slo init' or manually create them. Find out more: https://reliably.com/docs/guides/slo/define-slos");
    eprintln!(" 2. Sync your objectives if you haven't, with 'reliably slo sync'. Find out more: https://reliably.com/docs/reference/cli/reliably-slo-sync");
    eprintln!(" 3. Push indicators for these objectives. For this you may use 'reliably slo agent' or manually push them. Find out more: https://reliably.com/docs/guides/slo/sending-custom-indicators");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use slo_core::client::ClientConfig;

    #[test]
    fn test_has_results() {
        assert!(!has_results(&[]));
        assert!(!has_results(&[Report::new("reliably.com/v1", Utc::now())]));

        let mut report = Report::new("reliably.com/v1", Utc::now());
        report.services.push(Default::default());
        assert!(has_results(&[report]));
    }

    #[tokio::test]
    async fn test_watch_round_survives_fetch_error() {
        let job = ReportJob {
            client: EntityClient::new(ClientConfig::new("127.0.0.1:9")).unwrap(),
            org: "acme".to_string(),
            selector: Labels::new(),
            manifest: None,
            outputs: Vec::new(),
            template: None,
        };

        assert!(job.fetch().await.is_err());
        assert!(watch_round(&job).await.is_ok());
    }
}
