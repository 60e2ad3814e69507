//! Reliably CLI
//!
//! Service level objectives as code: author a manifest, sync it to the
//! Reliably entity service, push indicators from cloud metrics and
//! report on the results.

mod commands;
mod config;
mod output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{agent, init, related, report, sync, SloContext};
use slo_core::manifest::DEFAULT_MANIFEST_PATH;
use slo_core::{init_logging, LogFormat, Settings};

/// Reliably CLI
#[derive(Parser)]
#[command(name = "reliably")]
#[command(author, version, about = "Reliably CLI: service level objectives as code", long_about = None)]
pub struct Cli {
    /// Reliably API host
    #[arg(long, env = "RELIABLY_HOST")]
    pub host: Option<String>,

    /// Entity service host, defaults to the API host
    #[arg(long, env = "RELIABLY_ENTITY_HOST")]
    pub entity_host: Option<String>,

    /// Organization to act on, defaults to the current one
    #[arg(long, env = "RELIABLY_ORG")]
    pub org: Option<String>,

    /// Enable debug logging
    #[arg(long)]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage your service level objectives
    #[command(subcommand)]
    Slo(SloCommands),
}

#[derive(Subcommand)]
pub enum SloCommands {
    /// Initialise the objectives of a manifest interactively
    Init {
        /// Where the manifest is written
        #[arg(long, short, default_value = DEFAULT_MANIFEST_PATH)]
        output: PathBuf,
    },

    /// Synchronize the objectives of a manifest with Reliably
    Sync {
        /// Path of the manifest to sync
        #[arg(long, short, default_value = DEFAULT_MANIFEST_PATH)]
        manifest: PathBuf,
    },

    /// Run in agent mode, pushing indicators to Reliably
    Agent {
        /// Location of the manifest
        #[arg(long, short, default_value = DEFAULT_MANIFEST_PATH)]
        manifest: PathBuf,

        /// Seconds between two indicator computations
        #[arg(long, short, default_value_t = agent::DEFAULT_INTERVAL_SECS)]
        interval: u64,

        /// Objectives selector based on labels, only used with --report-view
        #[arg(long, short = 'l', default_value = "")]
        selector: String,

        /// Show the table report while pushing indicators
        #[arg(long = "report-view", short = 'R')]
        report_view: bool,
    },

    /// Generate the SLO report
    #[command(after_help = report::EXAMPLES)]
    Report {
        /// Only report on the objectives of this manifest
        #[arg(long, short)]
        manifest: Option<PathBuf>,

        /// Objectives selector based on labels (k=v,k2=v2)
        #[arg(long, short = 'l', default_value = "")]
        selector: String,

        /// Report formats, comma separated: json, yaml, text, table, markdown, template
        #[arg(long, short, default_value = "table")]
        format: String,

        /// Where the reports are written, comma separated and paired with --format
        #[arg(long, short, default_value = "")]
        output: String,

        /// Handlebars template file used to render the report
        #[arg(long, short)]
        template: Option<PathBuf>,

        /// Refresh the report every 3 seconds
        #[arg(long, short)]
        watch: bool,
    },

    /// Fetch the relationship graph of the manifest objectives
    Related {
        /// Location of the manifest
        #[arg(long, short, default_value = DEFAULT_MANIFEST_PATH)]
        manifest: PathBuf,

        /// Only keep nodes with this key=value label (repeatable)
        #[arg(long = "filter", short = 'f')]
        filters: Vec<String>,

        /// Keep polling the graph every N seconds
        #[arg(long)]
        refresh: Option<u64>,

        /// Build the graph from the manifest alone, without the API
        #[arg(long)]
        offline: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(host) = cli.host {
        settings.host = host;
    }
    if cli.entity_host.is_some() {
        settings.entity_host = cli.entity_host;
    }
    if cli.org.is_some() {
        settings.org = cli.org;
    }
    settings.debug |= cli.debug;

    let Commands::Slo(command) = cli.command;

    // The report view owns stdout
    let log_format = match &command {
        SloCommands::Agent {
            report_view: false, ..
        } => LogFormat::Json,
        _ => LogFormat::Compact,
    };
    init_logging(log_format, settings.debug)?;

    let ctx = SloContext::load(settings)?;

    match command {
        SloCommands::Init { output } => {
            init::run(&output)?;
        }
        SloCommands::Sync { manifest } => {
            sync::run(&ctx, &manifest).await?;
        }
        SloCommands::Agent {
            manifest,
            interval,
            selector,
            report_view,
        } => {
            let args = agent::AgentArgs {
                manifest,
                interval,
                selector,
                report_view,
            };
            agent::run(&ctx, args).await?;
        }
        SloCommands::Report {
            manifest,
            selector,
            format,
            output,
            template,
            watch,
        } => {
            let args = report::ReportArgs {
                manifest,
                selector,
                format,
                output,
                template,
                watch,
            };
            report::run(&ctx, args).await?;
        }
        SloCommands::Related {
            manifest,
            filters,
            refresh,
            offline,
        } => {
            let args = related::RelatedArgs {
                manifest,
                filters,
                refresh,
                offline,
            };
            related::run(&ctx, args).await?;
        }
    }

    Ok(())
}
