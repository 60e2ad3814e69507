//! `reliably slo related`

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use slo_core::client::GraphRefresher;
use slo_core::{Manifest, NodeGraph};
use tracing::{debug, warn};

pub struct RelatedArgs {
    pub manifest: PathBuf,
    pub filters: Vec<String>,
    pub refresh: Option<u64>,
    pub offline: bool,
}

/// Print the relationship graph of the manifest objectives as JSON
pub async fn run(ctx: &super::SloContext, args: RelatedArgs) -> Result<()> {
    let org = ctx.org()?;

    if args.offline {
        let manifest = Manifest::load_from_file(&args.manifest)?;
        let graph = NodeGraph::from_objectives(&org, manifest.objectives());
        return print_graph(&graph.filter(&args.filters));
    }

    let mut refresher = GraphRefresher::new(ctx.entity_client()?, &org);

    let Some(secs) = args.refresh else {
        let manifest = Manifest::load_from_file(&args.manifest)?;
        let graph = refresher.refresh(&manifest).await?;
        return print_graph(&graph.filter(&args.filters));
    };

    let mut ticker = tokio::time::interval(Duration::from_secs(secs.max(1)));
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // The manifest is re-read on every round so edits are picked up
                let manifest = match Manifest::load_from_file(&args.manifest) {
                    Ok(m) => m,
                    Err(e) => {
                        warn!(error = %e, "error loading manifest file");
                        continue;
                    }
                };
                match refresher.refresh(&manifest).await {
                    Ok(graph) => print_graph(&graph.filter(&args.filters))?,
                    Err(e) => warn!(error = %e, "error fetching relationship data"),
                }
                debug!(hash = ?refresher.last_hash(), "graph refreshed");
            }
            _ = tokio::signal::ctrl_c() => return Ok(()),
        }
    }
}

fn print_graph(graph: &NodeGraph) -> Result<()> {
    let json = serde_json::to_string_pretty(graph).context("Failed to serialize graph")?;
    println!("{}", json);
    Ok(())
}
