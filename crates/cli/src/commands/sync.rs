//! `reliably slo sync`

use std::path::Path;

use anyhow::{Context, Result};
use slo_core::Manifest;
use tracing::debug;

use crate::output::print_success;

/// Upsert every objective of the manifest to the entity service
pub async fn run(ctx: &super::SloContext, manifest_path: &Path) -> Result<()> {
    let manifest = Manifest::load_from_file(manifest_path)?;
    manifest.validate()?;

    let org = ctx.org()?;
    let client = ctx.entity_client()?;

    debug!(objectives = manifest.len(), org = %org, "syncing manifest");
    client
        .sync_manifest(&org, &manifest)
        .await
        .context("an error occurred while syncing your manifest")?;

    print_success("Your manifest has been successfully synchronized");
    Ok(())
}
