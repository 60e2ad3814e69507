//! `reliably slo` subcommands

pub mod agent;
pub mod init;
pub mod related;
pub mod report;
pub mod sync;

use crate::config::{resolve_org, resolve_token, Config};
use anyhow::{bail, Result};
use slo_core::client::{ClientConfig, EntityClient};
use slo_core::Settings;
use tracing::debug;

/// Settings and stored credentials shared by the commands
pub struct SloContext {
    pub settings: Settings,
    config: Config,
}

impl SloContext {
    pub fn load(settings: Settings) -> Result<Self> {
        let config = Config::load()?;
        Ok(Self { settings, config })
    }

    /// Organization the command acts on. Missing is fatal.
    pub fn org(&self) -> Result<String> {
        match resolve_org(self.settings.org.as_deref(), &self.config) {
            Some(org) => Ok(org),
            None => bail!(
                "no current organization: log in with 'reliably auth login' or set RELIABLY_ORG"
            ),
        }
    }

    /// Entity service client, authenticated when a token is known
    pub fn entity_client(&self) -> Result<EntityClient> {
        let token = resolve_token(
            self.settings.token.as_deref(),
            &self.config,
            &self.settings.host,
        );
        if token.is_none() {
            debug!(host = %self.settings.host, "no token found, requests are unauthenticated");
        }

        let config = ClientConfig::new(self.settings.entity_host()).with_token(token);
        EntityClient::new(config)
    }
}
