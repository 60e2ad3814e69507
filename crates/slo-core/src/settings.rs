//! Process settings read from `RELIABLY_*` environment variables

use anyhow::{Context, Result};
use serde::Deserialize;

pub const DEFAULT_HOST: &str = "reliably.com";

/// Environment-backed settings
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// API host (`RELIABLY_HOST`)
    #[serde(default = "default_host")]
    pub host: String,

    /// Entity service host (`RELIABLY_ENTITY_HOST`), defaults to `host`
    #[serde(default)]
    pub entity_host: Option<String>,

    /// Access token (`RELIABLY_TOKEN`)
    #[serde(default)]
    pub token: Option<String>,

    /// Organization handle (`RELIABLY_ORG`)
    #[serde(default)]
    pub org: Option<String>,

    #[serde(default)]
    pub debug: bool,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            host: default_host(),
            entity_host: None,
            token: None,
            org: None,
            debug: false,
        }
    }
}

impl Settings {
    /// Load from the process environment. `DEBUG` is read unprefixed.
    pub fn from_env() -> Result<Self> {
        let mut settings: Settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("RELIABLY"))
            .build()
            .context("failed to read RELIABLY_* environment")?
            .try_deserialize()
            .context("invalid RELIABLY_* environment")?;

        settings.debug = settings.debug || debug_from_env();
        Ok(settings)
    }

    pub fn entity_host(&self) -> &str {
        self.entity_host
            .as_deref()
            .filter(|h| !h.is_empty())
            .unwrap_or(&self.host)
    }
}

/// `DEBUG` set to anything but empty, `0` or `false`
pub fn debug_from_env() -> bool {
    std::env::var("DEBUG")
        .map(|v| !matches!(v.trim().to_ascii_lowercase().as_str(), "" | "0" | "false"))
        .unwrap_or(false)
}
