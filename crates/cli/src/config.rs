//! On-disk CLI configuration (`~/.config/reliably/config.yaml`)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Credentials stored for one host
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthInfo {
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
}

/// Organization the commands act on by default
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrgInfo {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub id: Option<String>,
}

/// CLI configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Credentials keyed by host
    #[serde(default)]
    pub auths: BTreeMap<String, AuthInfo>,

    #[serde(rename = "currentOrg", default)]
    pub current_org: Option<OrgInfo>,
}

impl Config {
    /// Load the configuration file; a missing file is an empty config
    pub fn load() -> Result<Self> {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Get the configuration file path
    fn config_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("reliably").join("config.yaml"))
    }

    /// Token stored for `host`
    pub fn token_for(&self, host: &str) -> Option<&str> {
        self.auths
            .get(host)
            .and_then(|auth| auth.token.as_deref())
            .filter(|t| !t.is_empty())
    }

    pub fn current_org(&self) -> Option<&str> {
        self.current_org
            .as_ref()
            .map(|org| org.name.as_str())
            .filter(|name| !name.is_empty())
    }
}

/// `RELIABLY_TOKEN` first, then the token stored for `host`
pub fn resolve_token(env_token: Option<&str>, config: &Config, host: &str) -> Option<String> {
    env_token
        .filter(|t| !t.is_empty())
        .or_else(|| config.token_for(host))
        .map(str::to_string)
}

/// `RELIABLY_ORG` first, then the current organization
pub fn resolve_org(env_org: Option<&str>, config: &Config) -> Option<String> {
    env_org
        .filter(|o| !o.is_empty())
        .or_else(|| config.current_org())
        .map(str::to_string)
}
