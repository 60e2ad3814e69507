//! Entity service HTTP client
//!
//! Thin JSON client for the `entities/{org}/{version}/...` API used to push
//! objectives and indicators, query objective results and fetch the
//! relationship graph. `org` is the organisation name.

mod refresher;
mod sink;


pub use refresher::GraphRefresher;
pub use sink::EntityIndicatorSink;

use crate::entities::{
    format_labels, selector, Entity, Labels, NodeGraph, Objective, ObjectiveResult, OBJECTIVE_KIND,
};
use crate::manifest::Manifest;
use anyhow::Context;
use reqwest::{header, Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, warn};
use url::Url;

/// Default timeout for entity service calls
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Objectives requested per query
pub const QUERY_LIMIT: usize = 50;

/// Non-2xx answer from the entity service
#[derive(Debug, Clone, PartialEq)]
pub struct HttpError {
    pub status: u16,
    pub url: String,
    pub message: String,
}

impl fmt::Display for HttpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "HTTP {} ({})", self.status, self.url)
        } else {
            write!(f, "HTTP {}: {} ({})", self.status, self.message, self.url)
        }
    }
}

impl std::error::Error for HttpError {}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid request path: {0} is empty")]
    InvalidPath(&'static str),

    #[error("no entities found in manifest")]
    EmptyManifest,

    #[error("manifest sync failed")]
    ManifestSync,
}

/// Entity service connection settings
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Host name, optionally with a port
    pub host: String,
    /// Bearer token
    pub token: Option<String>,
    pub timeout: Duration,
    pub user_agent: String,
}

impl ClientConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Default::default()
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: crate::settings::DEFAULT_HOST.to_string(),
            token: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: format!("Reliably CLI v{}", crate::VERSION),
        }
    }
}

/// Base URL of a host; plain HTTP for local development hosts
pub fn base_http_url(host: &str) -> String {
    if host.contains("127.0.0.1") || host.contains("localhost") {
        format!("http://{host}/")
    } else {
        format!("https://{host}/")
    }
}

/// `entities/{org}/{version}/{kind}`, lower-cased version and kind
pub fn request_path(org: &str, version: &str, kind: &str) -> Result<String, ClientError> {
    if org.is_empty() {
        return Err(ClientError::InvalidPath("org"));
    }
    if version.is_empty() {
        return Err(ClientError::InvalidPath("version"));
    }
    if kind.is_empty() {
        return Err(ClientError::InvalidPath("kind"));
    }
    Ok(format!(
        "entities/{}/{}/{}",
        org,
        version.to_lowercase(),
        kind.to_lowercase()
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryBody {
    pub kind: String,
    pub limit: usize,
    pub labels: Labels,
    #[serde(rename = "forEach")]
    pub for_each: ForEach,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForEach {
    #[serde(rename = "objectiveResult")]
    pub objective_result: ObjectiveResultQuery,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectiveResultQuery {
    pub include: bool,
    pub limit: usize,
}

impl QueryBody {
    /// Objectives matching `labels`, each with its last `results` results
    pub fn objectives(labels: Labels, results: usize) -> Self {
        Self {
            kind: OBJECTIVE_KIND.to_lowercase(),
            limit: QUERY_LIMIT,
            labels,
            for_each: ForEach {
                objective_result: ObjectiveResultQuery {
                    include: true,
                    limit: results,
                },
            },
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub objectives: Vec<ExpandedObjective>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpandedObjective {
    pub objective: Objective,
    #[serde(rename = "forEach", default)]
    pub for_each: ForEachResponse,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ForEachResponse {
    #[serde(rename = "objectiveResults", default)]
    pub objective_results: Vec<ObjectiveResult>,
}

/// Client for the entity service
#[derive(Clone)]
pub struct EntityClient {
    client: Client,
    base_url: Url,
    token: Option<String>,
}

impl EntityClient {
    pub fn new(config: ClientConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(&base_http_url(&config.host)).context("Invalid entity host")?;

        Ok(Self {
            client,
            base_url,
            token: config.token,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Send a JSON request. 204 and empty bodies decode to `None`.
    async fn request<B, T>(&self, method: Method, path: &str, body: &B) -> Result<Option<T>, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self
            .base_url
            .join(path)
            .map_err(|_| ClientError::InvalidPath("path"))?;
        debug!(method = %method, url = %url, "entity service request");

        let mut request = self
            .client
            .request(method, url.clone())
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(serde_json::to_vec(body)?);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(http_error(response, url).await.into());
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(None);
        }
        Ok(Some(serde_json::from_slice(&bytes)?))
    }

    /// Create or update an entity; the service keys it on its identity hash
    pub async fn upsert_entity<E>(&self, org: &str, entity: &E) -> Result<(), ClientError>
    where
        E: Entity + Serialize + Sync,
    {
        let path = request_path(org, entity.api_version(), entity.kind())?;
        self.request::<E, serde_json::Value>(Method::PUT, &path, entity)
            .await?;
        Ok(())
    }

    /// Objectives with their most recent results
    pub async fn query(
        &self,
        org: &str,
        version: &str,
        body: &QueryBody,
    ) -> Result<QueryResponse, ClientError> {
        let path = request_path(org, version, "query")?;
        Ok(self
            .request(Method::POST, &path, body)
            .await?
            .unwrap_or_default())
    }

    /// Relationship graph of the manifest objectives
    pub async fn related(&self, org: &str, manifest: &Manifest) -> Result<NodeGraph, ClientError> {
        let first = manifest.iter().next().ok_or(ClientError::EmptyManifest)?;
        let path = request_path(org, first.api_version(), first.kind())?;
        Ok(self
            .request(Method::POST, &format!("{path}/relatedto"), manifest)
            .await?
            .unwrap_or_default())
    }

    /// Upsert every objective concurrently. Individual failures are logged
    /// and reported as a single [`ClientError::ManifestSync`].
    pub async fn sync_manifest(&self, org: &str, manifest: &Manifest) -> Result<(), ClientError> {
        let mut tasks = JoinSet::new();

        for objective in manifest.iter().cloned() {
            let client = self.clone();
            let org = org.to_string();
            tasks.spawn(async move {
                debug!(objective = %format_labels(objective.labels()), "syncing objective");
                client.upsert_entity(&org, &objective).await.map_err(|e| {
                    let name = objective
                        .labels()
                        .get(selector::NAME)
                        .cloned()
                        .unwrap_or_default();
                    format!("error syncing manifest object: {name} - {e}")
                })
            });
        }

        if !all_synced(tasks).await {
            return Err(ClientError::ManifestSync);
        }
        Ok(())
    }
}

/// Wait for every upsert task; false when any failed or was aborted
async fn all_synced(mut tasks: JoinSet<Result<(), String>>) -> bool {
    let mut synced = true;
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!(error = %e, "failed to sync objective");
                synced = false;
            }
            Err(e) => {
                warn!(error = %e, "objective sync task failed");
                synced = false;
            }
        }
    }
    synced
}

async fn http_error(response: reqwest::Response, url: Url) -> HttpError {
    let status = response.status();
    let is_json = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(is_json_content_type)
        .unwrap_or(false);

    let message = if is_json {
        match response.text().await {
            Ok(body) => body,
            Err(e) => e.to_string(),
        }
    } else {
        status.to_string()
    };

    HttpError {
        status: status.as_u16(),
        url: url.to_string(),
        message,
    }
}

fn is_json_content_type(value: &str) -> bool {
    let mime = value.split(';').next().unwrap_or_default().trim();
    mime.ends_with("/json") || mime.ends_with("+json")
}
