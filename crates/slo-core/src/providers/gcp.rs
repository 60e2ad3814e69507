//! GCP Cloud Monitoring provider
//!
//! Objectives are addressed by `gcp_project_id` and
//! `gcp_loadbalancer_name`; metrics come from the HTTPS load balancer
//! through the Monitoring v3 `timeSeries.list` REST endpoint.

use super::{percent_of, target_millis, Category, MetricsProvider, ProviderError};
use crate::duration::MachineDuration;
use crate::entities::{Indicator, Labels, Objective};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const SELECTOR_PROJECT: &str = "gcp_project_id";
pub const SELECTOR_LOADBALANCER: &str = "gcp_loadbalancer_name";

pub const DEFAULT_ENDPOINT: &str = "https://monitoring.googleapis.com";

const LATENCY_METRIC: &str = "loadbalancing.googleapis.com/https/total_latencies";
const REQUEST_COUNT_METRIC: &str = "loadbalancing.googleapis.com/https/request_count";
const ERROR_CODE_CLASS: &str = "500";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListTimeSeriesResponse {
    #[serde(default)]
    time_series: Vec<TimeSeries>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct TimeSeries {
    #[serde(default)]
    metric: MetricLabels,
    #[serde(default)]
    points: Vec<Point>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MetricLabels {
    #[serde(default)]
    labels: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
struct Point {
    value: TypedValue,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TypedValue {
    double_value: Option<f64>,
    /// int64 values are JSON strings on the wire
    int64_value: Option<serde_json::Value>,
}

impl TypedValue {
    fn as_f64(&self) -> Option<f64> {
        if let Some(v) = self.double_value {
            return Some(v);
        }
        match self.int64_value.as_ref()? {
            serde_json::Value::String(s) => s.parse().ok(),
            serde_json::Value::Number(n) => n.as_f64(),
            _ => None,
        }
    }
}

impl TimeSeries {
    fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().filter_map(|p| p.value.as_f64())
    }
}

/// How the bearer token is obtained
#[derive(Debug, Clone)]
pub enum TokenSource {
    Static(String),
    /// `gcloud auth print-access-token`
    Gcloud,
}

impl TokenSource {
    async fn token(&self) -> anyhow::Result<String> {
        match self {
            TokenSource::Static(token) => Ok(token.clone()),
            TokenSource::Gcloud => {
                let output = tokio::process::Command::new("gcloud")
                    .args(["auth", "print-access-token"])
                    .output()
                    .await
                    .context("failed to run gcloud to obtain an access token")?;
                if !output.status.success() {
                    return Err(anyhow!(
                        "gcloud auth print-access-token failed: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    ));
                }
                Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
            }
        }
    }
}

/// Aggregation parameters of one `timeSeries.list` call
struct SeriesQuery<'a> {
    project: &'a str,
    filter: String,
    alignment_secs: i64,
    aligner: &'static str,
    reducer: Option<&'static str>,
    group_by: &'static str,
}

pub struct GcpMonitoring {
    client: Client,
    base_url: Url,
    token: TokenSource,
}

impl GcpMonitoring {
    pub fn new(base_url: &str, token: TokenSource) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = Url::parse(base_url).context("Invalid monitoring endpoint")?;
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// `GCP_MONITORING_ENDPOINT` and `GOOGLE_OAUTH_ACCESS_TOKEN`, falling
    /// back to the public endpoint and gcloud credentials
    pub fn from_env() -> anyhow::Result<Self> {
        let endpoint =
            std::env::var("GCP_MONITORING_ENDPOINT").unwrap_or_else(|_| DEFAULT_ENDPOINT.to_string());
        let token = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(TokenSource::Static)
            .unwrap_or(TokenSource::Gcloud);
        Self::new(&endpoint, token)
    }

    async fn list_time_series(
        &self,
        query: &SeriesQuery<'_>,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<Vec<TimeSeries>> {
        let url = self
            .base_url
            .join(&format!("v3/projects/{}/timeSeries", query.project))
            .context("Invalid monitoring URL")?;
        let token = self.token.token().await?;

        let mut params: Vec<(&str, String)> = vec![
            ("filter", query.filter.clone()),
            ("interval.startTime", from.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("interval.endTime", to.to_rfc3339_opts(SecondsFormat::Secs, true)),
            ("aggregation.alignmentPeriod", format!("{}s", query.alignment_secs)),
            ("aggregation.perSeriesAligner", query.aligner.to_string()),
            ("aggregation.groupByFields", query.group_by.to_string()),
        ];
        if let Some(reducer) = query.reducer {
            params.push(("aggregation.crossSeriesReducer", reducer.to_string()));
        }

        let mut series = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let mut request = self
                .client
                .get(url.clone())
                .bearer_auth(&token)
                .query(&params);
            if let Some(page) = page_token.take() {
                request = request.query(&[("pageToken", page)]);
            }

            let response = request
                .send()
                .await
                .context("Failed to query cloud monitoring")?;
            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(anyhow!("cloud monitoring returned {}: {}", status, body));
            }

            let page: ListTimeSeriesResponse = response
                .json()
                .await
                .context("Failed to parse cloud monitoring response")?;
            series.extend(page.time_series);

            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }

        Ok(series)
    }

    async fn latency(
        &self,
        project: &str,
        loadbalancer: &str,
        target: MachineDuration,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, ProviderError> {
        let query = SeriesQuery {
            project,
            filter: format!(
                r#"metric.type="{LATENCY_METRIC}" AND resource.labels.url_map_name="{loadbalancer}""#
            ),
            alignment_secs: 60,
            aligner: "ALIGN_PERCENTILE_99",
            reducer: None,
            group_by: "resource.label.url_map_name",
        };
        let series = self.list_time_series(&query, from, to).await?;

        let values: Vec<f64> = series.iter().flat_map(TimeSeries::values).collect();
        let threshold = target_millis(target);
        debug!(buckets = values.len(), threshold_ms = threshold, "gcp latency buckets");

        percent_of(&values, |ms| ms < threshold)
            .ok_or_else(|| ProviderError::NoData(resource_id(project, loadbalancer)))
    }

    async fn availability(
        &self,
        project: &str,
        loadbalancer: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, ProviderError> {
        let query = SeriesQuery {
            project,
            filter: format!(
                r#"metric.type="{REQUEST_COUNT_METRIC}" AND resource.labels.url_map_name="{loadbalancer}" AND metric.label.response_code_class != 0"#
            ),
            alignment_secs: (to - from).num_seconds().max(60),
            aligner: "ALIGN_SUM",
            reducer: Some("REDUCE_SUM"),
            group_by: "metric.label.response_code_class",
        };
        let series = self.list_time_series(&query, from, to).await?;

        let mut total = 0.0;
        let mut errors = 0.0;
        for s in &series {
            let sum: f64 = s.values().sum();
            total += sum;
            if s.metric.labels.get("response_code_class").map(String::as_str) == Some(ERROR_CODE_CLASS) {
                errors += sum;
            }
        }

        if total <= 0.0 {
            return Err(ProviderError::NoData(resource_id(project, loadbalancer)));
        }
        let error_rate = errors / total * 100.0;
        debug!(total, errors, error_rate, "gcp error rate");
        Ok((100.0 - error_rate).clamp(0.0, 100.0))
    }
}

fn resource_id(project: &str, loadbalancer: &str) -> String {
    format!("{project}/google-cloud-load-balancers/{loadbalancer}")
}

#[async_trait]
impl MetricsProvider for GcpMonitoring {
    fn name(&self) -> &'static str {
        "gcp"
    }

    fn resource_from_selector(&self, selector: &Labels) -> Option<String> {
        let project = selector.get(SELECTOR_PROJECT).filter(|v| !v.is_empty())?;
        let lb = selector.get(SELECTOR_LOADBALANCER).filter(|v| !v.is_empty())?;
        Some(resource_id(project, lb))
    }

    async fn compute_objective(
        &self,
        objective: &Objective,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Indicator, ProviderError> {
        let selector = objective.selector();
        let project = selector
            .get(SELECTOR_PROJECT)
            .ok_or(ProviderError::MissingSelector(SELECTOR_PROJECT))?;
        let lb = selector
            .get(SELECTOR_LOADBALANCER)
            .ok_or(ProviderError::MissingSelector(SELECTOR_LOADBALANCER))?;

        let percent = match Category::from_selector(selector)? {
            Category::Availability => self.availability(project, lb, from, to).await?,
            Category::Latency { target } => self.latency(project, lb, target, from, to).await?,
        };

        Ok(Indicator::for_objective(objective, from, to).with_percent(percent))
    }
}
