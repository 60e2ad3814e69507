//! Datadog provider
//!
//! The SLI is computed from two metric queries: good events
//! (`datadog_numerator_query`) over valid events
//! (`datadog_denominator_query`). Points are paired by timestamp and the
//! per-point ratios are averaged.

use super::{MetricsProvider, ProviderError};
use crate::entities::{Indicator, Labels, Objective};
use anyhow::{anyhow, Context};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const SELECTOR_NUMERATOR: &str = "datadog_numerator_query";
pub const SELECTOR_DENOMINATOR: &str = "datadog_denominator_query";

pub const DEFAULT_SITE: &str = "datadoghq.com";

#[derive(Debug, Deserialize)]
struct ValidateResponse {
    #[serde(default)]
    valid: bool,
}

#[derive(Debug, Default, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    series: Vec<Series>,
}

#[derive(Debug, Default, Deserialize)]
struct Series {
    #[serde(default)]
    pointlist: Vec<Vec<Option<f64>>>,
}

/// `(timestamp, value)` pairs of a point list
pub type PointList = Vec<(i64, f64)>;

pub struct Datadog {
    client: Client,
    base_url: Url,
    api_key: Option<String>,
    app_key: Option<String>,
}

impl Datadog {
    pub fn new(base_url: &str, api_key: Option<String>, app_key: Option<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        let base_url = Url::parse(base_url).context("Invalid Datadog API URL")?;
        Ok(Self {
            client,
            base_url,
            api_key,
            app_key,
        })
    }

    /// `DD_API_KEY`, `DD_APP_KEY` and `DD_SITE`. Missing keys only fail at
    /// computation time.
    pub fn from_env() -> anyhow::Result<Self> {
        let site = std::env::var("DD_SITE")
            .ok()
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_SITE.to_string());
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());
        Self::new(
            &format!("https://api.{site}"),
            non_empty("DD_API_KEY"),
            non_empty("DD_APP_KEY"),
        )
    }

    fn api_key(&self) -> anyhow::Result<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| anyhow!("DD_API_KEY is not set"))
    }

    async fn validate_api_key(&self) -> anyhow::Result<()> {
        let url = self.base_url.join("api/v1/validate")?;
        let response = self
            .client
            .get(url)
            .header("DD-API-KEY", self.api_key()?)
            .send()
            .await
            .context("Failed to validate Datadog API key")?;

        let status = response.status();
        let body: ValidateResponse = response
            .json()
            .await
            .with_context(|| format!("Invalid Datadog validate response ({status})"))?;
        if !body.valid {
            return Err(anyhow!("Datadog API key is not valid"));
        }
        Ok(())
    }

    /// Points of the first series returned for `query`; null values dropped
    pub async fn query_metrics(
        &self,
        query: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> anyhow::Result<PointList> {
        let url = self.base_url.join("api/v1/query")?;
        let app_key = self
            .app_key
            .as_deref()
            .ok_or_else(|| anyhow!("DD_APP_KEY is not set"))?;

        debug!(query = %query, from = %from, to = %to, "running datadog metrics query");
        let response = self
            .client
            .get(url)
            .header("DD-API-KEY", self.api_key()?)
            .header("DD-APPLICATION-KEY", app_key)
            .query(&[
                ("from", from.timestamp().to_string()),
                ("to", to.timestamp().to_string()),
                ("query", query.to_string()),
            ])
            .send()
            .await
            .context("Failed to query Datadog metrics")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Datadog query failed with {}: {}", status, body));
        }

        let body: QueryResponse = response
            .json()
            .await
            .context("Failed to parse Datadog query response")?;
        let series = body
            .series
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("no data series retrieved for query: {query}"))?;

        Ok(series
            .pointlist
            .into_iter()
            .filter_map(|point| match point.as_slice() {
                [Some(t), Some(v)] => Some((*t as i64, *v)),
                _ => None,
            })
            .collect())
    }
}

/// Average of `numerator / denominator` over the denominator's
/// timestamps, as a percentage. Missing numerator points count as 0 and
/// zero denominators are skipped.
pub fn ratio_percent(numerator: &[(i64, f64)], denominator: &[(i64, f64)]) -> Option<f64> {
    let num: HashMap<i64, f64> = numerator.iter().copied().collect();
    let ratios: Vec<f64> = denominator
        .iter()
        .filter(|(_, d)| *d != 0.0)
        .map(|(t, d)| num.get(t).copied().unwrap_or(0.0) / d)
        .collect();

    if ratios.is_empty() {
        return None;
    }
    Some(ratios.iter().sum::<f64>() / ratios.len() as f64 * 100.0)
}

#[async_trait]
impl MetricsProvider for Datadog {
    fn name(&self) -> &'static str {
        "datadog"
    }

    /// Queries are not tied to a single resource
    fn resource_from_selector(&self, _selector: &Labels) -> Option<String> {
        None
    }

    fn can_handle_selector(&self, selector: &Labels) -> bool {
        [SELECTOR_NUMERATOR, SELECTOR_DENOMINATOR]
            .iter()
            .all(|key| selector.get(*key).map(|v| !v.is_empty()).unwrap_or(false))
    }

    async fn compute_objective(
        &self,
        objective: &Objective,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Indicator, ProviderError> {
        let selector = objective.selector();
        let numerator_query = selector
            .get(SELECTOR_NUMERATOR)
            .ok_or(ProviderError::MissingSelector(SELECTOR_NUMERATOR))?;
        let denominator_query = selector
            .get(SELECTOR_DENOMINATOR)
            .ok_or(ProviderError::MissingSelector(SELECTOR_DENOMINATOR))?;

        self.validate_api_key().await?;

        let numerator = self.query_metrics(numerator_query, from, to).await?;
        let denominator = self.query_metrics(denominator_query, from, to).await?;

        let percent = ratio_percent(&numerator, &denominator)
            .ok_or_else(|| ProviderError::NoData(denominator_query.clone()))?;

        Ok(Indicator::for_objective(objective, from, to).with_percent(percent))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::duration::MachineDuration;
    use crate::entities::{labels, ObjectiveSpec};
    use chrono::TimeZone;
    use mockito::Matcher;

    fn objective() -> Objective {
        Objective::new(
            labels([("service", "checkout"), ("name", "success")]),
            ObjectiveSpec {
                indicator_selector: labels([
                    ("datadog_numerator_query", "sum:requests.ok{*}"),
                    ("datadog_denominator_query", "sum:requests.total{*}"),
                ]),
                objective_percent: 90.0,
                window: MachineDuration::from_hours(1),
            },
        )
    }

    fn range() -> (DateTime<Utc>, DateTime<Utc>) {
        let to = Utc.with_ymd_and_hms(2021, 6, 1, 11, 0, 0).unwrap();
        (to - chrono::Duration::hours(1), to)
    }

    #[test]
    fn test_ratio_percent_pairs_by_timestamp() {
        let good = vec![(1, 95.0), (2, 90.0)];
        let total = vec![(1, 100.0), (2, 100.0)];
        let p = ratio_percent(&good, &total).unwrap();
        assert!((p - 92.5).abs() < 1e-9);
    }

    #[test]
    fn test_ratio_percent_missing_numerator_is_zero() {
        let good = vec![(1, 50.0)];
        let total = vec![(1, 100.0), (2, 100.0), (3, 0.0)];
        let p = ratio_percent(&good, &total).unwrap();
        assert!((p - 25.0).abs() < 1e-9);

        assert!(ratio_percent(&good, &[]).is_none());
        assert!(ratio_percent(&good, &[(1, 0.0)]).is_none());
    }

    #[test]
    fn test_can_handle_selector_requires_both_queries() {
        let dd = Datadog::new("https://api.datadoghq.com", None, None).unwrap();
        assert!(dd.can_handle_selector(objective().selector()));
        assert!(!dd.can_handle_selector(&labels([("datadog_numerator_query", "q")])));
        assert!(!dd.can_handle_selector(&labels([
            ("datadog_numerator_query", "q"),
            ("datadog_denominator_query", "")
        ])));
        assert!(dd.resource_from_selector(objective().selector()).is_none());
    }

    #[tokio::test]
    async fn test_compute_objective_from_queries() {
        let mut server = mockito::Server::new_async().await;
        let validate = server
            .mock("GET", "/api/v1/validate")
            .match_header("DD-API-KEY", "api")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"valid": true}"#)
            .create_async()
            .await;
        let numerator = server
            .mock("GET", Matcher::Regex(r"^/api/v1/query".to_string()))
            .match_query(Matcher::UrlEncoded("query".into(), "sum:requests.ok{*}".into()))
            .match_header("DD-APPLICATION-KEY", "app")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"series": [{"pointlist": [[1000.0, 95.0], [2000.0, 90.0], [3000.0, null]]}]}"#)
            .create_async()
            .await;
        let denominator = server
            .mock("GET", Matcher::Regex(r"^/api/v1/query".to_string()))
            .match_query(Matcher::UrlEncoded("query".into(), "sum:requests.total{*}".into()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"series": [{"pointlist": [[1000.0, 100.0], [2000.0, 100.0]]}]}"#)
            .create_async()
            .await;

        let dd = Datadog::new(&server.url(), Some("api".into()), Some("app".into())).unwrap();
        let (from, to) = range();
        let indicator = dd.compute_objective(&objective(), from, to).await.unwrap();

        validate.assert_async().await;
        numerator.assert_async().await;
        denominator.assert_async().await;
        assert!((indicator.spec.percent - 92.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_invalid_api_key_fails() {
        let mut server = mockito::Server::new_async().await;
        let _validate = server
            .mock("GET", "/api/v1/validate")
            .with_status(403)
            .with_header("content-type", "application/json")
            .with_body(r#"{"errors": ["Forbidden"]}"#)
            .create_async()
            .await;

        let dd = Datadog::new(&server.url(), Some("bad".into()), Some("app".into())).unwrap();
        let (from, to) = range();
        let err = dd.compute_objective(&objective(), from, to).await.unwrap_err();
        assert!(err.to_string().contains("not valid"));
    }

    #[tokio::test]
    async fn test_missing_api_key_fails() {
        let dd = Datadog::new("http://127.0.0.1:9", None, None).unwrap();
        let (from, to) = range();
        let err = dd.compute_objective(&objective(), from, to).await.unwrap_err();
        assert!(err.to_string().contains("DD_API_KEY"));
    }

    #[tokio::test]
    async fn test_empty_series_fails() {
        let mut server = mockito::Server::new_async().await;
        let _validate = server
            .mock("GET", "/api/v1/validate")
            .with_status(200)
            .with_body(r#"{"valid": true}"#)
            .create_async()
            .await;
        let _query = server
            .mock("GET", Matcher::Regex(r"^/api/v1/query".to_string()))
            .with_status(200)
            .with_body(r#"{"series": []}"#)
            .create_async()
            .await;

        let dd = Datadog::new(&server.url(), Some("api".into()), Some("app".into())).unwrap();
        let (from, to) = range();
        let err = dd.compute_objective(&objective(), from, to).await.unwrap_err();
        assert!(err.to_string().contains("no data series"));
    }
}
