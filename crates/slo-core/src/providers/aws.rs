//! AWS CloudWatch provider
//!
//! Objectives are addressed by the `aws_arn` selector key. Supported
//! services are API Gateway (HTTP APIs) and Application Load Balancers.
//! CloudWatch clients are cached per region for the process lifetime.

use super::{percent_of, target_millis, Category, MetricsProvider, ProviderError};
use crate::duration::MachineDuration;
use crate::entities::{Indicator, Labels, Objective};
use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tokio::sync::OnceCell;
use tracing::debug;

pub const SELECTOR_ARN: &str = "aws_arn";

/// Latency buckets are p99 over one minute
const LATENCY_PERIOD_SECS: i32 = 60;

/// A single CloudWatch metric statistic query
#[derive(Debug, Clone, PartialEq)]
pub struct MetricQuery {
    pub id: &'static str,
    pub namespace: &'static str,
    pub metric_name: &'static str,
    pub dimension_name: &'static str,
    pub dimension_value: String,
    pub period_secs: i32,
    pub stat: &'static str,
}

/// Data points returned for one query id
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetricSeries {
    pub id: String,
    pub values: Vec<f64>,
}

/// CloudWatch `GetMetricData` seam
#[async_trait]
pub trait CloudWatchApi: Send + Sync {
    async fn get_metric_data(
        &self,
        region: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        queries: &[MetricQuery],
    ) -> anyhow::Result<Vec<MetricSeries>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AwsService {
    ApiGateway,
    LoadBalancer,
}

impl AwsService {
    fn namespace(&self) -> &'static str {
        match self {
            AwsService::ApiGateway => "AWS/ApiGateway",
            AwsService::LoadBalancer => "AWS/ApplicationELB",
        }
    }

    fn dimension_name(&self) -> &'static str {
        match self {
            AwsService::ApiGateway => "ApiId",
            AwsService::LoadBalancer => "LoadBalancer",
        }
    }

    fn latency_metric(&self) -> &'static str {
        match self {
            AwsService::ApiGateway => "Latency",
            AwsService::LoadBalancer => "TargetResponseTime",
        }
    }

    /// Factor bringing latency values to milliseconds
    fn latency_scale(&self) -> f64 {
        match self {
            AwsService::ApiGateway => 1.0,
            // TargetResponseTime is reported in seconds
            AwsService::LoadBalancer => 1000.0,
        }
    }
}

/// Parsed `arn:<partition>:<service>:<region>:<account>:<resource>`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwsResource {
    pub service: AwsService,
    pub region: String,
    pub resource: String,
}

impl AwsResource {
    pub fn parse(arn: &str) -> Result<Self, ProviderError> {
        let parts: Vec<&str> = arn.splitn(6, ':').collect();
        if parts.len() != 6 || parts[0] != "arn" || parts[2].is_empty() || parts[5].is_empty() {
            return Err(ProviderError::InvalidResource(format!(
                "'{arn}' is not a valid ARN"
            )));
        }

        let service = match parts[2] {
            "apigateway" => AwsService::ApiGateway,
            "elasticloadbalancing" => AwsService::LoadBalancer,
            other => return Err(ProviderError::UnsupportedService(other.to_string())),
        };

        Ok(Self {
            service,
            region: parts[3].to_string(),
            resource: parts[5].to_string(),
        })
    }

    /// Value of the CloudWatch dimension identifying the resource
    pub fn dimension_value(&self) -> Result<String, ProviderError> {
        let invalid = || ProviderError::InvalidResource(self.resource.clone());
        match self.service {
            AwsService::ApiGateway => self
                .resource
                .rsplit('/')
                .next()
                .filter(|id| !id.is_empty())
                .map(str::to_string)
                .ok_or_else(invalid),
            AwsService::LoadBalancer => self
                .resource
                .split_once('/')
                .map(|(_, id)| id.to_string())
                .filter(|id| !id.is_empty())
                .ok_or_else(invalid),
        }
    }

    fn query(
        &self,
        id: &'static str,
        metric_name: &'static str,
        period_secs: i32,
        stat: &'static str,
    ) -> Result<MetricQuery, ProviderError> {
        Ok(MetricQuery {
            id,
            namespace: self.service.namespace(),
            metric_name,
            dimension_name: self.service.dimension_name(),
            dimension_value: self.dimension_value()?,
            period_secs,
            stat,
        })
    }

    /// Request count and 5xx queries
    pub fn availability_queries(&self, period_secs: i32) -> Result<Vec<MetricQuery>, ProviderError> {
        match self.service {
            AwsService::ApiGateway => Ok(vec![
                self.query("requests", "Count", period_secs, "SampleCount")?,
                self.query("http_5xx_error_count", "5xx", period_secs, "Sum")?,
            ]),
            AwsService::LoadBalancer => Ok(vec![
                self.query("requests", "RequestCount", period_secs, "Sum")?,
                self.query(
                    "http_5xx_error_count",
                    "HTTPCode_Target_5XX_Count",
                    period_secs,
                    "Sum",
                )?,
                self.query("elb_5xx_error_count", "HTTPCode_ELB_5XX_Count", period_secs, "Sum")?,
            ]),
        }
    }

    pub fn latency_query(&self) -> Result<MetricQuery, ProviderError> {
        self.query(
            "latency_p99_per_min",
            self.service.latency_metric(),
            LATENCY_PERIOD_SECS,
            "p99",
        )
    }
}

/// Window truncated to whole minutes, at least one minute
pub fn period_for(from: DateTime<Utc>, to: DateTime<Utc>) -> i32 {
    let secs = (to - from).num_seconds().max(0);
    let minutes = secs / 60;
    i32::try_from((minutes * 60).max(60)).unwrap_or(i32::MAX)
}

pub struct AwsCloudWatch {
    api: Arc<dyn CloudWatchApi>,
}

impl AwsCloudWatch {
    /// Provider backed by the AWS SDK and the default credential chain
    pub fn new() -> Self {
        Self::with_api(Arc::new(SdkCloudWatch))
    }

    pub fn with_api(api: Arc<dyn CloudWatchApi>) -> Self {
        Self { api }
    }

    async fn availability(
        &self,
        resource: &AwsResource,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, ProviderError> {
        let queries = resource.availability_queries(period_for(from, to))?;
        let series = self
            .api
            .get_metric_data(&resource.region, from, to, &queries)
            .await?;

        let totals: HashMap<&str, f64> = series
            .iter()
            .map(|s| (s.id.as_str(), s.values.iter().sum::<f64>()))
            .collect();

        let requests = totals.get("requests").copied().unwrap_or(0.0);
        if requests <= 0.0 {
            return Err(ProviderError::NoData(resource.resource.clone()));
        }
        let errors = totals.get("http_5xx_error_count").copied().unwrap_or(0.0)
            + totals.get("elb_5xx_error_count").copied().unwrap_or(0.0);

        let error_rate = errors / requests * 100.0;
        debug!(requests, errors, error_rate, "cloudwatch error rate");
        Ok((100.0 - error_rate).clamp(0.0, 100.0))
    }

    async fn latency(
        &self,
        resource: &AwsResource,
        target: MachineDuration,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<f64, ProviderError> {
        let query = resource.latency_query()?;
        let series = self
            .api
            .get_metric_data(&resource.region, from, to, std::slice::from_ref(&query))
            .await?;

        let scale = resource.service.latency_scale();
        let values: Vec<f64> = series
            .into_iter()
            .filter(|s| s.id == query.id)
            .flat_map(|s| s.values)
            .map(|v| v * scale)
            .collect();

        let threshold = target_millis(target);
        percent_of(&values, |ms| ms <= threshold)
            .ok_or_else(|| ProviderError::NoData(resource.resource.clone()))
    }
}

impl Default for AwsCloudWatch {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetricsProvider for AwsCloudWatch {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn resource_from_selector(&self, selector: &Labels) -> Option<String> {
        selector.get(SELECTOR_ARN).filter(|v| !v.is_empty()).cloned()
    }

    async fn compute_objective(
        &self,
        objective: &Objective,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Indicator, ProviderError> {
        let arn = self
            .resource_from_selector(objective.selector())
            .ok_or(ProviderError::MissingSelector(SELECTOR_ARN))?;
        let resource = AwsResource::parse(&arn)?;

        let percent = match Category::from_selector(objective.selector())? {
            Category::Availability => self.availability(&resource, from, to).await?,
            Category::Latency { target } => self.latency(&resource, target, from, to).await?,
        };

        Ok(Indicator::for_objective(objective, from, to).with_percent(percent))
    }
}

static CLIENTS: OnceLock<DashMap<String, Arc<OnceCell<aws_sdk_cloudwatch::Client>>>> =
    OnceLock::new();

/// Client for `region`, loading the SDK configuration once per region
async fn client_for(region: &str) -> aws_sdk_cloudwatch::Client {
    let cell = CLIENTS
        .get_or_init(DashMap::new)
        .entry(region.to_string())
        .or_insert_with(|| Arc::new(OnceCell::new()))
        .clone();

    cell.get_or_init(|| async {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if !region.is_empty() {
            loader = loader.region(aws_sdk_cloudwatch::config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        aws_sdk_cloudwatch::Client::new(&config)
    })
    .await
    .clone()
}

/// `CloudWatchApi` over the AWS SDK
#[derive(Debug, Clone, Copy, Default)]
pub struct SdkCloudWatch;

fn to_sdk_query(q: &MetricQuery) -> aws_sdk_cloudwatch::types::MetricDataQuery {
    use aws_sdk_cloudwatch::types::{Dimension, Metric, MetricDataQuery, MetricStat};

    let dimension = Dimension::builder()
        .name(q.dimension_name)
        .value(&q.dimension_value)
        .build();
    let metric = Metric::builder()
        .namespace(q.namespace)
        .metric_name(q.metric_name)
        .dimensions(dimension)
        .build();
    let stat = MetricStat::builder()
        .metric(metric)
        .period(q.period_secs)
        .stat(q.stat)
        .build();

    MetricDataQuery::builder()
        .id(q.id)
        .metric_stat(stat)
        .return_data(true)
        .build()
}

#[async_trait]
impl CloudWatchApi for SdkCloudWatch {
    async fn get_metric_data(
        &self,
        region: &str,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        queries: &[MetricQuery],
    ) -> anyhow::Result<Vec<MetricSeries>> {
        use aws_sdk_cloudwatch::primitives::DateTime as AwsDateTime;

        let client = client_for(region).await;
        let sdk_queries: Vec<_> = queries.iter().map(to_sdk_query).collect();

        let mut collected: Vec<MetricSeries> = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let mut request = client
                .get_metric_data()
                .start_time(AwsDateTime::from_secs(from.timestamp()))
                .end_time(AwsDateTime::from_secs(to.timestamp()))
                .set_next_token(next_token.take());
            for q in &sdk_queries {
                request = request.metric_data_queries(q.clone());
            }

            let output = request
                .send()
                .await
                .context("cloudwatch GetMetricData failed")?;

            for result in output.metric_data_results() {
                let id = result.id().unwrap_or_default();
                match collected.iter_mut().find(|s| s.id == id) {
                    Some(series) => series.values.extend_from_slice(result.values()),
                    None => collected.push(MetricSeries {
                        id: id.to_string(),
                        values: result.values().to_vec(),
                    }),
                }
            }

            match output.next_token() {
                Some(token) if !token.is_empty() => next_token = Some(token.to_string()),
                _ => break,
            }
        }

        Ok(collected)
    }
}
