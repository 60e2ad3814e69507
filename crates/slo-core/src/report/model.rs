use crate::duration::{IsoDuration, MachineDuration};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One snapshot of every service level, for one result slot
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    #[serde(skip)]
    pub api_version: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub services: Vec<Service>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Service {
    #[serde(default)]
    pub service_levels: Vec<ServiceLevel>,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevel {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub objective: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub period: Option<IsoDuration>,
    #[serde(default)]
    pub result: Option<ServiceLevelResult>,
    #[serde(default)]
    pub window: Window,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevelResult {
    pub actual: f64,
    /// `actual - objective`
    pub delta: f64,
    pub slo_is_met: bool,
}

impl Report {
    pub fn new(api_version: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            api_version: api_version.into(),
            timestamp,
            services: Vec::new(),
        }
    }

    /// Result of `slo` in `service`, if this report has one
    pub fn result(&self, service: &str, slo: &str) -> Option<&ServiceLevelResult> {
        self.services
            .iter()
            .filter(|s| s.name == service)
            .flat_map(|s| s.service_levels.iter())
            .find(|sl| sl.name == slo)
            .and_then(|sl| sl.result.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl ServiceLevel {
    /// Observed window length, or the objective period when nothing was
    /// observed
    pub fn observation_window(&self) -> MachineDuration {
        let observed = (self.window.to - self.window.from)
            .num_nanoseconds()
            .map(MachineDuration::from_nanos)
            .unwrap_or(MachineDuration::ZERO);
        if observed.is_zero() {
            return self
                .period
                .and_then(|p| p.to_duration().ok())
                .unwrap_or(MachineDuration::ZERO);
        }
        observed
    }

    pub fn is_met(&self) -> Option<bool> {
        self.result.map(|r| r.slo_is_met)
    }
}
