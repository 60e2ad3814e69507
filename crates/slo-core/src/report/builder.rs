use super::model::{Report, Service, ServiceLevel, ServiceLevelResult, Window};
use super::ReportError;
use crate::client::ExpandedObjective;
use crate::duration::IsoDuration;
use crate::entities::{entity_id, selector, Labels, Objective, ObjectiveResult, OBJECTIVE_KIND};
use crate::manifest::Manifest;
use chrono::{DateTime, NaiveDateTime, Utc};
use std::collections::{BTreeMap, HashSet};

/// Build one report per result slot, most recent first.
///
/// Objectives are grouped by their `service` label; objectives without a
/// `name` label are skipped and services left without any service level
/// are dropped.
pub fn map_to_reports(
    objectives: &[ExpandedObjective],
    limit: usize,
    api_version: &str,
    timestamp: DateTime<Utc>,
) -> Result<Vec<Report>, ReportError> {
    let mut groups: BTreeMap<&str, Vec<&ExpandedObjective>> = BTreeMap::new();
    for expanded in objectives {
        let service = expanded.objective.service().unwrap_or_default();
        groups.entry(service).or_default().push(expanded);
    }

    let mut reports = Vec::with_capacity(limit);
    for slot in 0..limit {
        let mut report = Report::new(api_version, timestamp);

        for (service_name, members) in &groups {
            let mut service = Service {
                name: service_name.to_string(),
                service_levels: Vec::new(),
            };

            for expanded in members {
                let Some(name) = expanded.objective.name() else {
                    continue;
                };
                let Some(result) = expanded.for_each.objective_results.get(slot) else {
                    continue;
                };
                service
                    .service_levels
                    .push(service_level(name, &expanded.objective, result)?);
            }

            if service.service_levels.is_empty() {
                continue;
            }
            service.service_levels.sort_by(|a, b| a.name.cmp(&b.name));
            report.services.push(service);
        }

        reports.push(report);
    }

    Ok(reports)
}

fn service_level(
    name: &str,
    objective: &Objective,
    result: &ObjectiveResult,
) -> Result<ServiceLevel, ReportError> {
    let window_label = |label: &'static str| -> Result<DateTime<Utc>, ReportError> {
        let value = result
            .metadata
            .labels
            .get(label)
            .map(String::as_str)
            .unwrap_or_default();
        parse_time(value).ok_or_else(|| ReportError::Time {
            label,
            value: value.to_string(),
        })
    };
    let to = window_label(selector::TO)?;
    let from = window_label(selector::FROM)?;

    let spec = &result.spec;
    Ok(ServiceLevel {
        name: name.to_string(),
        kind: spec
            .indicator_selector
            .get(selector::CATEGORY)
            .cloned()
            .unwrap_or_default(),
        objective: spec.objective_percent,
        period: Some(IsoDuration::from_seconds(
            objective.spec.window.as_secs().max(0) as u64,
        )),
        result: Some(ServiceLevelResult {
            actual: spec.actual_percent,
            delta: spec.remaining_percent,
            slo_is_met: spec.remaining_percent >= 0.0,
        }),
        window: Window { from, to },
    })
}

/// Parse a window stamp: RFC-3339 (any precision), naive ISO-8601 taken
/// as UTC, or the `2006-01-02 15:04:05.999999999 -0700 MST` layout with an
/// optional `m=+...` monotonic suffix.
pub fn parse_time(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(t) = DateTime::parse_from_rfc3339(value) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc());
    }

    let without_monotonic = value.split(" m=").next().unwrap_or(value);
    let parts: Vec<&str> = without_monotonic.split_whitespace().collect();
    if parts.len() < 3 {
        return None;
    }
    let stamp = parts[..3].join(" ");
    DateTime::parse_from_str(&stamp, "%Y-%m-%d %H:%M:%S%.f %z")
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Keep the server objectives whose identity matches a manifest objective
pub fn filter_by_manifest(
    org: &str,
    api_version: &str,
    manifest: &Manifest,
    objectives: Vec<ExpandedObjective>,
) -> Vec<ExpandedObjective> {
    let kind = OBJECTIVE_KIND.to_lowercase();
    let ids: HashSet<String> = manifest
        .iter()
        .map(|o| entity_id(org, &kind, api_version, o.labels()))
        .collect();

    objectives
        .into_iter()
        .filter(|e| ids.contains(&entity_id(org, &kind, api_version, e.objective.labels())))
        .collect()
}

/// Parse `k=v,k2=v2` into labels
pub fn parse_selector(input: &str) -> Result<Labels, ReportError> {
    let mut labels = Labels::new();
    if input.trim().is_empty() {
        return Ok(labels);
    }

    for item in input.split(',') {
        let parts: Vec<&str> = item.split('=').collect();
        match parts.as_slice() {
            [key, value] => {
                labels.insert(key.to_string(), value.to_string());
            }
            _ => return Err(ReportError::Selector),
        }
    }
    Ok(labels)
}
