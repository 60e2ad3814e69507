//! Markdown and user template rendering
//!
//! Templates are rendered with handlebars against `{report, history}`,
//! HTML escaping disabled, with the `svcLevel*`/`errBudget*` helper set.

use super::budget::ErrorBudget;
use super::model::{Report, ServiceLevel};
use super::trend::{slo_trend, trend_ticks};
use super::ReportError;
use crate::duration::humanize;
use chrono::{DateTime, Utc};
use handlebars::{
    handlebars_helper, no_escape, Context, Handlebars, Helper, HelperResult, Output,
    RenderContext,
};
use serde::Serialize;
use serde_json::Value as Json;

pub const ICON_MET: &str = "✅";
pub const ICON_UNMET: &str = "❌";
pub const ICON_UNKNOWN: &str = "❔";

/// Built-in markdown report
pub const SLO_TEMPLATE: &str = r#"# Reliably SLO Report

Service Level Objectives identify what you should care about on your system. They are what good looks like for the users of your system. If an SLO is underperforming, it will be impacting your users in some way.

### Error Budget

When you define an SLO for your system, you include a target percentage for that SLO. An example target could be 95%. That leaves 5%, which is your error budget for your SLO.

Report time: {{dateTime report.timestamp}}
{{#each report.services}}

## Service #{{serviceNo @index}}: {{name}}

| | Name | Current | Objective | Time Window | Type | Trend |
|-|------|---:|---:|---:|----|:--:|
{{#each service_levels}}
|{{svcLevelGetStatusIcon this}}|{{svcLevelGetName this}}|{{svcLevelGetActualResult this}}|{{svcLevelGetObjective this}}|{{svcLevelGetTimeWindow this}}|{{svcLevelGetType this}}|{{svcLevelGetTrends ../name this @root.history}}|
{{/each}}

The Error Budget metrics are:

| Type | Name | Time Window | Error Budget | Downtime | Consumed | Remain |
|---|---|---:|---:|---:|---:|---:|
{{#each service_levels}}
|{{svcLevelGetType this}}|{{svcLevelGetName this}}|{{svcLevelGetTimeWindow this}}|{{errBudgetPercentage this}}|{{errBudgetAllowedDownTime this}}|{{errBudgetConsumed this}}|{{errBudgetRemain this}}|
{{/each}}
{{/each}}

<small>Generated with: The Reliably CLI Version {{reliablyVersion}}</small>
"#;

#[derive(Serialize)]
struct TemplateData<'a> {
    report: &'a Report,
    history: &'a [Report],
}

fn service_level(value: &Json) -> ServiceLevel {
    serde_json::from_value(value.clone()).unwrap_or_default()
}

pub fn status_icon(sl: &ServiceLevel) -> &'static str {
    match sl.is_met() {
        None => ICON_UNKNOWN,
        Some(true) => ICON_MET,
        Some(false) => ICON_UNMET,
    }
}

handlebars_helper!(date_time: |t: str| {
    DateTime::parse_from_rfc3339(t)
        .map(|t| t.with_timezone(&Utc).format("%a, %d %b %Y %H:%M:%S UTC").to_string())
        .unwrap_or_else(|_| t.to_string())
});

handlebars_helper!(service_no: |i: u64| i + 1);

handlebars_helper!(sl_status_icon: |sl: Json| status_icon(&service_level(sl)));

handlebars_helper!(sl_name: |sl: Json| service_level(sl).name);

handlebars_helper!(sl_actual: |sl: Json| {
    match service_level(sl).result {
        Some(r) => format!("{:.2}%", r.actual),
        None => "---".to_string(),
    }
});

handlebars_helper!(sl_objective: |sl: Json| format!("{}%", service_level(sl).objective));

handlebars_helper!(sl_window: |sl: Json| humanize(service_level(sl).observation_window()));

handlebars_helper!(sl_type: |sl: Json| service_level(sl).kind);

handlebars_helper!(sl_trends: |service: str, sl: Json, history: Json| {
    let history: Vec<Report> = serde_json::from_value(history.clone()).unwrap_or_default();
    if history.is_empty() {
        "n/a".to_string()
    } else {
        let trend = slo_trend(service, &service_level(sl).name, &history);
        trend_ticks(&trend, true).join(" ")
    }
});

handlebars_helper!(budget_percent: |sl: Json| {
    format!("{:.2} %", ErrorBudget::for_service_level(&service_level(sl)).percent)
});

handlebars_helper!(budget_allowed: |sl: Json| {
    ErrorBudget::for_service_level(&service_level(sl)).allowed.to_string()
});

handlebars_helper!(budget_consumed: |sl: Json| {
    ErrorBudget::for_service_level(&service_level(sl)).consumed_display()
});

handlebars_helper!(budget_remain: |sl: Json| {
    ErrorBudget::for_service_level(&service_level(sl)).remaining_display()
});

fn reliably_version(
    _: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    out.write(crate::VERSION)?;
    Ok(())
}

/// Handlebars registry with every report helper
pub fn registry() -> Handlebars<'static> {
    let mut hb = Handlebars::new();
    hb.register_escape_fn(no_escape);

    hb.register_helper("reliablyVersion", Box::new(reliably_version));
    hb.register_helper("dateTime", Box::new(date_time));
    hb.register_helper("serviceNo", Box::new(service_no));
    hb.register_helper("svcLevelGetStatusIcon", Box::new(sl_status_icon));
    hb.register_helper("svcLevelGetName", Box::new(sl_name));
    hb.register_helper("svcLevelGetActualResult", Box::new(sl_actual));
    hb.register_helper("svcLevelGetObjective", Box::new(sl_objective));
    hb.register_helper("svcLevelGetTimeWindow", Box::new(sl_window));
    hb.register_helper("svcLevelGetType", Box::new(sl_type));
    hb.register_helper("svcLevelGetTrends", Box::new(sl_trends));
    hb.register_helper("errBudgetPercentage", Box::new(budget_percent));
    hb.register_helper("errBudgetAllowedDownTime", Box::new(budget_allowed));
    hb.register_helper("errBudgetConsumed", Box::new(budget_consumed));
    hb.register_helper("errBudgetRemain", Box::new(budget_remain));
    hb
}

/// Render `template` against the report and its history (newest first)
pub fn render(template: &str, report: &Report, history: &[Report]) -> Result<String, ReportError> {
    let hb = registry();
    let data = TemplateData { report, history };
    hb.render_template(template, &data)
        .map_err(|e| ReportError::Template(e.to_string()))
}
