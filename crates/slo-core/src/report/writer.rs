//! Report renderings
//!
//! Every format renders to a `String`; callers decide whether it goes to
//! stdout or a file.

use super::model::{Report, ServiceLevel};
use super::template;
use super::trend::{slo_movement, slo_trend, trend_ticks, ICON_MET, ICON_UNMET};
use super::ReportError;
use crate::duration::humanize_short;
use colored::Colorize;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::str::FromStr;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::warn;

const MAX_NAME_WIDTH: usize = 78;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Format {
    Text,
    Json,
    Yaml,
    #[default]
    Table,
    Markdown,
    Template,
}

impl Format {
    pub const SUPPORTED: [&'static str; 6] = ["json", "yaml", "text", "table", "markdown", "template"];

    /// Legacy names and their replacement
    pub const DEPRECATED: [(&'static str, &'static str); 2] = [("simple", "text"), ("tabbed", "table")];

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Table => "table",
            Format::Markdown => "markdown",
            Format::Template => "template",
        }
    }

    pub fn is_deprecated(name: &str) -> bool {
        Self::DEPRECATED
            .iter()
            .any(|(old, _)| old.eq_ignore_ascii_case(name))
    }
}

impl FromStr for Format {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" | "simple" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            "yaml" => Ok(Format::Yaml),
            "" | "table" | "tabbed" => Ok(Format::Table),
            "markdown" => Ok(Format::Markdown),
            "template" => Ok(Format::Template),
            other => Err(ReportError::UnknownFormat(other.to_string())),
        }
    }
}

/// A format paired with its destination; stdout when `path` is `None`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOutput {
    pub format: Format,
    pub path: Option<PathBuf>,
}

/// Pair comma-separated `--format` and `--output` values by index.
///
/// A template implies the `template` format.
pub fn parse_outputs(
    formats: &str,
    outputs: &str,
    has_template: bool,
) -> Result<Vec<ReportOutput>, ReportError> {
    let formats = if has_template { "template" } else { formats };
    let format_list: Vec<&str> = formats.split(',').map(str::trim).collect();
    let path_list: Vec<&str> = if outputs.trim().is_empty() {
        Vec::new()
    } else {
        outputs.split(',').map(str::trim).collect()
    };

    let mut parsed = Vec::with_capacity(format_list.len());
    for name in &format_list {
        let format: Format = name.parse()?;
        if Format::is_deprecated(name) {
            warn!(
                format = %name,
                "Format '{}' is now deprecated and soon be to removed. Use one of the supported formats: {:?}",
                name,
                Format::SUPPORTED
            );
        }
        parsed.push(format);
    }

    if parsed.len() > 1 && path_list.is_empty() {
        return Err(ReportError::InvalidOutputs(
            "Multiple output formats must be used in combination with multiple output path '--output o1,o2,...' flag",
        ));
    }
    if parsed.len() == 1 && format_list[0] == Format::Table.as_str() && path_list.len() > 1 {
        return Err(ReportError::InvalidOutputs(
            "Each output file specified with '--output' must have a format defined with '--format f1,f2,...'",
        ));
    }
    if !path_list.is_empty() && parsed.len() != path_list.len() {
        return Err(ReportError::InvalidOutputs(
            "Flags '--format' and '--output' must have same number of values when combined",
        ));
    }

    Ok(parsed
        .into_iter()
        .enumerate()
        .map(|(i, format)| ReportOutput {
            format,
            path: path_list
                .get(i)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        })
        .collect())
}

/// Render `report` in `format`.
///
/// `history` holds the reports newest first, `history[0]` being `report`
/// itself. `template` replaces the built-in markdown template.
pub fn render(
    format: Format,
    report: &Report,
    history: &[Report],
    template: Option<&str>,
) -> Result<String, ReportError> {
    match format {
        Format::Json => Ok(serde_json::to_string_pretty(report)? + "\n"),
        Format::Yaml => Ok(serde_yaml::to_string(report)?),
        Format::Text => Ok(render_text(report)),
        Format::Table => Ok(render_table(report, history)),
        Format::Markdown => template::render(template::SLO_TEMPLATE, report, history),
        Format::Template => {
            template::render(template.unwrap_or(template::SLO_TEMPLATE), report, history)
        }
    }
}

/// `Service #N: name` for named services
fn service_header(count: &mut usize, name: &str) -> Option<String> {
    if name.trim().is_empty() {
        return None;
    }
    *count += 1;
    Some(format!("Service #{}: {}", count, name))
}

pub fn render_text(report: &Report) -> String {
    let mut out = String::new();
    let mut count = 0;

    for (i, service) in report.services.iter().enumerate() {
        if let Some(header) = service_header(&mut count, &service.name) {
            let _ = writeln!(out, "{}", header.yellow());
        }

        for sl in &service.service_levels {
            match &sl.result {
                None => {
                    let _ = writeln!(out, "{} {}", "?".yellow(), sl.name.dimmed());
                }
                Some(result) => {
                    let icon = if result.slo_is_met {
                        ICON_MET.green()
                    } else {
                        ICON_UNMET.red()
                    };
                    let _ = writeln!(
                        out,
                        "{} {}: {:.2}% [objective: {}% / {}, delta: {:.2}%, type: {}]",
                        icon,
                        sl.name,
                        result.actual,
                        sl.objective,
                        humanize_short(sl.observation_window()),
                        result.delta,
                        sl.kind
                    );
                }
            }
        }

        if i + 1 < report.services.len() {
            out.push('\n');
        }
    }

    out
}

/// Row for the report table
#[derive(Tabled)]
struct ServiceLevelRow {
    #[tabled(rename = "")]
    name: String,
    #[tabled(rename = "Current")]
    current: String,
    #[tabled(rename = "Objective")]
    objective: String,
    #[tabled(rename = "/ Time Window")]
    window: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Trend")]
    trend: String,
}

impl ServiceLevelRow {
    fn header(text: String) -> Self {
        Self {
            name: text,
            current: String::new(),
            objective: String::new(),
            window: String::new(),
            kind: String::new(),
            trend: String::new(),
        }
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(3)).collect();
    out.push_str("...");
    out
}

fn row_for(service: &str, sl: &ServiceLevel, history: &[Report]) -> ServiceLevelRow {
    let name = truncate(&sl.name, MAX_NAME_WIDTH);
    let window = format!("/ {}", humanize_short(sl.observation_window()));
    let objective = format!("{}%", sl.objective);

    let Some(result) = &sl.result else {
        return ServiceLevelRow {
            name: format!("? {}", name).dimmed().to_string(),
            current: "---".dimmed().to_string(),
            objective: objective.dimmed().to_string(),
            window: window.dimmed().to_string(),
            kind: title_case(&sl.kind).dimmed().to_string(),
            trend: String::new(),
        };
    };

    let (icon, actual) = if result.slo_is_met {
        (ICON_MET, format!("{:.2}%", result.actual).green().bold())
    } else {
        (ICON_UNMET, format!("{:.2}%", result.actual).red().bold())
    };

    let movement = history
        .get(1)
        .and_then(|previous| previous.result(service, &sl.name))
        .map(|previous| slo_movement(result, previous))
        .unwrap_or(" ");

    let trend = if history.is_empty() {
        String::new()
    } else {
        trend_ticks(&slo_trend(service, &sl.name, history), false).join(" ")
    };

    ServiceLevelRow {
        name: format!("{} {}", icon, name),
        current: format!("{} {}", actual, movement),
        objective,
        window,
        kind: title_case(&sl.kind),
        trend,
    }
}

pub fn render_table(report: &Report, history: &[Report]) -> String {
    let mut rows = Vec::new();
    let mut count = 0;

    for (i, service) in report.services.iter().enumerate() {
        let header = service_header(&mut count, &service.name).unwrap_or_default();
        rows.push(ServiceLevelRow::header(header));

        for sl in &service.service_levels {
            rows.push(row_for(&service.name, sl, history));
        }

        if i + 1 < report.services.len() {
            rows.push(ServiceLevelRow::header(String::new()));
        }
    }

    let mut out = Table::new(rows).with(Style::blank()).to_string();
    out.push('\n');
    out
}
