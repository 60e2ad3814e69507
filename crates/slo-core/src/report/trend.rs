use super::model::{Report, ServiceLevelResult};

pub const ICON_MET: &str = "✓";
pub const ICON_UNMET: &str = "✕";

/// `sloIsMet` of (service, slo) across `reports`, in their order. Reports
/// without a result for it are skipped.
pub fn slo_trend(service: &str, slo: &str, reports: &[Report]) -> Vec<bool> {
    reports
        .iter()
        .filter_map(|r| r.result(service, slo))
        .map(|r| r.slo_is_met)
        .collect()
}

/// Progression of the actual value since the previous report
pub fn slo_movement(current: &ServiceLevelResult, previous: &ServiceLevelResult) -> &'static str {
    let diff = current.actual - previous.actual;
    if diff == 0.0 {
        "="
    } else if diff < 0.0 {
        "↓"
    } else if diff > 0.0 {
        "↑"
    } else {
        " "
    }
}

/// One tick per trend entry; `html` wraps each in a coloured span
pub fn trend_ticks(trend: &[bool], html: bool) -> Vec<String> {
    trend
        .iter()
        .map(|met| {
            let (icon, color) = if *met {
                (ICON_MET, "green")
            } else {
                (ICON_UNMET, "red")
            };
            if html {
                format!("<span style=\"color: {color}\">{icon}</span>")
            } else {
                icon.to_string()
            }
        })
        .collect()
}
