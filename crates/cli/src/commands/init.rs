//! `reliably slo init`
//!
//! Interactive authoring of a manifest: services, their objectives and the
//! provider selectors the agent needs to compute indicators.

use std::path::Path;

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input, Select};
use slo_core::duration::humanize;
use slo_core::entities::{selector, Labels, Objective, ObjectiveSpec};
use slo_core::providers::{aws, datadog, gcp};
use slo_core::{IsoDuration, Manifest, MachineDuration};
use tracing::debug;

use crate::output::print_success;

const PROVIDERS: [(&str, &str); 3] = [
    ("Amazon Web Services", "aws"),
    ("Datadog", "datadog"),
    ("Google Cloud Platform", "gcp"),
];

const WINDOWS: [&str; 5] = ["1 hour", "1 day", "1 week", "1 month", "custom"];

const MAX_WINDOW: MachineDuration = MachineDuration::from_hours(24 * 365);

/// Prompt for services and objectives and write them to `manifest_path`
pub fn run(manifest_path: &Path) -> Result<()> {
    let theme = ColorfulTheme::default();

    debug!(path = %manifest_path.display(), "checking for existing service manifest");
    if manifest_path.exists() {
        let overwrite = Confirm::with_theme(&theme)
            .with_prompt(format!(
                "Existing local manifest detected ({}); Do you want to overwrite it?",
                manifest_path.display()
            ))
            .default(false)
            .interact()?;
        if !overwrite {
            return Ok(());
        }
    }

    let mut objectives = Vec::new();
    loop {
        let service: String = Input::with_theme(&theme)
            .with_prompt("What is the name of the service you want to declare SLOs for?")
            .interact_text()?;

        objectives.extend(prompt_objectives(&theme, &service)?);
        println!("{}", format!("Service '{}' added", service).green());
        println!();

        if !Confirm::with_theme(&theme)
            .with_prompt("Do you want to add another Service?")
            .default(false)
            .interact()?
        {
            break;
        }
    }

    let manifest = Manifest::new(objectives);
    std::fs::write(manifest_path, manifest.to_yaml()?)
        .with_context(|| format!("Failed to write manifest {}", manifest_path.display()))?;

    println!();
    print_success(&format!(
        "Your manifest has been saved to {}",
        manifest_path.display()
    ));
    Ok(())
}

fn prompt_objectives(theme: &ColorfulTheme, service: &str) -> Result<Vec<Objective>> {
    let mut objectives = Vec::new();

    loop {
        let (provider, mut indicator_selector) = prompt_provider(theme)?;

        let objective_percent: f64 = Input::with_theme(theme)
            .with_prompt("What is your target for this SLO (in %)?")
            .validate_with(|v: &f64| -> Result<(), &str> {
                if (0.0..=100.0).contains(v) {
                    Ok(())
                } else {
                    Err("The target must be between 0 and 100")
                }
            })
            .interact_text()?;

        if provider != "datadog" {
            let categories = ["Availability", "Latency"];
            let choice = Select::with_theme(theme)
                .with_prompt("What type of SLO do you want to declare?")
                .items(&categories)
                .default(0)
                .interact()?;
            let category = categories[choice].to_lowercase();

            if category == selector::LATENCY {
                let threshold: u64 = Input::with_theme(theme)
                    .with_prompt("What is your latency threshold (in milliseconds)?")
                    .interact_text()?;
                indicator_selector.insert(selector::LATENCY_TARGET.to_string(), format!("{threshold}ms"));
                indicator_selector.insert(selector::PERCENTILE.to_string(), "99".to_string());
            }
            indicator_selector.insert(selector::CATEGORY.to_string(), category);
        }

        let window = prompt_window(theme)?;
        let mut objective = Objective::new(
            Labels::new(),
            ObjectiveSpec {
                indicator_selector,
                objective_percent,
                window,
            },
        );

        let name: String = Input::with_theme(theme)
            .with_prompt("What is the name of this SLO?")
            .default(default_slo_name(&objective))
            .interact_text()?;

        objective.metadata.name = Some(name.clone());
        objective
            .metadata
            .labels
            .insert(selector::NAME.to_string(), name.clone());
        objective
            .metadata
            .labels
            .insert(selector::SERVICE.to_string(), service.to_string());
        objectives.push(objective);

        println!(
            "{}",
            format!("SLO '{}' added to Service '{}'", name, service).green()
        );
        println!();

        if !Confirm::with_theme(theme)
            .with_prompt("Do you want to add another SLO?")
            .default(false)
            .interact()?
        {
            return Ok(objectives);
        }
    }
}

/// Provider tag and the selector keys locating the measured resource
fn prompt_provider(theme: &ColorfulTheme) -> Result<(&'static str, Labels)> {
    let names: Vec<&str> = PROVIDERS.iter().map(|(name, _)| *name).collect();
    let choice = Select::with_theme(theme)
        .with_prompt("Which cloud provider are you targeting?")
        .items(&names)
        .default(0)
        .interact()?;
    let provider = PROVIDERS[choice].1;

    let mut labels = Labels::new();
    match provider {
        "aws" => {
            let arn: String = Input::with_theme(theme)
                .with_prompt("What is the ARN of the API Gateway or Load Balancer?")
                .validate_with(|v: &String| {
                    aws::AwsResource::parse(v)
                        .map(|_| ())
                        .map_err(|e| e.to_string())
                })
                .interact_text()?;
            labels.insert(aws::SELECTOR_ARN.to_string(), arn);
        }
        "gcp" => {
            let project: String = Input::with_theme(theme)
                .with_prompt("What is the ID of the GCP project?")
                .interact_text()?;
            let lb: String = Input::with_theme(theme)
                .with_prompt("What is the name of the load balancer?")
                .interact_text()?;
            labels.insert(gcp::SELECTOR_PROJECT.to_string(), project);
            labels.insert(gcp::SELECTOR_LOADBALANCER.to_string(), lb);
        }
        _ => {
            let numerator: String = Input::with_theme(theme)
                .with_prompt("What is the Datadog numerator query (good events)?")
                .interact_text()?;
            let denominator: String = Input::with_theme(theme)
                .with_prompt("What is the Datadog denominator query (total events)?")
                .interact_text()?;
            labels.insert(datadog::SELECTOR_NUMERATOR.to_string(), numerator);
            labels.insert(datadog::SELECTOR_DENOMINATOR.to_string(), denominator);
        }
    }

    Ok((provider, labels))
}

fn prompt_window(theme: &ColorfulTheme) -> Result<MachineDuration> {
    let choice = Select::with_theme(theme)
        .with_prompt("What is your observation window for this SLO?")
        .items(&WINDOWS)
        .default(0)
        .interact()?;

    if let Some(window) = preset_window(choice) {
        return Ok(window);
    }

    let custom: String = Input::with_theme(theme)
        .with_prompt("Define your custom observation window")
        .validate_with(|v: &String| parse_custom_window(v).map(|_| ()))
        .interact_text()?;
    parse_custom_window(&custom).map_err(anyhow::Error::msg)
}

fn preset_window(choice: usize) -> Option<MachineDuration> {
    match choice {
        0 => Some(MachineDuration::from_hours(1)),
        1 => Some(MachineDuration::from_hours(24)),
        2 => Some(MachineDuration::from_hours(24 * 7)),
        3 => Some(MachineDuration::from_hours(24 * 30)),
        _ => None,
    }
}

/// ISO-8601 window with minute precision, non-zero and at most one year
fn parse_custom_window(input: &str) -> Result<MachineDuration, String> {
    let iso: IsoDuration = input
        .trim()
        .parse()
        .map_err(|e| format!("Unable to parse your string: {e}"))?;
    if iso.seconds % 60 != 0 {
        return Err(
            "We only support precision to 1 minute. If used, seconds must be a multiple of 60."
                .to_string(),
        );
    }

    let window = iso
        .to_duration()
        .map_err(|_| "Your duration cannot exceed 1 year.".to_string())?;
    if window.is_zero() {
        return Err("Your duration cannot be zero. Please check your format.".to_string());
    }
    if window > MAX_WINDOW {
        return Err("Your duration cannot exceed 1 year.".to_string());
    }
    Ok(window)
}

/// `99.5% of requests faster than 250ms over last 1 day`
fn default_slo_name(objective: &Objective) -> String {
    let spec = &objective.spec;
    let desc = match objective.category() {
        Some(selector::LATENCY) => {
            let threshold = spec
                .indicator_selector
                .get(selector::LATENCY_TARGET)
                .cloned()
                .unwrap_or_default();
            if threshold.ends_with("ms") {
                format!("faster than {threshold}")
            } else {
                format!("faster than {threshold}ms")
            }
        }
        Some(selector::AVAILABILITY) => "successful".to_string(),
        _ => String::new(),
    };

    format!(
        "{}% of requests {} over last {}",
        spec.objective_percent,
        desc,
        humanize(spec.window)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use slo_core::entities::labels;

    fn objective(selector: Labels, percent: f64, window: MachineDuration) -> Objective {
        Objective::new(
            Labels::new(),
            ObjectiveSpec {
                indicator_selector: selector,
                objective_percent: percent,
                window,
            },
        )
    }

    #[test]
    fn test_default_slo_name() {
        let latency = objective(
            labels([("category", "latency"), ("latency_target", "250ms")]),
            99.5,
            MachineDuration::from_hours(24),
        );
        assert_eq!(
            default_slo_name(&latency),
            "99.5% of requests faster than 250ms over last 1 day"
        );

        let availability = objective(
            labels([("category", "availability")]),
            99.0,
            MachineDuration::from_hours(1),
        );
        assert_eq!(
            default_slo_name(&availability),
            "99% of requests successful over last 1 hour"
        );
    }

    #[test]
    fn test_preset_windows() {
        assert_eq!(preset_window(0), Some(MachineDuration::from_hours(1)));
        assert_eq!(preset_window(3), Some(MachineDuration::from_hours(720)));
        assert_eq!(preset_window(4), None);
    }

    #[test]
    fn test_custom_window() {
        assert_eq!(
            parse_custom_window("pt90m").unwrap(),
            MachineDuration::from_mins(90)
        );
        assert_eq!(
            parse_custom_window("P2W").unwrap(),
            MachineDuration::from_hours(24 * 14)
        );
        assert!(parse_custom_window("PT30S").unwrap_err().contains("precision to 1 minute"));
        assert!(parse_custom_window("PT0M").unwrap_err().contains("cannot be zero"));
        assert!(parse_custom_window("P2Y").unwrap_err().contains("exceed 1 year"));
        assert!(parse_custom_window("3 days").unwrap_err().starts_with("Unable to parse"));
    }
}
