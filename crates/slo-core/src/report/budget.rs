//! Error budget arithmetic
//!
//! The error budget of an objective is `100 - objective` percent of its
//! window. Consumption is measured from the shortfall `100 - actual`.

use super::model::ServiceLevel;
use crate::duration::{humanize_short, MachineDuration};

const ONE_SECOND: MachineDuration = MachineDuration::from_secs(1);

/// `(1 - objective / 100) * 100`
pub fn error_budget_percent(objective: f64) -> f64 {
    (1.0 - objective / 100.0) * 100.0
}

/// Downtime allowed by `budget_percent` over `window`, whole seconds
pub fn allowed_downtime(budget_percent: f64, window: MachineDuration) -> MachineDuration {
    scale(window, budget_percent / 100.0)
}

/// Consumed and remaining budget percentages for a shortfall of
/// `100 - actual`. Remaining never goes below zero.
pub fn consumed_remaining_percent(actual: f64, budget_percent: f64) -> (f64, f64) {
    let shortfall = (100.0 - actual).abs();
    let consumed = if budget_percent <= 0.0 {
        if shortfall > 0.0 {
            100.0
        } else {
            0.0
        }
    } else {
        shortfall * 100.0 / budget_percent
    };
    (consumed, (100.0 - consumed).max(0.0))
}

fn scale(d: MachineDuration, factor: f64) -> MachineDuration {
    let nanos = (d.as_nanos() as f64 * factor).round();
    MachineDuration::from_nanos(nanos.clamp(i64::MIN as f64, i64::MAX as f64) as i64)
        .truncate(ONE_SECOND)
}

/// Error budget of one service level
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ErrorBudget {
    pub percent: f64,
    pub window: MachineDuration,
    pub allowed: MachineDuration,
    pub consumed_percent: f64,
    pub remaining_percent: f64,
    pub consumed: MachineDuration,
    pub remaining: MachineDuration,
}

impl ErrorBudget {
    /// Budget over the service level's observation window. Without a
    /// result nothing is consumed.
    pub fn for_service_level(sl: &ServiceLevel) -> Self {
        let percent = error_budget_percent(sl.objective);
        let window = sl.observation_window();
        let allowed = allowed_downtime(percent, window);

        let (consumed_percent, remaining_percent) = match sl.result {
            Some(result) => consumed_remaining_percent(result.actual, percent),
            None => (0.0, 100.0),
        };

        Self {
            percent,
            window,
            allowed,
            consumed_percent,
            remaining_percent,
            consumed: scale(allowed, consumed_percent / 100.0),
            remaining: scale(allowed, remaining_percent / 100.0),
        }
    }

    pub fn is_exceeded(&self) -> bool {
        self.consumed > self.allowed
    }

    /// `1h30m0s`, or `2h0m0s (+30m0s)` past the allowed downtime
    pub fn consumed_display(&self) -> String {
        let consumed = humanize_short(self.consumed);
        if self.is_exceeded() {
            let over = MachineDuration::from_nanos(self.consumed.as_nanos() - self.allowed.as_nanos());
            format!("{} (+{})", consumed, humanize_short(over))
        } else {
            consumed
        }
    }

    pub fn remaining_display(&self) -> String {
        humanize_short(self.remaining)
    }
}
