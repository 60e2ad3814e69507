//! Duration codecs
//!
//! Two wire representations are supported:
//! - [`MachineDuration`]: a nanosecond span written in the compact
//!   `72h45m30.123s` notation. Decodes from that notation or from a bare
//!   number of nanoseconds.
//! - [`IsoDuration`]: an ISO-8601 period such as `P1DT2H`. Decoding is
//!   case-insensitive, encoding is always upper case.
//!
//! Both encode as strings in JSON and YAML.

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

const NANOS_PER_MICRO: u64 = 1_000;
const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;
const SECS_PER_MIN: u64 = 60;
const SECS_PER_HOUR: u64 = 3_600;
const SECS_PER_DAY: u64 = 86_400;
const SECS_PER_WEEK: u64 = 7 * SECS_PER_DAY;
const SECS_PER_MONTH: u64 = 30 * SECS_PER_DAY;
const SECS_PER_YEAR: u64 = 365 * SECS_PER_DAY;

/// Errors raised while decoding a duration
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DurationError {
    #[error("invalid duration {0:?}")]
    Invalid(String),

    #[error("invalid duration {0:?}: missing unit")]
    MissingUnit(String),

    #[error("invalid duration {input:?}: unknown unit {unit:?}")]
    UnknownUnit { input: String, unit: String },

    #[error("invalid duration {0:?}: out of range")]
    Overflow(String),
}

/// Nanosecond time span with the compact string encoding
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MachineDuration {
    nanos: i64,
}

impl MachineDuration {
    pub const ZERO: MachineDuration = MachineDuration { nanos: 0 };

    pub const fn from_nanos(nanos: i64) -> Self {
        Self { nanos }
    }

    pub const fn from_secs(secs: i64) -> Self {
        Self {
            nanos: secs.saturating_mul(NANOS_PER_SEC as i64),
        }
    }

    pub const fn from_mins(mins: i64) -> Self {
        Self::from_secs(mins.saturating_mul(SECS_PER_MIN as i64))
    }

    pub const fn from_hours(hours: i64) -> Self {
        Self::from_secs(hours.saturating_mul(SECS_PER_HOUR as i64))
    }

    pub const fn as_nanos(&self) -> i64 {
        self.nanos
    }

    pub fn as_secs(&self) -> i64 {
        self.nanos / NANOS_PER_SEC as i64
    }

    pub fn as_secs_f64(&self) -> f64 {
        self.nanos as f64 / NANOS_PER_SEC as f64
    }

    pub fn is_zero(&self) -> bool {
        self.nanos == 0
    }

    /// Positive span as a std duration; negative spans clamp to zero
    pub fn to_std(&self) -> Duration {
        Duration::from_nanos(self.nanos.max(0) as u64)
    }

    /// Span as a chrono duration, for instant arithmetic
    pub fn to_chrono(&self) -> chrono::Duration {
        chrono::Duration::nanoseconds(self.nanos)
    }

    /// Truncate towards zero to a multiple of `unit`
    pub fn truncate(&self, unit: MachineDuration) -> MachineDuration {
        if unit.nanos <= 0 {
            return *self;
        }
        Self::from_nanos(self.nanos - self.nanos % unit.nanos)
    }
}

impl From<Duration> for MachineDuration {
    fn from(d: Duration) -> Self {
        Self::from_nanos(i64::try_from(d.as_nanos()).unwrap_or(i64::MAX))
    }
}

impl FromStr for MachineDuration {
    type Err = DurationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_machine(s).map(Self::from_nanos)
    }
}

/// Split `v` into its integer part and a `.ddd` fraction with trailing
/// zeros removed, `prec` being the number of fractional digits.
fn split_fraction(v: u64, prec: u32) -> (u64, String) {
    let pow = 10u64.pow(prec);
    let frac = v % pow;
    if frac == 0 {
        return (v / pow, String::new());
    }
    let digits = format!("{:0width$}", frac, width = prec as usize);
    (v / pow, format!(".{}", digits.trim_end_matches('0')))
}

impl fmt::Display for MachineDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.nanos < 0 { "-" } else { "" };
        let u = self.nanos.unsigned_abs();

        if u == 0 {
            return f.write_str("0s");
        }

        if u < NANOS_PER_SEC {
            let (unit, prec) = if u < NANOS_PER_MICRO {
                ("ns", 0)
            } else if u < NANOS_PER_MILLI {
                ("µs", 3)
            } else {
                ("ms", 6)
            };
            let (int, frac) = split_fraction(u, prec);
            return write!(f, "{sign}{int}{frac}{unit}");
        }

        let (total_secs, frac) = split_fraction(u, 9);
        let secs = total_secs % SECS_PER_MIN;
        let total_mins = total_secs / SECS_PER_MIN;

        f.write_str(sign)?;
        if total_mins > 0 {
            let hours = total_mins / 60;
            if hours > 0 {
                write!(f, "{hours}h")?;
            }
            write!(f, "{}m", total_mins % 60)?;
        }
        write!(f, "{secs}{frac}s")
    }
}

fn unit_nanos(unit: &str) -> Option<u128> {
    let n = match unit {
        "ns" => 1,
        "us" | "µs" | "μs" => NANOS_PER_MICRO,
        "ms" => NANOS_PER_MILLI,
        "s" => NANOS_PER_SEC,
        "m" => SECS_PER_MIN * NANOS_PER_SEC,
        "h" => SECS_PER_HOUR * NANOS_PER_SEC,
        _ => return None,
    };
    Some(n as u128)
}

/// Parse the compact notation: `[-+]?([0-9]*(\.[0-9]*)?unit)+`, or `0`.
pub fn parse_machine(input: &str) -> Result<i64, DurationError> {
    let invalid = || DurationError::Invalid(input.to_string());
    let overflow = || DurationError::Overflow(input.to_string());

    let mut s = input;
    let mut negative = false;
    if let Some(rest) = s.strip_prefix('-') {
        negative = true;
        s = rest;
    } else if let Some(rest) = s.strip_prefix('+') {
        s = rest;
    }

    if s == "0" {
        return Ok(0);
    }
    if s.is_empty() {
        return Err(invalid());
    }

    let limit: u128 = 1u128 << 63;
    let mut total: u128 = 0;

    while !s.is_empty() {
        let int_len = s.bytes().take_while(u8::is_ascii_digit).count();
        let (int_part, rest) = s.split_at(int_len);
        s = rest;

        let mut frac_part = "";
        if let Some(rest) = s.strip_prefix('.') {
            let frac_len = rest.bytes().take_while(u8::is_ascii_digit).count();
            frac_part = &rest[..frac_len];
            s = &rest[frac_len..];
        }

        if int_part.is_empty() && frac_part.is_empty() {
            return Err(invalid());
        }

        let unit_len = s
            .char_indices()
            .find(|(_, c)| *c == '.' || c.is_ascii_digit())
            .map(|(i, _)| i)
            .unwrap_or(s.len());
        if unit_len == 0 {
            return Err(DurationError::MissingUnit(input.to_string()));
        }
        let (unit, rest) = s.split_at(unit_len);
        s = rest;

        let scale = unit_nanos(unit).ok_or_else(|| DurationError::UnknownUnit {
            input: input.to_string(),
            unit: unit.to_string(),
        })?;

        let int: u128 = if int_part.is_empty() {
            0
        } else {
            int_part.parse().map_err(|_| overflow())?
        };
        if int > limit {
            return Err(overflow());
        }

        let mut value = int.checked_mul(scale).ok_or_else(overflow)?;

        // Digits beyond nanosecond precision cannot change the result.
        let frac_digits = &frac_part[..frac_part.len().min(18)];
        if !frac_digits.is_empty() {
            let frac: u128 = frac_digits.parse().map_err(|_| invalid())?;
            let divisor = 10u128.pow(frac_digits.len() as u32);
            value += frac * scale / divisor;
        }

        total = total.checked_add(value).ok_or_else(overflow)?;
        if total > limit {
            return Err(overflow());
        }
    }

    if negative {
        Ok((total as i128).wrapping_neg() as i64)
    } else if total == limit {
        Err(overflow())
    } else {
        Ok(total as i64)
    }
}

impl Serialize for MachineDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

struct MachineDurationVisitor {
    accept_iso: bool,
}

impl<'de> Visitor<'de> for MachineDurationVisitor {
    type Value = MachineDuration;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.accept_iso {
            f.write_str("a duration string (e.g. 1h30m or P1D) or a number of nanoseconds")
        } else {
            f.write_str("a duration string (e.g. 1h30m) or a number of nanoseconds")
        }
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
        Ok(MachineDuration::from_nanos(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
        i64::try_from(v)
            .map(MachineDuration::from_nanos)
            .map_err(|_| E::custom(DurationError::Overflow(v.to_string())))
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Self::Value, E> {
        if !v.is_finite() || v.abs() >= i64::MAX as f64 {
            return Err(E::custom(DurationError::Overflow(v.to_string())));
        }
        Ok(MachineDuration::from_nanos(v as i64))
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        match v.parse::<MachineDuration>() {
            Ok(d) => Ok(d),
            Err(err) if self.accept_iso => v
                .parse::<IsoDuration>()
                .and_then(|iso| iso.to_duration())
                .map_err(|iso_err| match iso_err {
                    DurationError::Overflow(_) => E::custom(iso_err),
                    _ => E::custom(err),
                }),
            Err(err) => Err(E::custom(err)),
        }
    }
}

impl<'de> Deserialize<'de> for MachineDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MachineDurationVisitor { accept_iso: false })
    }
}

/// Decode an objective window: the compact notation first, then ISO-8601
pub fn deserialize_window<'de, D>(deserializer: D) -> Result<MachineDuration, D::Error>
where
    D: Deserializer<'de>,
{
    deserializer.deserialize_any(MachineDurationVisitor { accept_iso: true })
}

/// ISO-8601 period (`PnYnMnWnDTnHnMnS`)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IsoDuration {
    pub years: u64,
    pub months: u64,
    pub weeks: u64,
    pub days: u64,
    pub hours: u64,
    pub minutes: u64,
    pub seconds: u64,
}

impl IsoDuration {
    /// `PT{secs}S`, the form used for report periods
    pub fn from_seconds(secs: u64) -> Self {
        Self {
            seconds: secs,
            ..Default::default()
        }
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }

    /// Total seconds, `None` when the sum does not fit
    pub fn total_seconds(&self) -> Option<u64> {
        [
            (self.years, SECS_PER_YEAR),
            (self.months, SECS_PER_MONTH),
            (self.weeks, SECS_PER_WEEK),
            (self.days, SECS_PER_DAY),
            (self.hours, SECS_PER_HOUR),
            (self.minutes, SECS_PER_MIN),
            (self.seconds, 1),
        ]
        .into_iter()
        .try_fold(0u64, |total, (value, unit)| {
            value.checked_mul(unit).and_then(|secs| total.checked_add(secs))
        })
    }

    /// Years count 365 days, months 30 days
    pub fn to_duration(&self) -> Result<MachineDuration, DurationError> {
        let overflow = || DurationError::Overflow(self.to_string());
        let secs = self
            .total_seconds()
            .and_then(|secs| i64::try_from(secs).ok())
            .ok_or_else(overflow)?;
        secs.checked_mul(NANOS_PER_SEC as i64)
            .map(MachineDuration::from_nanos)
            .ok_or_else(overflow)
    }
}

impl fmt::Display for IsoDuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_zero() {
            return f.write_str("PT0S");
        }

        f.write_str("P")?;
        for (value, designator) in [
            (self.years, 'Y'),
            (self.months, 'M'),
            (self.weeks, 'W'),
            (self.days, 'D'),
        ] {
            if value > 0 {
                write!(f, "{value}{designator}")?;
            }
        }

        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            f.write_str("T")?;
            for (value, designator) in
                [(self.hours, 'H'), (self.minutes, 'M'), (self.seconds, 'S')]
            {
                if value > 0 {
                    write!(f, "{value}{designator}")?;
                }
            }
        }
        Ok(())
    }
}

impl FromStr for IsoDuration {
    type Err = DurationError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = || DurationError::Invalid(input.to_string());
        let upper = input.trim().to_ascii_uppercase();
        let body = upper.strip_prefix('P').ok_or_else(invalid)?;
        if body.is_empty() {
            return Err(invalid());
        }

        let mut out = IsoDuration::default();
        let mut in_time = false;
        let mut seen_time_field = false;
        let mut digits = String::new();

        for c in body.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            if c == 'T' {
                if in_time || !digits.is_empty() {
                    return Err(invalid());
                }
                in_time = true;
                continue;
            }
            if digits.is_empty() {
                return Err(invalid());
            }
            let value: u64 = digits.parse().map_err(|_| invalid())?;
            digits.clear();

            let slot = match (in_time, c) {
                (false, 'Y') => &mut out.years,
                (false, 'M') => &mut out.months,
                (false, 'W') => &mut out.weeks,
                (false, 'D') => &mut out.days,
                (true, 'H') => &mut out.hours,
                (true, 'M') => &mut out.minutes,
                (true, 'S') => &mut out.seconds,
                _ => return Err(invalid()),
            };
            *slot = value;
            seen_time_field |= in_time;
        }

        if !digits.is_empty() || (in_time && !seen_time_field) {
            return Err(invalid());
        }
        out.to_duration()
            .map_err(|_| DurationError::Overflow(input.to_string()))?;
        Ok(out)
    }
}

impl Serialize for IsoDuration {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for IsoDuration {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(de::Error::custom)
    }
}

/// Compact human form: `3d6h5m30s`, `10y0d2h5m0s`
pub fn humanize_short(d: MachineDuration) -> String {
    let day = MachineDuration::from_secs(SECS_PER_DAY as i64).as_nanos();
    let year = MachineDuration::from_secs(SECS_PER_YEAR as i64).as_nanos();

    let mut rest = d.as_nanos();
    if rest < day {
        return d.to_string();
    }

    let mut out = String::new();
    if rest >= year {
        out.push_str(&format!("{}y", rest / year));
        rest %= year;
    }
    if rest > 0 {
        out.push_str(&format!("{}d", rest / day));
        rest %= day;
    }
    if rest > 0 {
        out.push_str(&MachineDuration::from_nanos(rest).to_string());
    }
    out
}

/// Long human form: `3 days 6 hours 5 minutes 30 seconds`
pub fn humanize(d: MachineDuration) -> String {
    let secs = d.as_secs().max(0) as u64;
    let chunks = [
        ("day", secs / SECS_PER_DAY),
        ("hour", secs % SECS_PER_DAY / SECS_PER_HOUR),
        ("minute", secs % SECS_PER_HOUR / SECS_PER_MIN),
        ("second", secs % SECS_PER_MIN),
    ];

    chunks
        .iter()
        .filter(|(_, amount)| *amount > 0)
        .map(|(name, amount)| match amount {
            1 => format!("1 {name}"),
            n => format!("{n} {name}s"),
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Holder {
        duration: MachineDuration,
    }

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct IsoHolder {
        duration: IsoDuration,
    }

    #[derive(Debug, Deserialize)]
    struct WindowHolder {
        #[serde(deserialize_with = "deserialize_window")]
        window: MachineDuration,
    }

    fn full() -> MachineDuration {
        MachineDuration::from_nanos(
            (72 * 3600 + 45 * 60 + 30) * 1_000_000_000 + 123 * 1_000_000,
        )
    }

    #[test]
    fn test_display_matches_compact_notation() {
        let cases = [
            (MachineDuration::from_nanos(300 * 1_000_000), "300ms"),
            (MachineDuration::from_secs(30), "30s"),
            (MachineDuration::from_mins(45), "45m0s"),
            (MachineDuration::from_hours(72), "72h0m0s"),
            (full(), "72h45m30.123s"),
            (MachineDuration::ZERO, "0s"),
            (MachineDuration::from_nanos(1_500), "1.5µs"),
            (MachineDuration::from_nanos(42), "42ns"),
            (MachineDuration::from_secs(-90), "-1m30s"),
        ];
        for (d, want) in cases {
            assert_eq!(d.to_string(), want);
        }
    }

    #[test]
    fn test_parse_units_and_fractions() {
        assert_eq!(parse_machine("300ms").unwrap(), 300_000_000);
        assert_eq!(parse_machine("1h30m").unwrap(), 5_400_000_000_000);
        assert_eq!(parse_machine("1.5h").unwrap(), 5_400_000_000_000);
        assert_eq!(parse_machine("2us").unwrap(), 2_000);
        assert_eq!(parse_machine("2µs").unwrap(), 2_000);
        assert_eq!(parse_machine("-1.5s").unwrap(), -1_500_000_000);
        assert_eq!(parse_machine(".5s").unwrap(), 500_000_000);
        assert_eq!(parse_machine("0").unwrap(), 0);
        assert_eq!(
            parse_machine("72h45m30.123s").unwrap(),
            full().as_nanos()
        );
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert!(matches!(parse_machine(""), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_machine("abc"), Err(DurationError::Invalid(_))));
        assert!(matches!(parse_machine("10"), Err(DurationError::MissingUnit(_))));
        assert!(matches!(
            parse_machine("10d"),
            Err(DurationError::UnknownUnit { .. })
        ));
        assert!(matches!(
            parse_machine("9999999999999h"),
            Err(DurationError::Overflow(_))
        ));
    }

    #[test]
    fn test_json_encoding_survives_decoding() {
        for d in [
            MachineDuration::from_nanos(300 * 1_000_000),
            MachineDuration::from_secs(30),
            MachineDuration::from_mins(45),
            MachineDuration::from_hours(72),
            full(),
        ] {
            let original = Holder { duration: d };
            let json = serde_json::to_string(&original).unwrap();
            assert!(json.contains(&format!("\"{}\"", d)));
            let back: Holder = serde_json::from_str(&json).unwrap();
            assert_eq!(back, original);
        }
    }

    #[test]
    fn test_yaml_encoding_survives_decoding() {
        let original = Holder { duration: full() };
        let yaml = serde_yaml::to_string(&original).unwrap();
        assert!(yaml.contains("72h45m30.123s"));
        let back: Holder = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(back, original);
    }

    #[test]
    fn test_numbers_decode_as_nanoseconds() {
        let h: Holder = serde_json::from_str(r#"{"duration": 1500000000}"#).unwrap();
        assert_eq!(h.duration, MachineDuration::from_nanos(1_500_000_000));

        let h: Holder = serde_json::from_str(r#"{"duration": 2.0e9}"#).unwrap();
        assert_eq!(h.duration, MachineDuration::from_secs(2));
    }

    #[test]
    fn test_other_types_are_invalid() {
        let err = serde_json::from_str::<Holder>(r#"{"duration": true}"#).unwrap_err();
        assert!(err.to_string().contains("duration"));

        let err = serde_json::from_str::<Holder>(r#"{"duration": "1 hour"}"#).unwrap_err();
        assert!(err.to_string().contains("invalid duration"));
    }

    #[test]
    fn test_iso_encoding() {
        let cases = [
            (
                IsoDuration {
                    weeks: 4,
                    ..Default::default()
                },
                "P4W",
            ),
            (
                IsoDuration {
                    days: 6,
                    hours: 23,
                    minutes: 59,
                    seconds: 59,
                    ..Default::default()
                },
                "P6DT23H59M59S",
            ),
            (
                IsoDuration {
                    days: 30,
                    ..Default::default()
                },
                "P30D",
            ),
            (
                IsoDuration {
                    hours: 23,
                    minutes: 59,
                    seconds: 59,
                    ..Default::default()
                },
                "PT23H59M59S",
            ),
            (IsoDuration::default(), "PT0S"),
            (IsoDuration::from_seconds(3600), "PT3600S"),
        ];

        for (d, want) in cases {
            assert_eq!(d.to_string(), want);
            let json = serde_json::to_string(&IsoHolder { duration: d }).unwrap();
            assert!(json.contains(want));
            let back: IsoHolder = serde_json::from_str(&json).unwrap();
            assert_eq!(back.duration, d);
        }
    }

    #[test]
    fn test_iso_parse_is_case_insensitive() {
        let d: IsoDuration = "p1dt2h".parse().unwrap();
        assert_eq!(d.days, 1);
        assert_eq!(d.hours, 2);
        assert_eq!(d.to_string(), "P1DT2H");

        let d: IsoDuration = "P1M".parse().unwrap();
        assert_eq!(d.months, 1);
        let d: IsoDuration = "PT1M".parse().unwrap();
        assert_eq!(d.minutes, 1);
    }

    #[test]
    fn test_iso_parse_rejects_malformed_input() {
        for bad in ["", "P", "PT", "1D", "P1H", "PT1D", "P1", "PXD", "P1DT"] {
            assert!(bad.parse::<IsoDuration>().is_err(), "{bad} should fail");
        }
        assert!(serde_json::from_str::<IsoHolder>(r#"{"duration": 5}"#).is_err());
    }

    #[test]
    fn test_iso_to_duration() {
        let d: IsoDuration = "P1Y2M1W1DT1H1M1S".parse().unwrap();
        let expected = 365 * 86_400 + 60 * 86_400 + 7 * 86_400 + 86_400 + 3_600 + 60 + 1;
        assert_eq!(d.to_duration().unwrap(), MachineDuration::from_secs(expected));
    }

    #[test]
    fn test_iso_out_of_range_is_an_error() {
        assert!(matches!(
            "P999999999999Y".parse::<IsoDuration>(),
            Err(DurationError::Overflow(_))
        ));
        assert!(matches!(
            "PT99999999999999999999S".parse::<IsoDuration>(),
            Err(DurationError::Invalid(_))
        ));

        let huge = IsoDuration {
            years: u64::MAX,
            ..Default::default()
        };
        assert!(matches!(huge.to_duration(), Err(DurationError::Overflow(_))));

        let err = serde_yaml::from_str::<WindowHolder>("window: P999999999999Y").unwrap_err();
        assert!(err.to_string().contains("out of range"), "{err}");
    }

    #[test]
    fn test_window_accepts_both_notations() {
        let w: WindowHolder = serde_yaml::from_str("window: 1h").unwrap();
        assert_eq!(w.window, MachineDuration::from_hours(1));

        let w: WindowHolder = serde_yaml::from_str("window: P1D").unwrap();
        assert_eq!(w.window, MachineDuration::from_hours(24));

        let w: WindowHolder = serde_json::from_str(r#"{"window": "pt30m"}"#).unwrap();
        assert_eq!(w.window, MachineDuration::from_mins(30));

        assert!(serde_yaml::from_str::<WindowHolder>("window: soon").is_err());
    }

    #[test]
    fn test_humanize_short() {
        let cases = [
            (MachineDuration::from_secs(12 * 3600 + 5 * 60 + 30), "12h5m30s"),
            (MachineDuration::from_secs(12 * 3600 + 30), "12h0m30s"),
            (MachineDuration::from_secs(78 * 3600 + 5 * 60 + 30), "3d6h5m30s"),
            (MachineDuration::from_hours(72), "3d"),
            (MachineDuration::from_hours(24 * 365 * 10), "10y"),
            (
                MachineDuration::from_secs(10 * 365 * 86_400 + 2 * 3600 + 5 * 60),
                "10y0d2h5m0s",
            ),
        ];
        for (d, want) in cases {
            assert_eq!(humanize_short(d), want);
        }
    }

    #[test]
    fn test_humanize() {
        let cases = [
            (
                MachineDuration::from_secs(12 * 3600 + 5 * 60 + 30),
                "12 hours 5 minutes 30 seconds",
            ),
            (MachineDuration::from_secs(12 * 3600 + 30), "12 hours 30 seconds"),
            (
                MachineDuration::from_secs(78 * 3600 + 5 * 60 + 30),
                "3 days 6 hours 5 minutes 30 seconds",
            ),
            (MachineDuration::from_hours(72), "3 days"),
            (
                MachineDuration::from_secs(25 * 3600 + 61),
                "1 day 1 hour 1 minute 1 second",
            ),
        ];
        for (d, want) in cases {
            assert_eq!(humanize(d), want);
        }
    }

    #[test]
    fn test_truncate() {
        let d = MachineDuration::from_secs(150);
        assert_eq!(
            d.truncate(MachineDuration::from_mins(1)),
            MachineDuration::from_secs(120)
        );
    }
}
