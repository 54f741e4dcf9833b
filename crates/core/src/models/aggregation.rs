use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::TelemetryError;

const MINUTE_MS: i64 = 60_000;
const HOUR_MS: i64 = 60 * MINUTE_MS;
const DAY_MS: i64 = 24 * HOUR_MS;

/// Lookback window for a windowed statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AggregationPeriod {
    #[serde(rename = "1m")]
    OneMinute,
    #[serde(rename = "5m")]
    FiveMinutes,
    #[serde(rename = "15m")]
    FifteenMinutes,
    #[serde(rename = "1h")]
    OneHour,
    #[serde(rename = "6h")]
    SixHours,
    #[serde(rename = "24h")]
    OneDay,
    #[serde(rename = "7d")]
    SevenDays,
    #[serde(rename = "30d")]
    ThirtyDays,
}

impl AggregationPeriod {
    pub const ALL: [AggregationPeriod; 8] = [
        AggregationPeriod::OneMinute,
        AggregationPeriod::FiveMinutes,
        AggregationPeriod::FifteenMinutes,
        AggregationPeriod::OneHour,
        AggregationPeriod::SixHours,
        AggregationPeriod::OneDay,
        AggregationPeriod::SevenDays,
        AggregationPeriod::ThirtyDays,
    ];

    pub fn duration_ms(&self) -> i64 {
        match self {
            AggregationPeriod::OneMinute => MINUTE_MS,
            AggregationPeriod::FiveMinutes => 5 * MINUTE_MS,
            AggregationPeriod::FifteenMinutes => 15 * MINUTE_MS,
            AggregationPeriod::OneHour => HOUR_MS,
            AggregationPeriod::SixHours => 6 * HOUR_MS,
            AggregationPeriod::OneDay => DAY_MS,
            AggregationPeriod::SevenDays => 7 * DAY_MS,
            AggregationPeriod::ThirtyDays => 30 * DAY_MS,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationPeriod::OneMinute => "1m",
            AggregationPeriod::FiveMinutes => "5m",
            AggregationPeriod::FifteenMinutes => "15m",
            AggregationPeriod::OneHour => "1h",
            AggregationPeriod::SixHours => "6h",
            AggregationPeriod::OneDay => "24h",
            AggregationPeriod::SevenDays => "7d",
            AggregationPeriod::ThirtyDays => "30d",
        }
    }
}

impl fmt::Display for AggregationPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationPeriod {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AggregationPeriod::ALL
            .into_iter()
            .find(|period| period.as_str() == s)
            .ok_or_else(|| TelemetryError::InvalidPeriod(s.to_string()))
    }
}

/// Statistic applied to the values inside a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AggregationFunction {
    Sum,
    Average,
    Min,
    Max,
    Count,
    Median,
    P95,
    P99,
}

impl AggregationFunction {
    pub const ALL: [AggregationFunction; 8] = [
        AggregationFunction::Sum,
        AggregationFunction::Average,
        AggregationFunction::Min,
        AggregationFunction::Max,
        AggregationFunction::Count,
        AggregationFunction::Median,
        AggregationFunction::P95,
        AggregationFunction::P99,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AggregationFunction::Sum => "sum",
            AggregationFunction::Average => "average",
            AggregationFunction::Min => "min",
            AggregationFunction::Max => "max",
            AggregationFunction::Count => "count",
            AggregationFunction::Median => "median",
            AggregationFunction::P95 => "p95",
            AggregationFunction::P99 => "p99",
        }
    }
}

impl fmt::Display for AggregationFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AggregationFunction {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "avg" | "mean" => Ok(AggregationFunction::Average),
            lower => AggregationFunction::ALL
                .into_iter()
                .find(|function| function.as_str() == lower)
                .ok_or_else(|| TelemetryError::InvalidFunction(s.to_string())),
        }
    }
}

/// Result of applying one function to one metric over one window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedMetric {
    pub name: String,
    pub period: AggregationPeriod,
    pub function: AggregationFunction,
    pub value: f64,
    pub start_time: i64,
    pub end_time: i64,
    pub sample_count: usize,
}
