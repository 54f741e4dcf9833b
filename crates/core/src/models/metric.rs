use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::buffer::BoundedBuffer;
use crate::errors::TelemetryError;

/// Label set attached to a single observation. Ordered so exports are stable.
pub type Labels = BTreeMap<String, String>;

/// Metric type
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricType {
    /// Counter - accumulates deltas
    Counter,
    /// Gauge - value that can be set, raised or lowered
    Gauge,
    /// Histogram - observations bucketed by fixed upper bounds
    Histogram,
    /// Summary - observations kept raw for percentile queries
    Summary,
}

impl MetricType {
    pub const ALL: [MetricType; 4] = [
        MetricType::Counter,
        MetricType::Gauge,
        MetricType::Histogram,
        MetricType::Summary,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
            MetricType::Histogram => "histogram",
            MetricType::Summary => "summary",
        }
    }
}

impl fmt::Display for MetricType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricType {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "counter" => Ok(MetricType::Counter),
            "gauge" => Ok(MetricType::Gauge),
            "histogram" => Ok(MetricType::Histogram),
            "summary" => Ok(MetricType::Summary),
            other => Err(TelemetryError::config_error(format!(
                "unknown metric type '{other}'"
            ))),
        }
    }
}

/// A single recorded observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricValue {
    pub value: f64,
    /// Epoch milliseconds at record time.
    pub timestamp: i64,
    #[serde(default)]
    pub labels: Labels,
}

impl MetricValue {
    pub fn new(value: f64, timestamp: i64, labels: Labels) -> Self {
        Self {
            value,
            timestamp,
            labels,
        }
    }
}

/// A registered metric and its retained series.
#[derive(Debug, Clone, Serialize)]
pub struct Metric {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub description: String,
    pub unit: String,
    /// Declared label names. Informational only.
    pub labels: Vec<String>,
    pub values: BoundedBuffer<MetricValue>,
}

impl Metric {
    pub fn new(
        name: impl Into<String>,
        metric_type: MetricType,
        description: impl Into<String>,
        max_values: usize,
    ) -> Self {
        Self {
            name: name.into(),
            metric_type,
            description: description.into(),
            unit: String::new(),
            labels: Vec::new(),
            values: BoundedBuffer::new(max_values),
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Appends an observation; returns the evicted one when the series was full.
    pub fn record(&mut self, value: MetricValue) -> Option<MetricValue> {
        self.values.push(value)
    }

    pub fn latest(&self) -> Option<&MetricValue> {
        self.values.last()
    }

    /// Observations with `start <= timestamp <= end`, in record order.
    pub fn values_between(&self, start: i64, end: i64) -> impl Iterator<Item = &MetricValue> {
        self.values
            .iter()
            .filter(move |v| v.timestamp >= start && v.timestamp <= end)
    }
}
