use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::metric::MetricType;

/// Descriptive metadata kept by the registry, independent of recorded values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricMetadata {
    pub name: String,
    #[serde(rename = "type")]
    pub metric_type: MetricType,
    pub description: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub labels: Vec<String>,
    pub category: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub registered_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl MetricMetadata {
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}
