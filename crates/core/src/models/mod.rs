pub mod aggregation;
pub mod metadata;
pub mod metric;

pub use aggregation::{AggregatedMetric, AggregationFunction, AggregationPeriod};
pub use metadata::MetricMetadata;
pub use metric::{Labels, Metric, MetricType, MetricValue};

/// Recorded values kept per metric before the oldest is evicted.
pub const DEFAULT_MAX_VALUES: usize = 10_000;

/// Raw observations kept per summary for percentile calculation.
pub const DEFAULT_MAX_SUMMARY_SAMPLES: usize = 1_000;

/// Aggregation results kept per (name, period, function).
pub const DEFAULT_MAX_AGGREGATION_HISTORY: usize = 1_000;
