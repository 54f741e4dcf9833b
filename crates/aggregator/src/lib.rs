//! Time-window aggregation and trend analysis over collected metrics.

pub mod aggregator;
pub mod trend;

pub use aggregator::{apply, MetricsAggregator};
pub use trend::{Comparison, Trend, TrendAnalysis, TREND_THRESHOLD};
