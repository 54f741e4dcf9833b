//! Metric state and metadata stores.
//!
//! [`MetricsCollector`] owns the numeric state and retained series of every
//! metric. [`MetricRegistry`] owns descriptive metadata and its indices. The
//! two are independent; the manager keeps them in step.

pub mod collector;
pub mod registry;

pub use collector::{
    CollectorLimits, HistogramStats, MetricOptions, MetricsCollector, Percentiles, Registration,
    SummaryStats,
};
pub use registry::{
    MetadataFilter, MetadataQuery, MetadataUpdate, MetricRegistry, RegisterOptions, RegistryStats,
    SortField, SortOrder, DEFAULT_CATEGORY,
};
