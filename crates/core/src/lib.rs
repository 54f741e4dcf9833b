pub mod buffer;
pub mod clock;
pub mod errors;
pub mod models;
pub mod schedule;
pub mod stats;

pub use buffer::BoundedBuffer;
pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::*;
pub use models::{
    AggregatedMetric, AggregationFunction, AggregationPeriod, Labels, Metric, MetricMetadata,
    MetricType, MetricValue, DEFAULT_MAX_AGGREGATION_HISTORY, DEFAULT_MAX_SUMMARY_SAMPLES,
    DEFAULT_MAX_VALUES,
};
pub use schedule::ScheduledTask;
