pub mod dashboard;
pub mod structured_logger;
pub mod telemetry_setup;

pub use dashboard::{
    Dashboard, DataPoint, MetricSource, Widget, WidgetConfig, WidgetData, WidgetKind,
};
pub use structured_logger::StructuredLogger;
pub use telemetry_setup::init_structured_logging;
