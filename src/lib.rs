//! In-process metrics telemetry engine.
//!
//! [`MetricsManager`] ties together the collector, registry, aggregator,
//! exporter and dashboard from the workspace crates, which are re-exported
//! here for convenience.

pub mod app;
pub mod manager;
pub mod probe;
pub mod shutdown;

pub use app::Application;
pub use manager::{ManagerStats, MetricsManager, MetricsSnapshot, RegisterMetric};
pub use probe::{Probe, SystemProbe, SYSTEM_GAUGES};
pub use shutdown::ShutdownManager;

pub use telemetry_aggregator as aggregator;
pub use telemetry_collector as collector;
pub use telemetry_config as config;
pub use telemetry_core as core;
pub use telemetry_exporter as exporter;
pub use telemetry_observability as observability;
