//! Wire-format encoding for metrics and aggregation results.
//!
//! Supported formats: Prometheus exposition text, JSON, CSV, InfluxDB line
//! protocol and Graphite plaintext.

pub mod encoders;
pub mod exporter;
pub mod format;

pub use encoders::{create_encoder, MetricsEncoder};
pub use exporter::MetricsExporter;
pub use format::{ExportFormat, ExportOptions, ExportResult, TimestampFormat};
