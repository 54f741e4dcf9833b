use chrono::{DateTime, SecondsFormat};

use telemetry_core::{AggregatedMetric, Labels, Metric, TelemetryResult};

use crate::format::{ExportFormat, ExportOptions, TimestampFormat};

pub mod csv;
pub mod graphite;
pub mod influx;
pub mod json;
pub mod prometheus;

/// Trait for encoding metrics into one wire format
pub trait MetricsEncoder: Send + Sync {
    fn format(&self) -> ExportFormat;

    /// Encode raw metrics and their retained series
    fn encode(&self, metrics: &[&Metric], options: &ExportOptions) -> TelemetryResult<String>;

    /// Encode windowed aggregation results
    fn encode_aggregated(
        &self,
        aggregations: &[AggregatedMetric],
        options: &ExportOptions,
    ) -> TelemetryResult<String>;
}

/// Factory function to create the encoder for a format
pub fn create_encoder(format: ExportFormat) -> Box<dyn MetricsEncoder> {
    match format {
        ExportFormat::Prometheus => Box::new(prometheus::PrometheusEncoder::new()),
        ExportFormat::Json => Box::new(json::JsonEncoder::new()),
        ExportFormat::Csv => Box::new(csv::CsvEncoder::new()),
        ExportFormat::Influxdb => Box::new(influx::InfluxEncoder::new()),
        ExportFormat::Graphite => Box::new(graphite::GraphiteEncoder::new()),
    }
}

/// Text form of a sample value. Non-finite values use the Prometheus spellings.
pub(crate) fn format_value(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value == f64::INFINITY {
        "+Inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-Inf".to_string()
    } else {
        value.to_string()
    }
}

pub(crate) fn format_timestamp(timestamp_ms: i64, format: TimestampFormat) -> String {
    match format {
        TimestampFormat::Unix => timestamp_ms.to_string(),
        TimestampFormat::Iso => DateTime::from_timestamp_millis(timestamp_ms)
            .map(|dt| dt.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| timestamp_ms.to_string()),
    }
}

/// `k=v` pairs joined by `sep`, in key order.
pub(crate) fn join_labels(labels: &Labels, sep: &str) -> String {
    labels
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(sep)
}
