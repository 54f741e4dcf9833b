use serde_json::{json, Map, Value};

use telemetry_core::{AggregatedMetric, Metric, MetricValue, TelemetryResult};

use super::{format_timestamp, MetricsEncoder};
use crate::format::{ExportFormat, ExportOptions, TimestampFormat};

/// JSON encoder. Writes every retained value of each metric.
pub struct JsonEncoder;

impl JsonEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEncoder for JsonEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Json
    }

    fn encode(&self, metrics: &[&Metric], options: &ExportOptions) -> TelemetryResult<String> {
        let entries: Vec<Value> = metrics
            .iter()
            .map(|metric| {
                let mut entry = Map::new();
                entry.insert("name".into(), json!(metric.name));
                entry.insert("type".into(), json!(metric.metric_type));
                entry.insert("description".into(), json!(metric.description));
                if options.include_metadata {
                    entry.insert("unit".into(), json!(metric.unit));
                    entry.insert("labels".into(), json!(metric.labels));
                }
                let values: Vec<Value> = metric
                    .values
                    .iter()
                    .map(|value| encode_value(value, options))
                    .collect();
                entry.insert("values".into(), Value::Array(values));
                Value::Object(entry)
            })
            .collect();

        Ok(serde_json::to_string_pretty(&entries)?)
    }

    fn encode_aggregated(
        &self,
        aggregations: &[AggregatedMetric],
        options: &ExportOptions,
    ) -> TelemetryResult<String> {
        let entries: Vec<Value> = aggregations
            .iter()
            .map(|aggregation| {
                let mut entry = Map::new();
                entry.insert("name".into(), json!(aggregation.name));
                entry.insert("period".into(), json!(aggregation.period));
                entry.insert("function".into(), json!(aggregation.function));
                entry.insert("value".into(), json!(aggregation.value));
                entry.insert("sample_count".into(), json!(aggregation.sample_count));
                if options.include_timestamps {
                    entry.insert(
                        "start_time".into(),
                        timestamp_value(aggregation.start_time, options.timestamp_format),
                    );
                    entry.insert(
                        "end_time".into(),
                        timestamp_value(aggregation.end_time, options.timestamp_format),
                    );
                }
                Value::Object(entry)
            })
            .collect();

        Ok(serde_json::to_string_pretty(&entries)?)
    }
}

fn encode_value(value: &MetricValue, options: &ExportOptions) -> Value {
    let mut entry = Map::new();
    entry.insert("value".into(), json!(value.value));
    if options.include_timestamps {
        entry.insert(
            "timestamp".into(),
            timestamp_value(value.timestamp, options.timestamp_format),
        );
    }
    if options.include_labels && !value.labels.is_empty() {
        entry.insert("labels".into(), json!(value.labels));
    }
    Value::Object(entry)
}

fn timestamp_value(timestamp_ms: i64, format: TimestampFormat) -> Value {
    match format {
        TimestampFormat::Unix => json!(timestamp_ms),
        TimestampFormat::Iso => json!(format_timestamp(timestamp_ms, format)),
    }
}
