use telemetry_core::{AggregatedMetric, Metric, TelemetryResult};

use super::{format_timestamp, format_value, join_labels, MetricsEncoder};
use crate::format::{ExportFormat, ExportOptions};

/// CSV encoder. One row per retained value.
pub struct CsvEncoder;

impl CsvEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEncoder for CsvEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Csv
    }

    fn encode(&self, metrics: &[&Metric], options: &ExportOptions) -> TelemetryResult<String> {
        let mut header = vec!["metric_name", "metric_type", "value"];
        if options.include_timestamps {
            header.push("timestamp");
        }
        if options.include_labels {
            header.push("labels");
        }

        let mut rows = vec![header.join(",")];
        for metric in metrics {
            for value in &metric.values {
                let mut row = vec![
                    escape_field(&metric.name),
                    metric.metric_type.to_string(),
                    format_value(value.value),
                ];
                if options.include_timestamps {
                    row.push(format_timestamp(value.timestamp, options.timestamp_format));
                }
                if options.include_labels {
                    row.push(escape_field(&join_labels(&value.labels, ";")));
                }
                rows.push(row.join(","));
            }
        }
        Ok(rows.join("\n") + "\n")
    }

    fn encode_aggregated(
        &self,
        aggregations: &[AggregatedMetric],
        options: &ExportOptions,
    ) -> TelemetryResult<String> {
        let mut header = vec!["metric_name", "period", "function", "value", "sample_count"];
        if options.include_timestamps {
            header.extend(["start_time", "end_time"]);
        }

        let mut rows = vec![header.join(",")];
        for aggregation in aggregations {
            let mut row = vec![
                escape_field(&aggregation.name),
                aggregation.period.to_string(),
                aggregation.function.to_string(),
                format_value(aggregation.value),
                aggregation.sample_count.to_string(),
            ];
            if options.include_timestamps {
                row.push(format_timestamp(aggregation.start_time, options.timestamp_format));
                row.push(format_timestamp(aggregation.end_time, options.timestamp_format));
            }
            rows.push(row.join(","));
        }
        Ok(rows.join("\n") + "\n")
    }
}

/// Quotes fields containing a delimiter, quote or line break.
fn escape_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
