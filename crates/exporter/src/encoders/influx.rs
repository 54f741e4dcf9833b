use influxdb_line_protocol::LineProtocolBuilder;

use telemetry_core::{AggregatedMetric, Metric, TelemetryResult};

use super::MetricsEncoder;
use crate::format::{ExportFormat, ExportOptions};

const NANOS_PER_MILLI: i64 = 1_000_000;

/// InfluxDB line protocol encoder
///
/// Line protocol has no representation for NaN or infinities, so those
/// samples are skipped.
pub struct InfluxEncoder;

impl InfluxEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for InfluxEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEncoder for InfluxEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Influxdb
    }

    fn encode(&self, metrics: &[&Metric], options: &ExportOptions) -> TelemetryResult<String> {
        let mut lines = Vec::new();
        for metric in metrics {
            for value in metric.values.iter().filter(|v| v.value.is_finite()) {
                let mut builder = LineProtocolBuilder::new().measurement(&metric.name);
                if options.include_labels {
                    // empty tag keys or values are invalid line protocol
                    for (key, label) in value
                        .labels
                        .iter()
                        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
                    {
                        builder = builder.tag(key, label);
                    }
                }
                let builder = builder.field("value", value.value);
                let bytes = if options.include_timestamps {
                    builder
                        .timestamp(value.timestamp * NANOS_PER_MILLI)
                        .close_line()
                        .build()
                } else {
                    builder.close_line().build()
                };
                lines.push(String::from_utf8_lossy(&bytes).into_owned());
            }
        }
        Ok(lines.concat())
    }

    fn encode_aggregated(
        &self,
        aggregations: &[AggregatedMetric],
        options: &ExportOptions,
    ) -> TelemetryResult<String> {
        let mut lines = Vec::new();
        for aggregation in aggregations.iter().filter(|a| a.value.is_finite()) {
            let builder = LineProtocolBuilder::new()
                .measurement(&aggregation.name)
                .tag("function", aggregation.function.as_str())
                .tag("period", aggregation.period.as_str())
                .field("value", aggregation.value)
                .field("sample_count", aggregation.sample_count as u64);
            let bytes = if options.include_timestamps {
                builder
                    .timestamp(aggregation.end_time * NANOS_PER_MILLI)
                    .close_line()
                    .build()
            } else {
                builder.close_line().build()
            };
            lines.push(String::from_utf8_lossy(&bytes).into_owned());
        }
        Ok(lines.concat())
    }
}
