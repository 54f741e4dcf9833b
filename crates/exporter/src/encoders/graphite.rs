use std::fmt::Write;

use telemetry_core::{AggregatedMetric, Labels, Metric, TelemetryResult};

use super::{format_value, MetricsEncoder};
use crate::format::{ExportFormat, ExportOptions};

/// Graphite plaintext encoder: `path value [timestamp_seconds]` per value.
/// Labels become Graphite 1.1 tags (`path;key=value`).
pub struct GraphiteEncoder;

impl GraphiteEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for GraphiteEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEncoder for GraphiteEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Graphite
    }

    fn encode(&self, metrics: &[&Metric], options: &ExportOptions) -> TelemetryResult<String> {
        let mut out = String::new();
        for metric in metrics {
            let base = sanitize_path(&metric.name);
            for value in &metric.values {
                out.push_str(&base);
                if options.include_labels {
                    out.push_str(&format_tags(&value.labels));
                }
                let _ = write!(out, " {}", format_value(value.value));
                if options.include_timestamps {
                    let _ = write!(out, " {}", value.timestamp.div_euclid(1000));
                }
                out.push('\n');
            }
        }
        Ok(out)
    }

    fn encode_aggregated(
        &self,
        aggregations: &[AggregatedMetric],
        options: &ExportOptions,
    ) -> TelemetryResult<String> {
        let mut out = String::new();
        for aggregation in aggregations {
            let _ = write!(
                out,
                "{}.{}.{} {}",
                sanitize_path(&aggregation.name),
                aggregation.function,
                aggregation.period,
                format_value(aggregation.value)
            );
            if options.include_timestamps {
                let _ = write!(out, " {}", aggregation.end_time.div_euclid(1000));
            }
            out.push('\n');
        }
        Ok(out)
    }
}

/// Whitespace and tag delimiters are not allowed in a Graphite path.
fn sanitize_path(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_whitespace() || c == ';' || c == '=' { '_' } else { c })
        .collect()
}

/// Graphite 1.1 rejects tags with an empty name or value, so those are dropped.
fn format_tags(labels: &Labels) -> String {
    labels
        .iter()
        .filter(|(k, v)| !k.is_empty() && !v.is_empty())
        .map(|(k, v)| format!(";{}={}", sanitize_path(k), sanitize_tag_value(v)))
        .collect()
}

fn sanitize_tag_value(value: &str) -> String {
    value
        .chars()
        .map(|c| if c.is_whitespace() || c == ';' || c == '~' { '_' } else { c })
        .collect()
}
