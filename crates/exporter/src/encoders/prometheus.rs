use std::fmt::Write;

use telemetry_core::{AggregatedMetric, Labels, Metric, TelemetryResult};

use super::{format_value, MetricsEncoder};
use crate::format::{ExportFormat, ExportOptions};

/// Prometheus exposition text encoder. Only the latest sample of each metric
/// is written; timestamps are always epoch milliseconds.
pub struct PrometheusEncoder;

impl PrometheusEncoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PrometheusEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsEncoder for PrometheusEncoder {
    fn format(&self) -> ExportFormat {
        ExportFormat::Prometheus
    }

    fn encode(&self, metrics: &[&Metric], options: &ExportOptions) -> TelemetryResult<String> {
        let mut out = String::new();
        for metric in metrics {
            let name = sanitize_name(&metric.name);
            let _ = writeln!(out, "# HELP {} {}", name, escape_help(&metric.description));
            let _ = writeln!(out, "# TYPE {} {}", name, metric.metric_type);

            let Some(latest) = metric.latest() else {
                continue;
            };
            out.push_str(&name);
            if options.include_labels {
                out.push_str(&format_labels(&latest.labels));
            }
            let _ = write!(out, " {}", format_value(latest.value));
            if options.include_timestamps {
                let _ = write!(out, " {}", latest.timestamp);
            }
            out.push('\n');
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
            let name = sanitize_name(&format!(
                "{}_{}_{}",
                aggregation.name, aggregation.function, aggregation.period
            ));
            let _ = writeln!(
                out,
                "# HELP {} {} of {} over {}",
                name, aggregation.function, aggregation.name, aggregation.period
            );
            let _ = writeln!(out, "# TYPE {name} gauge");
            let _ = write!(out, "{} {}", name, format_value(aggregation.value));
            if options.include_timestamps {
                let _ = write!(out, " {}", aggregation.end_time);
            }
            out.push('\n');
        }
        Ok(out)
    }
}

/// Replaces characters outside `[a-zA-Z0-9_:]` and prefixes a leading digit.
fn sanitize_name(name: &str) -> String {
    let mut sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == ':' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.starts_with(|c: char| c.is_ascii_digit()) {
        sanitized.insert(0, '_');
    }
    sanitized
}

fn escape_help(text: &str) -> String {
    text.replace('\\', "\\\\").replace('\n', "\\n")
}

fn escape_label_value(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn format_labels(labels: &Labels) -> String {
    if labels.is_empty() {
        return String::new();
    }
    let pairs: Vec<String> = labels
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", sanitize_name(k), escape_label_value(v)))
        .collect();
    format!("{{{}}}", pairs.join(","))
}
