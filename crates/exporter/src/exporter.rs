use std::sync::Arc;

use tracing::debug;

use telemetry_core::{AggregatedMetric, Clock, Metric, SystemClock, TelemetryResult};

use crate::encoders::create_encoder;
use crate::format::{ExportFormat, ExportOptions, ExportResult};

/// Stateless front end over the format encoders.
pub struct MetricsExporter {
    clock: Arc<dyn Clock>,
}

impl MetricsExporter {
    pub fn new() -> Self {
        Self {
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    pub fn export(&self, metrics: &[&Metric], options: &ExportOptions) -> TelemetryResult<ExportResult> {
        let content = create_encoder(options.format).encode(metrics, options)?;
        Ok(self.finish(options.format, content, metrics.len()))
    }

    pub fn export_aggregated(
        &self,
        aggregations: &[AggregatedMetric],
        options: &ExportOptions,
    ) -> TelemetryResult<ExportResult> {
        let content = create_encoder(options.format).encode_aggregated(aggregations, options)?;
        Ok(self.finish(options.format, content, aggregations.len()))
    }

    pub fn get_supported_formats(&self) -> Vec<ExportFormat> {
        ExportFormat::ALL.to_vec()
    }

    fn finish(&self, format: ExportFormat, content: String, metric_count: usize) -> ExportResult {
        debug!(
            format = %format,
            metric_count,
            bytes = content.len(),
            "Export encoded"
        );
        ExportResult {
            format,
            content,
            timestamp: self.clock.now_millis(),
            metric_count,
        }
    }
}

impl Default for MetricsExporter {
    fn default() -> Self {
        Self::new()
    }
}
