use serde::{Deserialize, Serialize};
use telemetry_exporter::{ExportFormat, ExportOptions, TimestampFormat};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 守护进程周期性导出配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    pub format: ExportFormat,
    pub interval_ms: u64,
    pub include_timestamps: bool,
    pub include_labels: bool,
    pub include_metadata: bool,
    pub timestamp_format: TimestampFormat,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            format: ExportFormat::Prometheus,
            interval_ms: 10_000,
            include_timestamps: true,
            include_labels: true,
            include_metadata: true,
            timestamp_format: TimestampFormat::Unix,
        }
    }
}

impl ExportConfig {
    pub fn options(&self) -> ExportOptions {
        ExportOptions {
            format: self.format,
            include_timestamps: self.include_timestamps,
            include_labels: self.include_labels,
            include_metadata: self.include_metadata,
            timestamp_format: self.timestamp_format,
        }
    }
}

impl ConfigValidator for ExportConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_interval_ms(self.interval_ms, "export.interval_ms")
    }
}
