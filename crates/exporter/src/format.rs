use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use telemetry_core::TelemetryError;

/// Wire formats the exporter can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    /// Prometheus exposition text
    Prometheus,
    /// JSON array of metrics
    Json,
    /// Comma separated rows with a fixed header
    Csv,
    /// InfluxDB line protocol
    #[serde(alias = "influx")]
    Influxdb,
    /// Graphite plaintext protocol
    Graphite,
}

impl ExportFormat {
    pub const ALL: [ExportFormat; 5] = [
        ExportFormat::Prometheus,
        ExportFormat::Json,
        ExportFormat::Csv,
        ExportFormat::Influxdb,
        ExportFormat::Graphite,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ExportFormat::Prometheus => "prometheus",
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Influxdb => "influxdb",
            ExportFormat::Graphite => "graphite",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prometheus" => Ok(ExportFormat::Prometheus),
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "influxdb" | "influx" => Ok(ExportFormat::Influxdb),
            "graphite" => Ok(ExportFormat::Graphite),
            _ => Err(TelemetryError::UnsupportedFormat(s.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimestampFormat {
    /// Epoch milliseconds
    #[default]
    Unix,
    /// RFC 3339 with millisecond precision
    Iso,
}

impl FromStr for TimestampFormat {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "unix" => Ok(TimestampFormat::Unix),
            "iso" => Ok(TimestampFormat::Iso),
            other => Err(TelemetryError::config_error(format!(
                "unknown timestamp format '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportOptions {
    pub format: ExportFormat,
    pub include_timestamps: bool,
    pub include_labels: bool,
    pub include_metadata: bool,
    pub timestamp_format: TimestampFormat,
}

impl ExportOptions {
    pub fn new(format: ExportFormat) -> Self {
        Self {
            format,
            include_timestamps: true,
            include_labels: true,
            include_metadata: true,
            timestamp_format: TimestampFormat::Unix,
        }
    }

    pub fn without_timestamps(mut self) -> Self {
        self.include_timestamps = false;
        self
    }

    pub fn without_labels(mut self) -> Self {
        self.include_labels = false;
        self
    }

    pub fn without_metadata(mut self) -> Self {
        self.include_metadata = false;
        self
    }

    pub fn with_timestamp_format(mut self, timestamp_format: TimestampFormat) -> Self {
        self.timestamp_format = timestamp_format;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportResult {
    pub format: ExportFormat,
    pub content: String,
    /// Epoch milliseconds when the export was produced.
    pub timestamp: i64,
    pub metric_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_formats() {
        for format in ExportFormat::ALL {
            assert_eq!(format.as_str().parse::<ExportFormat>().unwrap(), format);
        }
        assert_eq!("Influx".parse::<ExportFormat>().unwrap(), ExportFormat::Influxdb);
        assert!(matches!(
            "xml".parse::<ExportFormat>(),
            Err(TelemetryError::UnsupportedFormat(name)) if name == "xml"
        ));
    }

    #[test]
    fn test_default_options() {
        let options = ExportOptions::new(ExportFormat::Json);
        assert!(options.include_timestamps);
        assert!(options.include_labels);
        assert!(options.include_metadata);
        assert_eq!(options.timestamp_format, TimestampFormat::Unix);
    }

    #[test]
    fn test_serde_alias() {
        let format: ExportFormat = serde_json::from_str("\"influx\"").unwrap();
        assert_eq!(format, ExportFormat::Influxdb);
        assert_eq!("iso".parse::<TimestampFormat>().unwrap(), TimestampFormat::Iso);
    }
}
