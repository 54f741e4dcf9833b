use thiserror::Error;

use crate::models::MetricType;

/// 遥测引擎错误类型定义
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("Metric '{name}' is already registered")]
    DuplicateMetric { name: String },

    #[error("Metric '{name}' is registered as {actual}, not {expected}")]
    TypeMismatch {
        name: String,
        expected: MetricType,
        actual: MetricType,
    },

    #[error("Metric '{name}' not found")]
    NotFound { name: String },

    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid aggregation period: {0}")]
    InvalidPeriod(String),

    #[error("Invalid aggregation function: {0}")]
    InvalidFunction(String),

    #[error("Invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// 统一的Result类型
pub type TelemetryResult<T> = std::result::Result<T, TelemetryError>;

impl TelemetryError {
    pub fn duplicate<S: Into<String>>(name: S) -> Self {
        Self::DuplicateMetric { name: name.into() }
    }
    pub fn not_found<S: Into<String>>(name: S) -> Self {
        Self::NotFound { name: name.into() }
    }
    pub fn type_mismatch<S: Into<String>>(name: S, expected: MetricType, actual: MetricType) -> Self {
        Self::TypeMismatch {
            name: name.into(),
            expected,
            actual,
        }
    }
    pub fn config_error<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
    /// Registration and type-safety violations point at a bug in the calling code.
    pub fn is_programming_error(&self) -> bool {
        matches!(
            self,
            TelemetryError::DuplicateMetric { .. } | TelemetryError::TypeMismatch { .. }
        )
    }
}
