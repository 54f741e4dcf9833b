use serde::{Deserialize, Serialize};

use crate::validation::{ConfigValidator, ValidationUtils};

/// 指标管理器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    pub enable_auto_collection: bool,
    pub collection_interval_ms: u64,
    pub enable_dashboard: bool,
    pub enable_registry: bool,
    pub default_category: String,
    pub enable_system_metrics: bool,
    pub system_metrics_interval_ms: u64,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            enable_auto_collection: true,
            collection_interval_ms: 60_000,
            enable_dashboard: true,
            enable_registry: true,
            default_category: "default".to_string(),
            enable_system_metrics: false,
            system_metrics_interval_ms: 5_000,
        }
    }
}

impl ConfigValidator for ManagerConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_interval_ms(
            self.collection_interval_ms,
            "manager.collection_interval_ms",
        )?;
        ValidationUtils::validate_interval_ms(
            self.system_metrics_interval_ms,
            "manager.system_metrics_interval_ms",
        )?;
        ValidationUtils::validate_not_empty(&self.default_category, "manager.default_category")?;
        Ok(())
    }
}

/// 保留容量配置：指标值、摘要样本、聚合历史
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitsConfig {
    pub max_values_per_metric: usize,
    pub max_summary_samples: usize,
    pub max_aggregation_history: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_values_per_metric: 10_000,
            max_summary_samples: 1_000,
            max_aggregation_history: 1_000,
        }
    }
}

impl ConfigValidator for LimitsConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        ValidationUtils::validate_count(
            self.max_values_per_metric,
            "limits.max_values_per_metric",
            1_000_000,
        )?;
        ValidationUtils::validate_count(
            self.max_summary_samples,
            "limits.max_summary_samples",
            1_000_000,
        )?;
        ValidationUtils::validate_count(
            self.max_aggregation_history,
            "limits.max_aggregation_history",
            1_000_000,
        )?;
        Ok(())
    }
}
