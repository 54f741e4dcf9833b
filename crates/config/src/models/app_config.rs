use anyhow::{Context, Result};
use config::{Config as ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::Path;

use super::{
    export::ExportConfig,
    logging::LoggingConfig,
    manager::{LimitsConfig, ManagerConfig},
};
use crate::validation::ConfigValidator;

const DEFAULT_CONFIG_PATHS: [&str; 3] = [
    "config/telemetry.toml",
    "telemetry.toml",
    "/etc/telemetry/config.toml",
];

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub manager: ManagerConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub export: ExportConfig,
}

impl AppConfig {
    /// 加载配置：默认值 -> TOML文件 -> 环境变量（TELEMETRY_ 前缀，`__` 分隔层级）
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let defaults = AppConfig::default();
        let mut builder = ConfigBuilder::builder()
            .set_default("manager.enable_auto_collection", defaults.manager.enable_auto_collection)?
            .set_default("manager.collection_interval_ms", defaults.manager.collection_interval_ms)?
            .set_default("manager.enable_dashboard", defaults.manager.enable_dashboard)?
            .set_default("manager.enable_registry", defaults.manager.enable_registry)?
            .set_default("manager.default_category", defaults.manager.default_category.as_str())?
            .set_default("manager.enable_system_metrics", defaults.manager.enable_system_metrics)?
            .set_default(
                "manager.system_metrics_interval_ms",
                defaults.manager.system_metrics_interval_ms,
            )?
            .set_default("limits.max_values_per_metric", defaults.limits.max_values_per_metric as u64)?
            .set_default("limits.max_summary_samples", defaults.limits.max_summary_samples as u64)?
            .set_default(
                "limits.max_aggregation_history",
                defaults.limits.max_aggregation_history as u64,
            )?
            .set_default("logging.level", defaults.logging.level.to_string())?
            .set_default("logging.format", "pretty")?
            .set_default("logging.include_location", defaults.logging.include_location)?
            .set_default("logging.include_thread_id", defaults.logging.include_thread_id)?
            .set_default("logging.include_thread_name", defaults.logging.include_thread_name)?
            .set_default("export.format", defaults.export.format.as_str())?
            .set_default("export.interval_ms", defaults.export.interval_ms)?
            .set_default("export.include_timestamps", defaults.export.include_timestamps)?
            .set_default("export.include_labels", defaults.export.include_labels)?
            .set_default("export.include_metadata", defaults.export.include_metadata)?
            .set_default("export.timestamp_format", "unix")?;

        if let Some(path) = config_path {
            if Path::new(path).exists() {
                builder = builder.add_source(File::new(path, FileFormat::Toml));
            } else {
                return Err(anyhow::anyhow!("配置文件不存在: {}", path));
            }
        } else if let Some(path) = DEFAULT_CONFIG_PATHS
            .iter()
            .find(|path| Path::new(path).exists())
        {
            builder = builder.add_source(File::new(path, FileFormat::Toml));
        }

        builder = builder.add_source(
            Environment::with_prefix("TELEMETRY")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: AppConfig = builder
            .build()
            .context("构建配置失败")?
            .try_deserialize()
            .context("反序列化配置失败")?;

        config.validate()?;

        Ok(config)
    }

    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(toml_str).context("解析TOML配置失败")?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("序列化配置为TOML失败")
    }
}

impl ConfigValidator for AppConfig {
    fn validate(&self) -> crate::ConfigResult<()> {
        self.manager.validate()?;
        self.limits.validate()?;
        self.logging.validate()?;
        self.export.validate()?;
        Ok(())
    }
}
