use std::io::Write;
use std::time::Duration;

use anyhow::{Context, Result};
use telemetry_config::AppConfig;
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::manager::MetricsManager;

/// 守护进程：采集进程指标并周期性导出到标准输出
pub struct Application {
    config: AppConfig,
    manager: MetricsManager,
}

impl Application {
    pub fn new(config: AppConfig) -> Self {
        info!(
            export.format = %config.export.format,
            export.interval_ms = config.export.interval_ms,
            "初始化应用程序"
        );
        let manager = MetricsManager::from_app_config(&config);
        Self { config, manager }
    }

    pub fn manager(&self) -> &MetricsManager {
        &self.manager
    }

    /// 按配置格式导出全部指标
    pub fn export_once(&self) -> Result<String> {
        let result = self
            .manager
            .export(&self.config.export.options())
            .context("导出指标失败")?;
        Ok(result.content)
    }

    /// 运行直到收到关闭信号，随后释放管理器
    pub async fn run(&self, mut shutdown_rx: broadcast::Receiver<()>) -> Result<()> {
        self.manager.start().context("启动指标管理器失败")?;
        self.manager
            .enable_system_metrics()
            .context("启用系统指标失败")?;

        let mut ticker = tokio::time::interval(Duration::from_millis(self.config.export.interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        ticker.tick().await;

        info!("应用程序已启动");
        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("收到关闭信号，停止导出");
                    break;
                }
                _ = ticker.tick() => {
                    match self.export_once() {
                        Ok(content) => {
                            let mut stdout = std::io::stdout().lock();
                            if let Err(e) = writeln!(stdout, "{content}") {
                                error!("写入标准输出失败: {e}");
                            }
                        }
                        Err(e) => error!("周期导出失败: {e:#}"),
                    }
                }
            }
        }

        self.manager.dispose();
        info!("应用程序已停止");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_core::Labels;
    use telemetry_exporter::ExportFormat;

    #[tokio::test]
    async fn test_export_once_uses_configured_format() {
        let mut config = AppConfig::default();
        config.export.format = ExportFormat::Csv;
        let app = Application::new(config);
        app.manager().set_gauge("temp", 21.5, Labels::new()).unwrap();

        let content = app.export_once().unwrap();
        assert!(content.starts_with("metric_name,metric_type,value"));
        assert!(content.contains("temp,gauge,21.5"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_shutdown() {
        let mut config = AppConfig::default();
        config.export.interval_ms = 50;
        let app = std::sync::Arc::new(Application::new(config));
        let (tx, rx) = broadcast::channel(1);

        let runner = app.clone();
        let handle = tokio::spawn(async move { runner.run(rx).await });

        tokio::time::sleep(Duration::from_millis(120)).await;
        assert!(app.manager().is_auto_collecting());

        tx.send(()).unwrap();
        handle.await.unwrap().unwrap();
        assert!(!app.manager().is_auto_collecting());
        assert_eq!(app.manager().get_stats().total_metrics, 0);
    }
}
