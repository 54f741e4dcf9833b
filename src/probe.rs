use parking_lot::Mutex;
use sysinfo::{Pid, System};
use tracing::debug;

use telemetry_core::{Labels, MetricType, TelemetryError, TelemetryResult};

use crate::manager::MetricsManager;

pub const PROCESS_CPU_USAGE: &str = "process_cpu_usage_percent";
pub const PROCESS_MEMORY_RSS: &str = "process_memory_rss_bytes";
pub const PROCESS_MEMORY_VIRTUAL: &str = "process_memory_virtual_bytes";

/// Gauges written by [`SystemProbe`], with their descriptions and units.
pub const SYSTEM_GAUGES: [(&str, &str, &str); 3] = [
    (PROCESS_CPU_USAGE, "CPU usage of this process", "percent"),
    (PROCESS_MEMORY_RSS, "Resident memory of this process", "bytes"),
    (PROCESS_MEMORY_VIRTUAL, "Virtual memory of this process", "bytes"),
];

/// A source of measurements sampled on a timer.
pub trait Probe: Send + Sync {
    fn name(&self) -> &str;

    /// Records the current readings through `manager`.
    fn collect(&self, manager: &MetricsManager) -> TelemetryResult<()>;
}

/// Samples CPU and memory usage of the current process.
pub struct SystemProbe {
    system: Mutex<System>,
    pid: Pid,
}

impl SystemProbe {
    pub fn new() -> TelemetryResult<Self> {
        let pid = sysinfo::get_current_pid().map_err(|e| {
            TelemetryError::config_error(format!("cannot resolve current pid: {e}"))
        })?;
        Ok(Self {
            system: Mutex::new(System::new()),
            pid,
        })
    }

    /// Registers the probe's gauges when they are not known yet.
    pub fn register_gauges(manager: &MetricsManager) -> TelemetryResult<()> {
        for (name, description, unit) in SYSTEM_GAUGES {
            if !manager.has_metric(name) {
                manager.register_metric(
                    name,
                    MetricType::Gauge,
                    description,
                    crate::manager::RegisterMetric::default()
                        .with_unit(unit)
                        .with_category("system"),
                )?;
            }
        }
        Ok(())
    }
}

impl Probe for SystemProbe {
    fn name(&self) -> &str {
        "system"
    }

    fn collect(&self, manager: &MetricsManager) -> TelemetryResult<()> {
        let (cpu, rss, virt) = {
            let mut system = self.system.lock();
            system.refresh_process(self.pid);
            let process = system.process(self.pid).ok_or_else(|| {
                TelemetryError::config_error(format!("process {} not found", self.pid))
            })?;
            (
                f64::from(process.cpu_usage()),
                process.memory() as f64,
                process.virtual_memory() as f64,
            )
        };

        debug!(cpu_percent = cpu, rss_bytes = rss, "System probe sampled");
        manager.set_gauge(PROCESS_CPU_USAGE, cpu, Labels::new())?;
        manager.set_gauge(PROCESS_MEMORY_RSS, rss, Labels::new())?;
        manager.set_gauge(PROCESS_MEMORY_VIRTUAL, virt, Labels::new())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_config::ManagerConfig;

    #[test]
    fn test_system_probe_writes_gauges() {
        let manager = MetricsManager::new(ManagerConfig::default());
        SystemProbe::register_gauges(&manager).unwrap();
        let probe = SystemProbe::new().unwrap();

        probe.collect(&manager).unwrap();

        assert!(manager.get_gauge_value(PROCESS_MEMORY_RSS) > 0.0);
        for (name, _, _) in SYSTEM_GAUGES {
            let metric = manager.get_metric(name).unwrap();
            assert_eq!(metric.metric_type, MetricType::Gauge);
            assert_eq!(metric.values.len(), 1);
        }
        let metadata = manager.registry_metadata(PROCESS_CPU_USAGE).unwrap();
        assert_eq!(metadata.category, "system");
        assert_eq!(metadata.unit, "percent");
    }

    #[test]
    fn test_register_gauges_is_idempotent() {
        let manager = MetricsManager::new(ManagerConfig::default());
        SystemProbe::register_gauges(&manager).unwrap();
        SystemProbe::register_gauges(&manager).unwrap();
        assert_eq!(manager.get_stats().total_metrics, 3);
    }
}
