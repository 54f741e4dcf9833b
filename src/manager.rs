use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::{debug, info};

use telemetry_aggregator::{Comparison, MetricsAggregator, TrendAnalysis};
use telemetry_collector::{
    CollectorLimits, HistogramStats, MetadataQuery, MetricOptions, MetricRegistry,
    MetricsCollector, RegisterOptions, Registration, RegistryStats, SummaryStats,
};
use telemetry_config::{AppConfig, LimitsConfig, ManagerConfig};
use telemetry_core::{
    AggregatedMetric, AggregationFunction, AggregationPeriod, Clock, Labels, Metric,
    MetricMetadata, MetricType, ScheduledTask, SystemClock, TelemetryError, TelemetryResult,
};
use telemetry_exporter::{ExportOptions, ExportResult, MetricsExporter};
use telemetry_observability::{Dashboard, MetricSource, StructuredLogger};

use crate::probe::{Probe, SystemProbe};

/// Optional attributes for [`MetricsManager::register_metric`].
#[derive(Debug, Clone, Default)]
pub struct RegisterMetric {
    pub unit: String,
    pub labels: Vec<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
}

impl RegisterMetric {
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = unit.into();
        self
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }
}

/// Point-in-time copy of every metric, its hourly average and its metadata.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub metrics: Vec<Metric>,
    pub aggregations: Vec<AggregatedMetric>,
    pub metadata: Vec<MetricMetadata>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ManagerStats {
    pub total_metrics: usize,
    pub total_values: usize,
    pub oldest_timestamp: Option<i64>,
    pub newest_timestamp: Option<i64>,
    pub aggregation_count: usize,
    pub auto_collection_running: bool,
    pub system_metrics_enabled: bool,
    pub registry: Option<RegistryStats>,
}

/// Dashboard view over the manager's collector.
struct CollectorSource(Arc<RwLock<MetricsCollector>>);

impl MetricSource for CollectorSource {
    fn get_metric(&self, name: &str) -> Option<Metric> {
        self.0.read().get_metric(name).cloned()
    }
}

struct ManagerInner {
    config: ManagerConfig,
    collector: Arc<RwLock<MetricsCollector>>,
    registry: Option<RwLock<MetricRegistry>>,
    aggregator: Mutex<MetricsAggregator>,
    exporter: MetricsExporter,
    dashboard: Option<Dashboard>,
    probes: RwLock<Vec<Arc<dyn Probe>>>,
    collection_task: Mutex<Option<ScheduledTask>>,
    system_task: Mutex<Option<ScheduledTask>>,
}

/// Composition root of the telemetry engine.
///
/// Cloning yields another handle to the same stores. Background tasks hold
/// only weak references, so dropping every handle stops them.
#[derive(Clone)]
pub struct MetricsManager {
    inner: Arc<ManagerInner>,
}

impl MetricsManager {
    pub fn new(config: ManagerConfig) -> Self {
        Self::with_clock(config, LimitsConfig::default(), Arc::new(SystemClock))
    }

    pub fn from_app_config(config: &AppConfig) -> Self {
        Self::with_clock(config.manager.clone(), config.limits, Arc::new(SystemClock))
    }

    pub fn with_clock(config: ManagerConfig, limits: LimitsConfig, clock: Arc<dyn Clock>) -> Self {
        let collector = MetricsCollector::with_limits(CollectorLimits {
            max_values_per_metric: limits.max_values_per_metric,
            max_summary_samples: limits.max_summary_samples,
        })
        .with_clock(clock.clone());
        let collector = Arc::new(RwLock::new(collector));

        let registry = config.enable_registry.then(|| {
            RwLock::new(
                MetricRegistry::new()
                    .with_default_category(config.default_category.clone())
                    .with_clock(clock.clone()),
            )
        });

        let dashboard = config
            .enable_dashboard
            .then(|| Dashboard::new(Arc::new(CollectorSource(collector.clone()))));

        let aggregator =
            MetricsAggregator::with_max_history(limits.max_aggregation_history).with_clock(clock.clone());

        info!(
            registry = config.enable_registry,
            dashboard = config.enable_dashboard,
            auto_collection = config.enable_auto_collection,
            "Metrics manager created"
        );

        Self {
            inner: Arc::new(ManagerInner {
                config,
                collector,
                registry,
                aggregator: Mutex::new(aggregator),
                exporter: MetricsExporter::with_clock(clock),
                dashboard,
                probes: RwLock::new(Vec::new()),
                collection_task: Mutex::new(None),
                system_task: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.inner.config
    }

    /// Starts every background task the configuration enables. Needs a tokio runtime.
    pub fn start(&self) -> TelemetryResult<()> {
        if self.inner.config.enable_auto_collection {
            self.start_auto_collection();
        }
        if self.inner.config.enable_system_metrics {
            self.enable_system_metrics()?;
        }
        if let Some(dashboard) = &self.inner.dashboard {
            dashboard.start();
        }
        Ok(())
    }

    // ---- instrumentation ----

    /// Registers in the collector and, when enabled, the registry.
    pub fn register_metric(
        &self,
        name: &str,
        metric_type: MetricType,
        description: &str,
        options: RegisterMetric,
    ) -> TelemetryResult<()> {
        if let Some(registry) = &self.inner.registry {
            if registry.read().contains(name) {
                return Err(TelemetryError::duplicate(name));
            }
        }

        self.inner.collector.write().register_metric(
            name,
            metric_type,
            description,
            MetricOptions {
                labels: options.labels.clone(),
                unit: options.unit.clone(),
            },
        )?;

        if let Some(registry) = &self.inner.registry {
            registry.write().register(
                name,
                metric_type,
                description,
                RegisterOptions {
                    unit: options.unit,
                    labels: options.labels,
                    category: options.category.clone(),
                    tags: options.tags,
                },
            )?;
        }

        StructuredLogger::log_metric_registered(name, metric_type, options.category.as_deref());
        Ok(())
    }

    pub fn increment_counter(&self, name: &str, delta: f64, labels: Labels) -> TelemetryResult<()> {
        let result = self.inner.collector.write().increment_counter(name, delta, labels);
        self.after_record(name, MetricType::Counter, result)
    }

    pub fn set_gauge(&self, name: &str, value: f64, labels: Labels) -> TelemetryResult<()> {
        let result = self.inner.collector.write().set_gauge(name, value, labels);
        self.after_record(name, MetricType::Gauge, result)
    }

    pub fn increment_gauge(&self, name: &str, delta: f64, labels: Labels) -> TelemetryResult<()> {
        let result = self.inner.collector.write().increment_gauge(name, delta, labels);
        self.after_record(name, MetricType::Gauge, result)
    }

    pub fn decrement_gauge(&self, name: &str, delta: f64, labels: Labels) -> TelemetryResult<()> {
        let result = self.inner.collector.write().decrement_gauge(name, delta, labels);
        self.after_record(name, MetricType::Gauge, result)
    }

    pub fn observe_histogram(&self, name: &str, value: f64, labels: Labels) -> TelemetryResult<()> {
        let result = self.inner.collector.write().observe_histogram(name, value, labels);
        self.after_record(name, MetricType::Histogram, result)
    }

    pub fn observe_summary(&self, name: &str, value: f64, labels: Labels) -> TelemetryResult<()> {
        let result = self.inner.collector.write().observe_summary(name, value, labels);
        self.after_record(name, MetricType::Summary, result)
    }

    /// Mirrors auto-registered metrics into the registry and logs mismatches.
    fn after_record(
        &self,
        name: &str,
        metric_type: MetricType,
        result: TelemetryResult<Registration>,
    ) -> TelemetryResult<()> {
        match result {
            Ok(Registration::Existing) => Ok(()),
            Ok(Registration::Created) => {
                StructuredLogger::log_metric_auto_registered(name, metric_type);
                if let Some(registry) = &self.inner.registry {
                    let mut registry = registry.write();
                    if !registry.contains(name) {
                        let description = format!("Auto-registered {metric_type} metric");
                        registry.register(name, metric_type, &description, RegisterOptions::default())?;
                    }
                }
                Ok(())
            }
            Err(err) => {
                if let TelemetryError::TypeMismatch {
                    expected, actual, ..
                } = &err
                {
                    StructuredLogger::log_type_mismatch(name, *expected, *actual);
                }
                Err(err)
            }
        }
    }

    // ---- reads ----

    pub fn has_metric(&self, name: &str) -> bool {
        self.inner.collector.read().has_metric(name)
    }

    pub fn get_metric(&self, name: &str) -> Option<Metric> {
        self.inner.collector.read().get_metric(name).cloned()
    }

    pub fn get_all_metrics(&self) -> Vec<Metric> {
        self.inner
            .collector
            .read()
            .get_all_metrics()
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn get_counter_value(&self, name: &str) -> f64 {
        self.inner.collector.read().get_counter_value(name)
    }

    pub fn get_gauge_value(&self, name: &str) -> f64 {
        self.inner.collector.read().get_gauge_value(name)
    }

    pub fn get_histogram_stats(&self, name: &str) -> Option<HistogramStats> {
        self.inner.collector.read().get_histogram_stats(name)
    }

    pub fn get_summary_stats(&self, name: &str) -> Option<SummaryStats> {
        self.inner.collector.read().get_summary_stats(name)
    }

    /// Clears the metric's values and cached aggregations; keeps its registration.
    pub fn reset_metric(&self, name: &str) -> bool {
        let reset = self.inner.collector.write().reset_metric(name);
        if reset {
            self.inner.aggregator.lock().clear_metric(name);
        }
        reset
    }

    // ---- aggregation ----

    pub fn aggregate(
        &self,
        name: &str,
        period: AggregationPeriod,
        function: AggregationFunction,
        end_time: Option<i64>,
    ) -> TelemetryResult<AggregatedMetric> {
        self.with_metric(name, |metric, aggregator| {
            aggregator.aggregate(metric, period, function, end_time)
        })
    }

    /// One aggregation per metric, all sharing the same window end.
    pub fn aggregate_all(
        &self,
        period: AggregationPeriod,
        function: AggregationFunction,
        end_time: Option<i64>,
    ) -> Vec<AggregatedMetric> {
        let collector = self.inner.collector.read();
        let mut aggregator = self.inner.aggregator.lock();
        aggregator.aggregate_multiple(collector.get_all_metrics(), period, function, end_time)
    }

    pub fn calculate_rolling(
        &self,
        name: &str,
        period: AggregationPeriod,
        function: AggregationFunction,
        window_size: usize,
    ) -> TelemetryResult<Vec<AggregatedMetric>> {
        self.with_metric(name, |metric, aggregator| {
            aggregator.calculate_rolling(metric, period, function, window_size)
        })
    }

    pub fn compare(
        &self,
        name: &str,
        period: AggregationPeriod,
        function: AggregationFunction,
        current_end: Option<i64>,
        previous_end: Option<i64>,
    ) -> TelemetryResult<Comparison> {
        self.with_metric(name, |metric, aggregator| {
            aggregator.compare(metric, period, function, current_end, previous_end)
        })
    }

    pub fn analyze_trend(
        &self,
        name: &str,
        period: AggregationPeriod,
        function: AggregationFunction,
        data_points: usize,
    ) -> TelemetryResult<TrendAnalysis> {
        let analysis = self.with_metric(name, |metric, aggregator| {
            aggregator.analyze_trend(metric, period, function, data_points)
        })?;
        StructuredLogger::log_trend_detected(
            name,
            analysis.trend.as_str(),
            analysis.slope,
            analysis.aggregations.len(),
        );
        Ok(analysis)
    }

    pub fn get_aggregation_history(
        &self,
        name: &str,
        period: AggregationPeriod,
        function: AggregationFunction,
    ) -> Vec<AggregatedMetric> {
        self.inner
            .aggregator
            .lock()
            .get_aggregation_history(name, period, function)
    }

    fn with_metric<T>(
        &self,
        name: &str,
        f: impl FnOnce(&Metric, &mut MetricsAggregator) -> T,
    ) -> TelemetryResult<T> {
        let collector = self.inner.collector.read();
        let metric = collector
            .get_metric(name)
            .ok_or_else(|| TelemetryError::not_found(name))?;
        let mut aggregator = self.inner.aggregator.lock();
        Ok(f(metric, &mut aggregator))
    }

    // ---- export ----

    /// Exports every metric.
    pub fn export(&self, options: &ExportOptions) -> TelemetryResult<ExportResult> {
        let started = Instant::now();
        let result = {
            let collector = self.inner.collector.read();
            self.inner.exporter.export(&collector.get_all_metrics(), options)?
        };
        self.log_export(&result, started);
        Ok(result)
    }

    /// Exports the named metrics; unknown names fail with `NotFound`.
    pub fn export_metrics(&self, names: &[&str], options: &ExportOptions) -> TelemetryResult<ExportResult> {
        let started = Instant::now();
        let result = {
            let collector = self.inner.collector.read();
            let metrics = names
                .iter()
                .map(|name| {
                    collector
                        .get_metric(name)
                        .ok_or_else(|| TelemetryError::not_found(*name))
                })
                .collect::<TelemetryResult<Vec<_>>>()?;
            self.inner.exporter.export(&metrics, options)?
        };
        self.log_export(&result, started);
        Ok(result)
    }

    pub fn export_aggregated(
        &self,
        aggregations: &[AggregatedMetric],
        options: &ExportOptions,
    ) -> TelemetryResult<ExportResult> {
        let started = Instant::now();
        let result = self.inner.exporter.export_aggregated(aggregations, options)?;
        self.log_export(&result, started);
        Ok(result)
    }

    fn log_export(&self, result: &ExportResult, started: Instant) {
        StructuredLogger::log_export_completed(
            result.format.as_str(),
            result.metric_count,
            result.content.len(),
            started.elapsed().as_millis() as u64,
        );
    }

    // ---- metadata ----

    /// Empty when the registry is disabled.
    pub fn query(&self, query: &MetadataQuery) -> Vec<MetricMetadata> {
        self.inner
            .registry
            .as_ref()
            .map(|registry| registry.read().query(query))
            .unwrap_or_default()
    }

    pub fn search(&self, pattern: &str) -> TelemetryResult<Vec<MetricMetadata>> {
        match &self.inner.registry {
            Some(registry) => Ok(registry
                .read()
                .search(pattern)?
                .into_iter()
                .cloned()
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    pub fn registry_metadata(&self, name: &str) -> Option<MetricMetadata> {
        self.inner
            .registry
            .as_ref()
            .and_then(|registry| registry.read().get(name).cloned())
    }

    /// Runs `f` against the registry, or returns `None` when it is disabled.
    pub fn with_registry<T>(&self, f: impl FnOnce(&mut MetricRegistry) -> T) -> Option<T> {
        self.inner
            .registry
            .as_ref()
            .map(|registry| f(&mut registry.write()))
    }

    // ---- snapshots and stats ----

    pub fn take_snapshot(&self) -> MetricsSnapshot {
        let collector = self.inner.collector.read();
        let metrics: Vec<&Metric> = collector.get_all_metrics();
        let aggregations = self.inner.aggregator.lock().aggregate_multiple(
            metrics.iter().copied(),
            AggregationPeriod::OneHour,
            AggregationFunction::Average,
            None,
        );
        let metadata = self
            .inner
            .registry
            .as_ref()
            .map(|registry| registry.read().get_all().into_iter().cloned().collect())
            .unwrap_or_default();

        MetricsSnapshot {
            timestamp: Utc::now(),
            metrics: metrics.into_iter().cloned().collect(),
            aggregations,
            metadata,
        }
    }

    pub fn get_stats(&self) -> ManagerStats {
        let (total_metrics, total_values, oldest, newest) = {
            let collector = self.inner.collector.read();
            let metrics = collector.get_all_metrics();
            let oldest = metrics
                .iter()
                .filter_map(|m| m.values.first().map(|v| v.timestamp))
                .min();
            let newest = metrics
                .iter()
                .filter_map(|m| m.latest().map(|v| v.timestamp))
                .max();
            (metrics.len(), collector.total_values(), oldest, newest)
        };

        ManagerStats {
            total_metrics,
            total_values,
            oldest_timestamp: oldest,
            newest_timestamp: newest,
            aggregation_count: self.inner.aggregator.lock().get_aggregation_count(),
            auto_collection_running: self.is_auto_collecting(),
            system_metrics_enabled: self.inner.system_task.lock().is_some(),
            registry: self
                .inner
                .registry
                .as_ref()
                .map(|registry| registry.read().get_stats()),
        }
    }

    // ---- probes and background tasks ----

    pub fn add_probe(&self, probe: Arc<dyn Probe>) {
        debug!(probe = probe.name(), "Probe added");
        self.inner.probes.write().push(probe);
    }

    pub fn probe_count(&self) -> usize {
        self.inner.probes.read().len()
    }

    /// Runs every probe once. Failures are logged and do not stop the cycle.
    pub fn collect_now(&self) {
        let started = Instant::now();
        let probes: Vec<Arc<dyn Probe>> = self.inner.probes.read().clone();
        for probe in &probes {
            if let Err(err) = probe.collect(self) {
                StructuredLogger::log_probe_failed(probe.name(), &err.to_string());
            }
        }
        StructuredLogger::log_collection_cycle(probes.len(), started.elapsed().as_millis() as u64);
    }

    /// Runs the probes every `collection_interval_ms`. Needs a tokio runtime.
    pub fn start_auto_collection(&self) {
        let mut slot = self.inner.collection_task.lock();
        if slot.is_some() {
            return;
        }
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(ScheduledTask::spawn(
            "auto-collection",
            Duration::from_millis(self.inner.config.collection_interval_ms),
            move || {
                if let Some(manager) = upgrade(&weak) {
                    manager.collect_now();
                }
            },
        ));
    }

    pub fn stop_auto_collection(&self) -> bool {
        match self.inner.collection_task.lock().take() {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_auto_collecting(&self) -> bool {
        self.inner.collection_task.lock().is_some()
    }

    /// Registers the process gauges and samples them every
    /// `system_metrics_interval_ms`. Needs a tokio runtime.
    pub fn enable_system_metrics(&self) -> TelemetryResult<()> {
        let mut slot = self.inner.system_task.lock();
        if slot.is_some() {
            return Ok(());
        }
        SystemProbe::register_gauges(self)?;
        let probe = SystemProbe::new()?;

        let weak = Arc::downgrade(&self.inner);
        *slot = Some(ScheduledTask::spawn(
            "system-metrics",
            Duration::from_millis(self.inner.config.system_metrics_interval_ms),
            move || {
                if let Some(manager) = upgrade(&weak) {
                    if let Err(err) = probe.collect(&manager) {
                        StructuredLogger::log_probe_failed(probe.name(), &err.to_string());
                    }
                }
            },
        ));
        info!("System metrics enabled");
        Ok(())
    }

    pub fn disable_system_metrics(&self) -> bool {
        match self.inner.system_task.lock().take() {
            Some(task) => {
                task.cancel();
                true
            }
            None => false,
        }
    }

    pub fn dashboard(&self) -> Option<&Dashboard> {
        self.inner.dashboard.as_ref()
    }

    /// Stops every background task and clears all stores.
    pub fn dispose(&self) {
        let mut cancelled = 0;
        if self.stop_auto_collection() {
            cancelled += 1;
        }
        if self.disable_system_metrics() {
            cancelled += 1;
        }
        if let Some(dashboard) = &self.inner.dashboard {
            cancelled += dashboard.stop();
            dashboard.clear();
        }
        self.inner.probes.write().clear();

        let metric_count = {
            let mut collector = self.inner.collector.write();
            let count = collector.get_metrics_count();
            collector.clear();
            count
        };
        if let Some(registry) = &self.inner.registry {
            registry.write().clear();
        }
        self.inner.aggregator.lock().clear();

        StructuredLogger::log_manager_disposed(metric_count, cancelled);
    }
}

fn upgrade(weak: &Weak<ManagerInner>) -> Option<MetricsManager> {
    weak.upgrade().map(|inner| MetricsManager { inner })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use telemetry_collector::{MetadataFilter, SortField};
    use telemetry_core::ManualClock;
    use telemetry_exporter::ExportFormat;

    const T: i64 = 1_700_000_000_000;

    fn manager() -> (MetricsManager, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(T));
        let config = ManagerConfig {
            enable_auto_collection: false,
            ..Default::default()
        };
        (
            MetricsManager::with_clock(config, LimitsConfig::default(), clock.clone()),
            clock,
        )
    }

    struct CountingProbe {
        calls: AtomicUsize,
    }

    impl Probe for CountingProbe {
        fn name(&self) -> &str {
            "counting"
        }

        fn collect(&self, manager: &MetricsManager) -> TelemetryResult<()> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            manager.increment_counter("probe_runs_total", 1.0, Labels::new())
        }
    }

    struct FailingProbe;

    impl Probe for FailingProbe {
        fn name(&self) -> &str {
            "failing"
        }

        fn collect(&self, _manager: &MetricsManager) -> TelemetryResult<()> {
            Err(TelemetryError::not_found("nothing"))
        }
    }

    #[test]
    fn test_registration_fans_out() {
        let (manager, _) = manager();
        manager
            .register_metric(
                "requests_total",
                MetricType::Counter,
                "Total requests",
                RegisterMetric::default()
                    .with_category("http")
                    .with_tags(["api"]),
            )
            .unwrap();

        assert!(manager.has_metric("requests_total"));
        let metadata = manager.registry_metadata("requests_total").unwrap();
        assert_eq!(metadata.category, "http");
        assert!(metadata.has_tag("api"));

        let err = manager
            .register_metric("requests_total", MetricType::Counter, "", RegisterMetric::default())
            .unwrap_err();
        assert!(matches!(err, TelemetryError::DuplicateMetric { .. }));
    }

    #[test]
    fn test_auto_registration_is_mirrored() {
        let (manager, _) = manager();
        manager.set_gauge("temp", 20.0, Labels::new()).unwrap();

        let metadata = manager.registry_metadata("temp").unwrap();
        assert_eq!(metadata.metric_type, MetricType::Gauge);
        assert_eq!(metadata.category, "default");
        assert_eq!(metadata.description, "Auto-registered gauge metric");
    }

    #[test]
    fn test_type_mismatch_propagates() {
        let (manager, _) = manager();
        manager.set_gauge("temp", 20.0, Labels::new()).unwrap();
        let err = manager.observe_histogram("temp", 1.0, Labels::new()).unwrap_err();
        assert!(err.is_programming_error());
    }

    #[test]
    fn test_registry_can_be_disabled() {
        let config = ManagerConfig {
            enable_registry: false,
            enable_dashboard: false,
            ..Default::default()
        };
        let manager = MetricsManager::new(config);
        manager.increment_counter("hits", 1.0, Labels::new()).unwrap();
        assert!(manager.registry_metadata("hits").is_none());
        assert!(manager.query(&MetadataQuery::default()).is_empty());
        assert!(manager.get_stats().registry.is_none());
        assert!(manager.dashboard().is_none());
    }

    #[test]
    fn test_aggregate_by_name() {
        let (manager, clock) = manager();
        for v in [10.0, 20.0, 30.0] {
            manager.set_gauge("load", v, Labels::new()).unwrap();
            clock.advance(1_000);
        }

        let result = manager
            .aggregate("load", AggregationPeriod::OneHour, AggregationFunction::Average, None)
            .unwrap();
        assert_eq!(result.value, 20.0);
        assert_eq!(result.sample_count, 3);
        assert_eq!(result.end_time, T + 3_000);

        let err = manager
            .aggregate("missing", AggregationPeriod::OneHour, AggregationFunction::Average, None)
            .unwrap_err();
        assert!(matches!(err, TelemetryError::NotFound { .. }));
    }

    #[test]
    fn test_trend_and_compare_by_name() {
        let (manager, clock) = manager();
        for v in 1..=5 {
            manager.set_gauge("queue", f64::from(v), Labels::new()).unwrap();
            clock.advance(60_000);
        }
        // the last sample sits one minute before now
        let analysis = manager
            .analyze_trend("queue", AggregationPeriod::OneMinute, AggregationFunction::Max, 5)
            .unwrap();
        assert_eq!(analysis.trend.as_str(), "increasing");

        let comparison = manager
            .compare("queue", AggregationPeriod::OneMinute, AggregationFunction::Max, None, None)
            .unwrap();
        assert_eq!(comparison.current.value, 5.0);

        let rolling = manager
            .calculate_rolling("queue", AggregationPeriod::OneMinute, AggregationFunction::Count, 3)
            .unwrap();
        assert_eq!(rolling.len(), 3);
    }

    #[test]
    fn test_export_all_and_by_name() {
        let (manager, _) = manager();
        manager
            .register_metric("requests_total", MetricType::Counter, "Total requests", RegisterMetric::default())
            .unwrap();
        manager.increment_counter("requests_total", 1.0, Labels::new()).unwrap();
        manager.set_gauge("temp", 21.0, Labels::new()).unwrap();

        let result = manager.export(&ExportOptions::new(ExportFormat::Prometheus)).unwrap();
        assert_eq!(result.metric_count, 2);
        assert!(result.content.contains("# HELP requests_total Total requests"));
        assert_eq!(result.timestamp, T);

        let result = manager
            .export_metrics(&["temp"], &ExportOptions::new(ExportFormat::Json))
            .unwrap();
        assert_eq!(result.metric_count, 1);

        assert!(manager
            .export_metrics(&["nope"], &ExportOptions::new(ExportFormat::Json))
            .is_err());

        let aggregations = manager.aggregate_all(AggregationPeriod::OneHour, AggregationFunction::Sum, None);
        let result = manager
            .export_aggregated(&aggregations, &ExportOptions::new(ExportFormat::Prometheus))
            .unwrap();
        assert!(result.content.contains("temp_sum_1h 21"));
    }

    #[test]
    fn test_query_and_search() {
        let (manager, clock) = manager();
        manager
            .register_metric("b_metric", MetricType::Gauge, "second", RegisterMetric::default().with_category("x"))
            .unwrap();
        clock.advance(10);
        manager
            .register_metric("a_metric", MetricType::Gauge, "first", RegisterMetric::default().with_category("x"))
            .unwrap();

        let results = manager.query(&MetadataQuery {
            filter: MetadataFilter {
                category: Some("x".to_string()),
                ..Default::default()
            },
            sort_by: Some(SortField::Name),
            ..Default::default()
        });
        let names: Vec<&str> = results.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a_metric", "b_metric"]);

        assert_eq!(manager.search("FIRST").unwrap().len(), 1);
        assert_eq!(manager.with_registry(|registry| registry.len()), Some(2));
    }

    #[test]
    fn test_snapshot_and_stats() {
        let (manager, clock) = manager();
        manager.set_gauge("temp", 20.0, Labels::new()).unwrap();
        clock.advance(500);
        manager.set_gauge("temp", 30.0, Labels::new()).unwrap();
        manager.increment_counter("hits", 1.0, Labels::new()).unwrap();

        let snapshot = manager.take_snapshot();
        assert_eq!(snapshot.metrics.len(), 2);
        assert_eq!(snapshot.metadata.len(), 2);
        assert_eq!(snapshot.aggregations[0].name, "temp");
        assert_eq!(snapshot.aggregations[0].function, AggregationFunction::Average);
        assert_eq!(snapshot.aggregations[0].value, 25.0);

        let stats = manager.get_stats();
        assert_eq!(stats.total_metrics, 2);
        assert_eq!(stats.total_values, 3);
        assert_eq!(stats.oldest_timestamp, Some(T));
        assert_eq!(stats.newest_timestamp, Some(T + 500));
        assert_eq!(stats.aggregation_count, 2);
        assert_eq!(stats.registry.unwrap().total_metrics, 2);
    }

    #[test]
    fn test_reset_clears_cached_aggregations() {
        let (manager, _) = manager();
        manager.increment_counter("hits", 4.0, Labels::new()).unwrap();
        manager
            .aggregate("hits", AggregationPeriod::OneMinute, AggregationFunction::Max, None)
            .unwrap();
        assert!(manager.reset_metric("hits"));
        assert_eq!(manager.get_counter_value("hits"), 0.0);
        assert!(manager
            .get_aggregation_history("hits", AggregationPeriod::OneMinute, AggregationFunction::Max)
            .is_empty());
    }

    #[test]
    fn test_collect_now_survives_failing_probe() {
        let (manager, _) = manager();
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        manager.add_probe(Arc::new(FailingProbe));
        manager.add_probe(probe.clone());

        manager.collect_now();
        manager.collect_now();
        assert_eq!(probe.calls.load(Ordering::SeqCst), 2);
        assert_eq!(manager.get_counter_value("probe_runs_total"), 2.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_auto_collection_runs_on_interval() {
        let config = ManagerConfig {
            collection_interval_ms: 100,
            ..Default::default()
        };
        let manager = MetricsManager::new(config);
        let probe = Arc::new(CountingProbe {
            calls: AtomicUsize::new(0),
        });
        manager.add_probe(probe.clone());

        manager.start().unwrap();
        assert!(manager.is_auto_collecting());
        tokio::time::sleep(Duration::from_millis(350)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);

        assert!(manager.stop_auto_collection());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert_eq!(probe.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_dispose_stops_tasks_and_clears() {
        let config = ManagerConfig {
            collection_interval_ms: 60_000,
            ..Default::default()
        };
        let manager = MetricsManager::new(config);
        manager.set_gauge("temp", 1.0, Labels::new()).unwrap();
        manager.start().unwrap();
        manager.enable_system_metrics().unwrap();
        assert!(manager.get_stats().system_metrics_enabled);

        manager.dispose();

        let stats = manager.get_stats();
        assert_eq!(stats.total_metrics, 0);
        assert!(!stats.auto_collection_running);
        assert!(!stats.system_metrics_enabled);
        assert_eq!(stats.registry.unwrap().total_metrics, 0);
        assert_eq!(manager.probe_count(), 0);
    }
}
