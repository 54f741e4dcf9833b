use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use tracing::debug;
use uuid::Uuid;

use telemetry_core::stats::{locate_bucket, HISTOGRAM_BOUNDARIES};
use telemetry_core::{Labels, Metric, ScheduledTask};

use crate::structured_logger::StructuredLogger;

/// Read access to metrics by name.
#[cfg_attr(test, mockall::automock)]
pub trait MetricSource: Send + Sync {
    fn get_metric(&self, name: &str) -> Option<Metric>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WidgetKind {
    Line,
    Gauge,
    Counter,
    Histogram,
    Table,
}

#[derive(Debug, Clone)]
pub struct WidgetConfig {
    pub title: String,
    pub metric_name: String,
    pub kind: WidgetKind,
    pub refresh_interval_ms: u64,
    pub max_points: usize,
}

impl WidgetConfig {
    pub fn new(title: impl Into<String>, metric_name: impl Into<String>, kind: WidgetKind) -> Self {
        Self {
            title: title.into(),
            metric_name: metric_name.into(),
            kind,
            refresh_interval_ms: 5_000,
            max_points: 100,
        }
    }

    pub fn with_refresh_interval_ms(mut self, refresh_interval_ms: u64) -> Self {
        self.refresh_interval_ms = refresh_interval_ms;
        self
    }

    pub fn with_max_points(mut self, max_points: usize) -> Self {
        self.max_points = max_points;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Widget {
    pub id: String,
    pub title: String,
    pub metric_name: String,
    pub kind: WidgetKind,
    pub refresh_interval_ms: u64,
    pub max_points: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub timestamp: i64,
    pub value: f64,
    #[serde(skip_serializing_if = "Labels::is_empty")]
    pub labels: Labels,
}

/// Visualization-ready payload for one widget.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetData {
    pub widget_id: String,
    pub kind: WidgetKind,
    pub unit: String,
    pub points: Vec<DataPoint>,
    pub current: Option<f64>,
    pub buckets: Vec<(f64, u64)>,
    pub error: Option<String>,
    pub refreshed_at: DateTime<Utc>,
}

impl WidgetData {
    fn failed(widget: &Widget, error: String) -> Self {
        Self {
            widget_id: widget.id.clone(),
            kind: widget.kind,
            unit: String::new(),
            points: Vec::new(),
            current: None,
            buckets: Vec::new(),
            error: Some(error),
            refreshed_at: Utc::now(),
        }
    }

    fn shape(widget: &Widget, metric: &Metric) -> Self {
        let skip = metric.values.len().saturating_sub(widget.max_points);
        let recent: Vec<DataPoint> = metric
            .values
            .iter()
            .skip(skip)
            .map(|v| DataPoint {
                timestamp: v.timestamp,
                value: v.value,
                labels: v.labels.clone(),
            })
            .collect();
        let current = metric.latest().map(|v| v.value);

        let (points, buckets) = match widget.kind {
            WidgetKind::Line | WidgetKind::Table => (recent, Vec::new()),
            WidgetKind::Gauge | WidgetKind::Counter => {
                (recent.into_iter().last().into_iter().collect(), Vec::new())
            }
            WidgetKind::Histogram => (Vec::new(), bucketize(&recent)),
        };

        Self {
            widget_id: widget.id.clone(),
            kind: widget.kind,
            unit: metric.unit.clone(),
            points,
            current,
            buckets,
            error: None,
            refreshed_at: Utc::now(),
        }
    }
}

fn bucketize(points: &[DataPoint]) -> Vec<(f64, u64)> {
    let mut counts = [0u64; HISTOGRAM_BOUNDARIES.len()];
    for point in points {
        counts[locate_bucket(&HISTOGRAM_BOUNDARIES, point.value)] += 1;
    }
    HISTOGRAM_BOUNDARIES
        .iter()
        .zip(counts)
        .filter(|(_, count)| *count > 0)
        .map(|(bound, count)| (*bound, count))
        .collect()
}

struct DashboardState {
    source: Arc<dyn MetricSource>,
    widgets: RwLock<Vec<Widget>>,
    data: RwLock<HashMap<String, WidgetData>>,
}

impl DashboardState {
    fn refresh(&self, widget_id: &str) -> Option<WidgetData> {
        let widget = self
            .widgets
            .read()
            .iter()
            .find(|w| w.id == widget_id)
            .cloned()?;

        let data = match self.source.get_metric(&widget.metric_name) {
            Some(metric) => WidgetData::shape(&widget, &metric),
            None => {
                let error = format!("Metric '{}' not found", widget.metric_name);
                StructuredLogger::log_widget_refresh_failed(&widget.id, &widget.metric_name, &error);
                WidgetData::failed(&widget, error)
            }
        };

        self.data.write().insert(widget.id.clone(), data.clone());
        Some(data)
    }
}

/// Widgets that periodically pull metrics by name and reshape them.
pub struct Dashboard {
    state: Arc<DashboardState>,
    tasks: Mutex<HashMap<String, ScheduledTask>>,
    running: Mutex<bool>,
}

impl Dashboard {
    pub fn new(source: Arc<dyn MetricSource>) -> Self {
        Self {
            state: Arc::new(DashboardState {
                source,
                widgets: RwLock::new(Vec::new()),
                data: RwLock::new(HashMap::new()),
            }),
            tasks: Mutex::new(HashMap::new()),
            running: Mutex::new(false),
        }
    }

    /// Adds a widget and returns its id. A running dashboard starts refreshing
    /// it immediately.
    pub fn add_widget(&self, config: WidgetConfig) -> String {
        let widget = Widget {
            id: Uuid::new_v4().to_string(),
            title: config.title,
            metric_name: config.metric_name,
            kind: config.kind,
            refresh_interval_ms: config.refresh_interval_ms.max(1),
            max_points: config.max_points.max(1),
        };
        let id = widget.id.clone();
        debug!(widget.id = %id, widget.metric = %widget.metric_name, "Widget added");

        let interval = widget.refresh_interval_ms;
        self.state.widgets.write().push(widget);
        if *self.running.lock() {
            self.spawn_refresh(&id, interval);
        }
        id
    }

    pub fn remove_widget(&self, widget_id: &str) -> bool {
        if let Some(task) = self.tasks.lock().remove(widget_id) {
            task.cancel();
        }
        self.state.data.write().remove(widget_id);
        let mut widgets = self.state.widgets.write();
        let before = widgets.len();
        widgets.retain(|w| w.id != widget_id);
        widgets.len() != before
    }

    pub fn widgets(&self) -> Vec<Widget> {
        self.state.widgets.read().clone()
    }

    pub fn widget_count(&self) -> usize {
        self.state.widgets.read().len()
    }

    /// Returns `None` for an unknown widget id.
    pub fn refresh_widget(&self, widget_id: &str) -> Option<WidgetData> {
        self.state.refresh(widget_id)
    }

    pub fn refresh_all(&self) {
        let ids: Vec<String> = self.state.widgets.read().iter().map(|w| w.id.clone()).collect();
        for id in ids {
            self.state.refresh(&id);
        }
    }

    /// Last refreshed payload of a widget.
    pub fn widget_data(&self, widget_id: &str) -> Option<WidgetData> {
        self.state.data.read().get(widget_id).cloned()
    }

    /// Spawns one refresh task per widget. Needs a tokio runtime.
    pub fn start(&self) {
        let mut running = self.running.lock();
        if *running {
            return;
        }
        *running = true;
        drop(running);

        let widgets: Vec<(String, u64)> = self
            .state
            .widgets
            .read()
            .iter()
            .map(|w| (w.id.clone(), w.refresh_interval_ms))
            .collect();
        for (id, interval) in widgets {
            self.spawn_refresh(&id, interval);
        }
    }

    /// Cancels every refresh task. Returns how many were running.
    pub fn stop(&self) -> usize {
        *self.running.lock() = false;
        let tasks: Vec<ScheduledTask> = self.tasks.lock().drain().map(|(_, task)| task).collect();
        let count = tasks.len();
        for task in tasks {
            task.cancel();
        }
        count
    }

    pub fn is_running(&self) -> bool {
        *self.running.lock()
    }

    /// Stops refreshing and drops every widget.
    pub fn clear(&self) {
        self.stop();
        self.state.widgets.write().clear();
        self.state.data.write().clear();
    }

    fn spawn_refresh(&self, widget_id: &str, interval_ms: u64) {
        let state = self.state.clone();
        let id = widget_id.to_string();
        let task = ScheduledTask::spawn(
            format!("widget-{widget_id}"),
            Duration::from_millis(interval_ms),
            move || {
                state.refresh(&id);
            },
        );
        if let Some(previous) = self.tasks.lock().insert(widget_id.to_string(), task) {
            previous.cancel();
        }
    }
}

impl Drop for Dashboard {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use telemetry_core::{MetricType, MetricValue};

    fn latency_metric() -> Metric {
        let mut metric = Metric::new("latency", MetricType::Histogram, "Latency", 100).with_unit("ms");
        for (i, v) in [3.0, 7.0, 15.0, 4.0].into_iter().enumerate() {
            metric.record(MetricValue::new(v, i as i64 * 1_000, Labels::new()));
        }
        metric
    }

    #[test]
    fn test_missing_metric_records_error() {
        let mut source = MockMetricSource::new();
        source.expect_get_metric().with(eq("ghost")).returning(|_| None);

        let dashboard = Dashboard::new(Arc::new(source));
        let id = dashboard.add_widget(WidgetConfig::new("Ghost", "ghost", WidgetKind::Line));

        let data = dashboard.refresh_widget(&id).unwrap();
        assert_eq!(data.error.as_deref(), Some("Metric 'ghost' not found"));
        assert!(data.points.is_empty());
        assert_eq!(dashboard.widget_data(&id), Some(data));
    }

    #[test]
    fn test_line_widget_keeps_recent_points() {
        let mut source = MockMetricSource::new();
        source.expect_get_metric().returning(|_| Some(latency_metric()));

        let dashboard = Dashboard::new(Arc::new(source));
        let id = dashboard.add_widget(
            WidgetConfig::new("Latency", "latency", WidgetKind::Line).with_max_points(2),
        );

        let data = dashboard.refresh_widget(&id).unwrap();
        let values: Vec<f64> = data.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![15.0, 4.0]);
        assert_eq!(data.current, Some(4.0));
        assert_eq!(data.unit, "ms");
        assert!(data.error.is_none());
    }

    #[test]
    fn test_gauge_and_histogram_shapes() {
        let mut source = MockMetricSource::new();
        source.expect_get_metric().returning(|_| Some(latency_metric()));
        let dashboard = Dashboard::new(Arc::new(source));

        let gauge = dashboard.add_widget(WidgetConfig::new("Now", "latency", WidgetKind::Gauge));
        let histogram = dashboard.add_widget(WidgetConfig::new("Dist", "latency", WidgetKind::Histogram));
        dashboard.refresh_all();

        let gauge = dashboard.widget_data(&gauge).unwrap();
        assert_eq!(gauge.points.len(), 1);
        assert_eq!(gauge.current, Some(4.0));

        let histogram = dashboard.widget_data(&histogram).unwrap();
        assert_eq!(histogram.buckets, vec![(5.0, 2), (10.0, 1), (20.0, 1)]);
    }

    #[test]
    fn test_remove_widget() {
        let source = MockMetricSource::new();
        let dashboard = Dashboard::new(Arc::new(source));
        let id = dashboard.add_widget(WidgetConfig::new("X", "x", WidgetKind::Table));
        assert_eq!(dashboard.widget_count(), 1);
        assert!(dashboard.remove_widget(&id));
        assert!(!dashboard.remove_widget(&id));
        assert!(dashboard.refresh_widget(&id).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_started_dashboard_refreshes_on_interval() {
        let mut source = MockMetricSource::new();
        source.expect_get_metric().returning(|_| Some(latency_metric()));
        let dashboard = Dashboard::new(Arc::new(source));
        let id = dashboard.add_widget(
            WidgetConfig::new("Latency", "latency", WidgetKind::Counter).with_refresh_interval_ms(100),
        );

        dashboard.start();
        assert!(dashboard.is_running());
        assert!(dashboard.widget_data(&id).is_none());

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(dashboard.widget_data(&id).is_some());

        assert_eq!(dashboard.stop(), 1);
        assert!(!dashboard.is_running());
    }
}
