use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace};

use telemetry_core::stats::{mean, nearest_rank, sorted_copy};
use telemetry_core::{
    AggregatedMetric, AggregationFunction, AggregationPeriod, BoundedBuffer, Clock, Metric,
    SystemClock, DEFAULT_MAX_AGGREGATION_HISTORY,
};

use crate::trend::{Comparison, TrendAnalysis};

type HistoryKey = (String, AggregationPeriod, AggregationFunction);

/// Windowed statistics over a metric's retained series, with a bounded
/// history of every result per `(name, period, function)`.
pub struct MetricsAggregator {
    history: HashMap<HistoryKey, BoundedBuffer<AggregatedMetric>>,
    max_history: usize,
    clock: Arc<dyn Clock>,
}

impl MetricsAggregator {
    pub fn new() -> Self {
        Self::with_max_history(DEFAULT_MAX_AGGREGATION_HISTORY)
    }

    pub fn with_max_history(max_history: usize) -> Self {
        Self {
            history: HashMap::new(),
            max_history,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Applies `function` to the values in `[end - period, end]`. `end_time`
    /// defaults to now. Empty windows yield 0 with a sample count of 0.
    pub fn aggregate(
        &mut self,
        metric: &Metric,
        period: AggregationPeriod,
        function: AggregationFunction,
        end_time: Option<i64>,
    ) -> AggregatedMetric {
        let end_time = end_time.unwrap_or_else(|| self.clock.now_millis());
        let start_time = end_time - period.duration_ms();

        let values: Vec<f64> = metric
            .values_between(start_time, end_time)
            .map(|v| v.value)
            .collect();

        let result = AggregatedMetric {
            name: metric.name.clone(),
            period,
            function,
            value: apply(function, &values),
            start_time,
            end_time,
            sample_count: values.len(),
        };

        trace!(
            metric_name = %metric.name,
            period = %period,
            function = %function,
            value = result.value,
            samples = result.sample_count,
            "Aggregated metric"
        );

        let max_history = self.max_history;
        self.history
            .entry((metric.name.clone(), period, function))
            .or_insert_with(|| BoundedBuffer::new(max_history))
            .push(result.clone());

        result
    }

    pub fn aggregate_multiple<'a, I>(
        &mut self,
        metrics: I,
        period: AggregationPeriod,
        function: AggregationFunction,
        end_time: Option<i64>,
    ) -> Vec<AggregatedMetric>
    where
        I: IntoIterator<Item = &'a Metric>,
    {
        let end_time = end_time.unwrap_or_else(|| self.clock.now_millis());
        metrics
            .into_iter()
            .map(|metric| self.aggregate(metric, period, function, Some(end_time)))
            .collect()
    }

    /// Stored results, oldest first.
    pub fn get_aggregation_history(
        &self,
        name: &str,
        period: AggregationPeriod,
        function: AggregationFunction,
    ) -> Vec<AggregatedMetric> {
        self.history
            .get(&(name.to_string(), period, function))
            .map(BoundedBuffer::to_vec)
            .unwrap_or_default()
    }

    /// `window_size` consecutive windows ending at now, now - period, ...,
    /// returned oldest first.
    pub fn calculate_rolling(
        &mut self,
        metric: &Metric,
        period: AggregationPeriod,
        function: AggregationFunction,
        window_size: usize,
    ) -> Vec<AggregatedMetric> {
        let now = self.clock.now_millis();
        let step = period.duration_ms();

        let mut windows: Vec<AggregatedMetric> = (0..window_size)
            .map(|i| self.aggregate(metric, period, function, Some(now - i as i64 * step)))
            .collect();
        windows.reverse();
        windows
    }

    /// Compares the window ending at `current_end` (default now) with the one
    /// ending at `previous_end` (default one period earlier).
    pub fn compare(
        &mut self,
        metric: &Metric,
        period: AggregationPeriod,
        function: AggregationFunction,
        current_end: Option<i64>,
        previous_end: Option<i64>,
    ) -> Comparison {
        let current_end = current_end.unwrap_or_else(|| self.clock.now_millis());
        let previous_end = previous_end.unwrap_or(current_end - period.duration_ms());

        let current = self.aggregate(metric, period, function, Some(current_end));
        let previous = self.aggregate(metric, period, function, Some(previous_end));
        Comparison::between(current, previous)
    }

    pub fn analyze_trend(
        &mut self,
        metric: &Metric,
        period: AggregationPeriod,
        function: AggregationFunction,
        data_points: usize,
    ) -> TrendAnalysis {
        let aggregations = self.calculate_rolling(metric, period, function, data_points);
        let analysis = TrendAnalysis::from_aggregations(aggregations);
        debug!(
            metric_name = %metric.name,
            trend = %analysis.trend,
            slope = analysis.slope,
            "Trend analyzed"
        );
        analysis
    }

    pub fn clear(&mut self) {
        self.history.clear();
    }

    /// Drops every cached history for `name`.
    pub fn clear_metric(&mut self, name: &str) {
        self.history.retain(|(key_name, _, _), _| key_name != name);
    }

    /// Stored results across every history.
    pub fn get_aggregation_count(&self) -> usize {
        self.history.values().map(BoundedBuffer::len).sum()
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Evaluates one aggregation function. Empty input gives 0.
pub fn apply(function: AggregationFunction, values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    match function {
        AggregationFunction::Sum => values.iter().sum(),
        AggregationFunction::Average => mean(values),
        AggregationFunction::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        AggregationFunction::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        AggregationFunction::Count => values.len() as f64,
        AggregationFunction::Median => nearest_rank(&sorted_copy(values), 0.5),
        AggregationFunction::P95 => nearest_rank(&sorted_copy(values), 0.95),
        AggregationFunction::P99 => nearest_rank(&sorted_copy(values), 0.99),
    }
}
