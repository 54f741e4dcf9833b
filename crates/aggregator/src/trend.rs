use std::fmt;

use serde::Serialize;

use telemetry_core::stats::linear_regression_slope;
use telemetry_core::AggregatedMetric;

/// Slope magnitude above which a series counts as moving.
pub const TREND_THRESHOLD: f64 = 0.1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Increasing,
    Decreasing,
    Stable,
}

impl Trend {
    pub fn from_slope(slope: f64) -> Self {
        if slope > TREND_THRESHOLD {
            Trend::Increasing
        } else if slope < -TREND_THRESHOLD {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Decreasing => "decreasing",
            Trend::Stable => "stable",
        }
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendAnalysis {
    pub trend: Trend,
    pub slope: f64,
    pub aggregations: Vec<AggregatedMetric>,
}

impl TrendAnalysis {
    /// Fits a least-squares line over `(index, value)`. Fewer than two points
    /// is stable with slope 0.
    pub fn from_aggregations(aggregations: Vec<AggregatedMetric>) -> Self {
        let values: Vec<f64> = aggregations.iter().map(|a| a.value).collect();
        let slope = if values.len() < 2 {
            0.0
        } else {
            linear_regression_slope(&values)
        };
        Self {
            trend: Trend::from_slope(slope),
            slope,
            aggregations,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub current: AggregatedMetric,
    pub previous: AggregatedMetric,
    pub difference: f64,
    /// 0 when the previous value is 0.
    pub percentage_change: f64,
}

impl Comparison {
    pub fn between(current: AggregatedMetric, previous: AggregatedMetric) -> Self {
        let difference = current.value - previous.value;
        let percentage_change = if previous.value == 0.0 {
            0.0
        } else {
            difference / previous.value * 100.0
        };
        Self {
            current,
            previous,
            difference,
            percentage_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use telemetry_core::{AggregationFunction, AggregationPeriod};

    fn point(value: f64) -> AggregatedMetric {
        AggregatedMetric {
            name: "m".to_string(),
            period: AggregationPeriod::OneMinute,
            function: AggregationFunction::Average,
            value,
            start_time: 0,
            end_time: 60_000,
            sample_count: 1,
        }
    }

    #[test]
    fn test_classification_thresholds() {
        assert_eq!(Trend::from_slope(0.11), Trend::Increasing);
        assert_eq!(Trend::from_slope(0.1), Trend::Stable);
        assert_eq!(Trend::from_slope(-0.1), Trend::Stable);
        assert_eq!(Trend::from_slope(-0.5), Trend::Decreasing);
    }

    #[test]
    fn test_decreasing_series() {
        let analysis = TrendAnalysis::from_aggregations(vec![point(9.0), point(6.0), point(3.0)]);
        assert_eq!(analysis.trend, Trend::Decreasing);
        assert!((analysis.slope + 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_flat_series_is_stable() {
        let analysis = TrendAnalysis::from_aggregations(vec![point(4.0); 6]);
        assert_eq!(analysis.trend, Trend::Stable);
        assert_eq!(analysis.slope, 0.0);
    }

    #[test]
    fn test_serializes_lowercase_trend() {
        let analysis = TrendAnalysis::from_aggregations(vec![]);
        let json = serde_json::to_value(&analysis).unwrap();
        assert_eq!(json["trend"], "stable");
        assert_eq!(json["slope"], 0.0);
    }

    #[test]
    fn test_percentage_change() {
        let comparison = Comparison::between(point(5.0), point(20.0));
        assert_eq!(comparison.difference, -15.0);
        assert_eq!(comparison.percentage_change, -75.0);
    }
}
