use crate::backend::types::Datapoint;
use crate::model::{MetricPoint, MetricSeries};

/// Default unit for CPU utilization and custom metrics
pub const UNIT_PERCENT: &str = "Percent";

/// Default unit for network and disk byte counters
pub const UNIT_BYTES: &str = "Bytes";

/// Sort raw datapoints by timestamp and map them into the uniform record shape
///
/// The sort is stable and nothing is dropped or merged: duplicate timestamps
/// from the backend stay in the output in their original relative order.
/// Missing statistics become 0 and a missing unit becomes `unit_default`.
pub fn sort_and_format(mut points: Vec<Datapoint>, unit_default: &str) -> MetricSeries {
    points.sort_by_key(|point| point.timestamp);

    points
        .into_iter()
        .map(|point| MetricPoint {
            timestamp: point.timestamp,
            average: point.average.unwrap_or(0.0),
            maximum: point.maximum.unwrap_or(0.0),
            minimum: point.minimum.unwrap_or(0.0),
            unit: point.unit.unwrap_or_else(|| unit_default.to_string()),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn datapoint(secs: i64, average: Option<f64>) -> Datapoint {
        Datapoint {
            timestamp: Utc.timestamp_opt(secs, 0).unwrap(),
            average,
            maximum: average.map(|a| a + 1.0),
            minimum: average.map(|a| a - 1.0),
            unit: None,
        }
    }

    #[test]
    fn test_sorts_ascending() {
        let points = vec![
            datapoint(1_700_000_600, Some(3.0)),
            datapoint(1_700_000_000, Some(1.0)),
            datapoint(1_700_000_300, Some(2.0)),
        ];

        let series = sort_and_format(points, UNIT_PERCENT);
        let averages: Vec<f64> = series.iter().map(|p| p.average).collect();
        assert_eq!(averages, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_missing_fields_default() {
        let series = sort_and_format(vec![datapoint(1_700_000_000, None)], UNIT_BYTES);

        assert_eq!(series.len(), 1);
        assert_eq!(series[0].average, 0.0);
        assert_eq!(series[0].maximum, 0.0);
        assert_eq!(series[0].minimum, 0.0);
        assert_eq!(series[0].unit, "Bytes");
    }

    #[test]
    fn test_backend_unit_wins_over_default() {
        let mut point = datapoint(1_700_000_000, Some(10.0));
        point.unit = Some("Count".to_string());

        let series = sort_and_format(vec![point], UNIT_PERCENT);
        assert_eq!(series[0].unit, "Count");
    }

    #[test]
    fn test_duplicates_preserved_in_order() {
        let points = vec![
            datapoint(1_700_000_300, Some(7.0)),
            datapoint(1_700_000_000, Some(1.0)),
            datapoint(1_700_000_300, Some(8.0)),
        ];

        let series = sort_and_format(points, UNIT_PERCENT);
        let averages: Vec<f64> = series.iter().map(|p| p.average).collect();
        assert_eq!(averages, vec![1.0, 7.0, 8.0]);
    }

    #[test]
    fn test_empty_input() {
        assert!(sort_and_format(Vec::new(), UNIT_PERCENT).is_empty());
    }
}
