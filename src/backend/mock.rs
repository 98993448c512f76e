use crate::backend::types::{
    Datapoint, Dimension, EventsQuery, FilterQuery, MetricDescriptor, RawAlarm, RawInstance,
    RawInstanceStatus, RawLogEvent, RawLogGroup, RawLogStream, RawRegion, StatisticsQuery,
    StreamsQuery,
};
use crate::backend::{Backend, ComputeApi, LogsApi, MetricsApi};
use crate::error::BackendError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

/// Scripted failure for one operation key
#[derive(Debug, Clone)]
struct Failure {
    error: BackendError,
    /// Number of calls still to fail, `None` for every call
    remaining: Option<usize>,
}

/// In-memory backend for tests and local experiments
///
/// Data is seeded through the `with_*` builders. Every call is recorded under an
/// operation key so tests can assert on what was queried, and any key can be
/// scripted to fail:
///
/// | operation | key |
/// |---|---|
/// | probe | `probe` |
/// | instances | `describe_instances` |
/// | status | `describe_instance_status:{id}` |
/// | console | `get_console_output:{id}` |
/// | regions | `describe_regions` |
/// | statistics | `get_metric_statistics:{metric}` |
/// | metric names | `list_metrics` |
/// | alarms | `describe_alarms` |
/// | log groups | `describe_log_groups` |
/// | streams | `describe_log_streams:{group}` |
/// | events | `get_log_events:{group}/{stream}` |
/// | search | `filter_log_events:{group}` |
#[derive(Debug, Default)]
pub struct MockBackend {
    region: String,
    instances: Vec<RawInstance>,
    statuses: Vec<RawInstanceStatus>,
    console: HashMap<String, String>,
    regions: Vec<RawRegion>,
    datapoints: HashMap<String, Vec<Datapoint>>,
    metrics: Vec<MetricDescriptor>,
    alarms: Vec<RawAlarm>,
    log_groups: Vec<RawLogGroup>,
    streams: HashMap<String, Vec<RawLogStream>>,
    events: HashMap<(String, String), Vec<RawLogEvent>>,
    failures: Mutex<HashMap<String, Failure>>,
    calls: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Create an empty mock backend scoped to `region`
    ///
    /// # Example
    /// ```
    /// use cloudscope::backend::MockBackend;
    /// use cloudscope::error::BackendError;
    ///
    /// let backend = MockBackend::new("us-east-1")
    ///     .with_log_group("/aws/ec2/i-1")
    ///     .failing("describe_alarms", BackendError::Unavailable("down".to_string()));
    /// ```
    pub fn new(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            ..Self::default()
        }
    }

    /// A backend whose probe fails, as if no credentials were configured
    pub fn unreachable(region: impl Into<String>) -> Self {
        Self::new(region).failing(
            "probe",
            BackendError::Unavailable("no credentials configured".to_string()),
        )
    }

    pub fn with_instance(mut self, instance: RawInstance) -> Self {
        self.instances.push(instance);
        self
    }

    pub fn with_status(mut self, status: RawInstanceStatus) -> Self {
        self.statuses.push(status);
        self
    }

    pub fn with_console(mut self, instance_id: &str, output: &str) -> Self {
        self.console
            .insert(instance_id.to_string(), output.to_string());
        self
    }

    pub fn with_region(mut self, name: &str, endpoint: &str) -> Self {
        self.regions.push(RawRegion {
            region_name: name.to_string(),
            endpoint: endpoint.to_string(),
        });
        self
    }

    /// Datapoints returned for `metric_name` regardless of dimension
    pub fn with_datapoints(mut self, metric_name: &str, points: Vec<Datapoint>) -> Self {
        self.datapoints
            .entry(metric_name.to_string())
            .or_default()
            .extend(points);
        self
    }

    pub fn with_metric_names(mut self, namespace: &str, names: &[&str]) -> Self {
        self.metrics.extend(names.iter().map(|name| MetricDescriptor {
            metric_name: name.to_string(),
            namespace: namespace.to_string(),
        }));
        self
    }

    pub fn with_alarm(mut self, alarm: RawAlarm) -> Self {
        self.alarms.push(alarm);
        self
    }

    pub fn with_log_group(mut self, name: &str) -> Self {
        self.log_groups.push(RawLogGroup {
            log_group_name: name.to_string(),
            creation_time: Some(1_700_000_000_000),
            stored_bytes: Some(0),
            metric_filter_count: Some(0),
            arn: None,
            retention_in_days: None,
        });
        self.streams.entry(name.to_string()).or_default();
        self
    }

    /// Add a stream whose most recent event happened at `last_event_time` (ms)
    pub fn with_stream(mut self, group: &str, stream: &str, last_event_time: i64) -> Self {
        self.streams
            .entry(group.to_string())
            .or_default()
            .push(RawLogStream {
                log_stream_name: stream.to_string(),
                creation_time: Some(last_event_time),
                first_event_time: Some(last_event_time),
                last_event_time: Some(last_event_time),
                stored_bytes: Some(0),
                arn: None,
            });
        self
    }

    pub fn with_events(mut self, group: &str, stream: &str, events: Vec<RawLogEvent>) -> Self {
        self.events
            .entry((group.to_string(), stream.to_string()))
            .or_default()
            .extend(events);
        self
    }

    /// Fail every call recorded under `key`
    pub fn failing(self, key: &str, error: BackendError) -> Self {
        self.script_failure(key, error, None)
    }

    /// Fail the next `times` calls recorded under `key`, then behave normally
    pub fn failing_times(self, key: &str, error: BackendError, times: usize) -> Self {
        self.script_failure(key, error, Some(times))
    }

    fn script_failure(self, key: &str, error: BackendError, remaining: Option<usize>) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(key.to_string(), Failure { error, remaining });
        self
    }

    /// Every operation key recorded so far, in call order
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls whose key starts with `prefix`
    pub fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|key| key.starts_with(prefix))
            .count()
    }

    /// Record a call and return its scripted failure, if any
    fn record(&self, key: String) -> Result<(), BackendError> {
        let mut failures = self.failures.lock().unwrap();
        let outcome = match failures.get_mut(&key) {
            Some(failure) => match failure.remaining {
                None => Err(failure.error.clone()),
                Some(0) => Ok(()),
                Some(ref mut n) => {
                    *n -= 1;
                    Err(failure.error.clone())
                }
            },
            None => Ok(()),
        };
        self.calls.lock().unwrap().push(key);
        outcome
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn region(&self) -> &str {
        &self.region
    }

    async fn probe(&self) -> Result<(), BackendError> {
        self.record("probe".to_string())
    }
}

#[async_trait]
impl ComputeApi for MockBackend {
    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<RawInstance>, BackendError> {
        self.record("describe_instances".to_string())?;

        if instance_ids.is_empty() {
            return Ok(self.instances.clone());
        }

        let found: Vec<RawInstance> = self
            .instances
            .iter()
            .filter(|instance| instance_ids.contains(&instance.instance_id))
            .cloned()
            .collect();
        if found.is_empty() {
            return Err(BackendError::NotFound(format!(
                "The instance IDs '{}' do not exist",
                instance_ids.join(", ")
            )));
        }
        Ok(found)
    }

    async fn describe_instance_status(
        &self,
        instance_id: &str,
    ) -> Result<Vec<RawInstanceStatus>, BackendError> {
        self.record(format!("describe_instance_status:{}", instance_id))?;
        Ok(self
            .statuses
            .iter()
            .filter(|status| status.instance_id == instance_id)
            .cloned()
            .collect())
    }

    async fn get_console_output(&self, instance_id: &str) -> Result<Option<String>, BackendError> {
        self.record(format!("get_console_output:{}", instance_id))?;

        if let Some(output) = self.console.get(instance_id) {
            return Ok(Some(output.clone()));
        }
        if self.instances.iter().any(|i| i.instance_id == instance_id) {
            Ok(None)
        } else {
            Err(BackendError::NotFound(format!(
                "The instance ID '{}' does not exist",
                instance_id
            )))
        }
    }

    async fn describe_regions(&self) -> Result<Vec<RawRegion>, BackendError> {
        self.record("describe_regions".to_string())?;
        Ok(self.regions.clone())
    }
}

#[async_trait]
impl MetricsApi for MockBackend {
    async fn get_metric_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Vec<Datapoint>, BackendError> {
        self.record(format!("get_metric_statistics:{}", query.metric_name))?;
        Ok(self
            .datapoints
            .get(&query.metric_name)
            .map(|points| {
                points
                    .iter()
                    .filter(|p| p.timestamp >= query.start_time && p.timestamp <= query.end_time)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn list_metrics(
        &self,
        namespace: &str,
        _dimension: &Dimension,
    ) -> Result<Vec<MetricDescriptor>, BackendError> {
        self.record("list_metrics".to_string())?;
        Ok(self
            .metrics
            .iter()
            .filter(|metric| metric.namespace == namespace)
            .cloned()
            .collect())
    }

    async fn describe_alarms(&self, name_prefix: &str) -> Result<Vec<RawAlarm>, BackendError> {
        self.record("describe_alarms".to_string())?;
        Ok(self
            .alarms
            .iter()
            .filter(|alarm| alarm.alarm_name.starts_with(name_prefix))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LogsApi for MockBackend {
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
    ) -> Result<Vec<RawLogGroup>, BackendError> {
        self.record("describe_log_groups".to_string())?;
        Ok(self
            .log_groups
            .iter()
            .filter(|group| name_prefix.map_or(true, |p| group.log_group_name.starts_with(p)))
            .cloned()
            .collect())
    }

    async fn describe_log_streams(
        &self,
        query: &StreamsQuery,
    ) -> Result<Vec<RawLogStream>, BackendError> {
        self.record(format!("describe_log_streams:{}", query.log_group_name))?;

        let mut streams = self
            .streams
            .get(&query.log_group_name)
            .cloned()
            .ok_or_else(|| {
                BackendError::NotFound(format!(
                    "The specified log group does not exist: {}",
                    query.log_group_name
                ))
            })?;
        streams.sort_by_key(|stream| stream.last_event_time.unwrap_or(0));
        if query.descending {
            streams.reverse();
        }
        streams.truncate(query.limit);
        Ok(streams)
    }

    async fn get_log_events(&self, query: &EventsQuery) -> Result<Vec<RawLogEvent>, BackendError> {
        self.record(format!(
            "get_log_events:{}/{}",
            query.log_group_name, query.log_stream_name
        ))?;

        let key = (query.log_group_name.clone(), query.log_stream_name.clone());
        Ok(self
            .events
            .get(&key)
            .map(|events| {
                events
                    .iter()
                    .filter(|e| query.start_time.map_or(true, |start| e.timestamp >= start))
                    .filter(|e| query.end_time.map_or(true, |end| e.timestamp <= end))
                    .take(query.limit)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn filter_log_events(
        &self,
        query: &FilterQuery,
    ) -> Result<Vec<RawLogEvent>, BackendError> {
        self.record(format!("filter_log_events:{}", query.log_group_name))?;

        let needle = query.filter_pattern.trim_matches('"');
        let mut matched: Vec<RawLogEvent> = self
            .events
            .iter()
            .filter(|((group, _), _)| *group == query.log_group_name)
            .flat_map(|((_, stream), events)| {
                events.iter().map(move |event| RawLogEvent {
                    log_stream_name: Some(stream.clone()),
                    ..event.clone()
                })
            })
            .filter(|e| e.timestamp >= query.start_time && e.timestamp <= query.end_time)
            .filter(|e| e.message.contains(needle))
            .collect();
        matched.sort_by_key(|event| event.timestamp);
        matched.truncate(query.limit);
        Ok(matched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_records_calls_in_order() {
        let backend = MockBackend::new("us-east-1").with_log_group("/app/web");

        backend.probe().await.unwrap();
        backend.describe_log_groups(None).await.unwrap();

        assert_eq!(backend.calls(), vec!["probe", "describe_log_groups"]);
        assert_eq!(backend.call_count("describe_log"), 1);
    }

    #[tokio::test]
    async fn test_failing_times_recovers() {
        let backend = MockBackend::new("us-east-1").failing_times(
            "describe_regions",
            BackendError::Unavailable("blip".to_string()),
            2,
        );

        assert!(backend.describe_regions().await.is_err());
        assert!(backend.describe_regions().await.is_err());
        assert!(backend.describe_regions().await.is_ok());
        assert_eq!(backend.call_count("describe_regions"), 3);
    }

    #[tokio::test]
    async fn test_unknown_instance_is_not_found() {
        let backend = MockBackend::new("us-east-1");
        let err = backend
            .describe_instances(&["i-missing".to_string()])
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_streams_ordered_and_capped() {
        let backend = MockBackend::new("us-east-1")
            .with_log_group("/app/web")
            .with_stream("/app/web", "old", 1_000)
            .with_stream("/app/web", "newest", 3_000)
            .with_stream("/app/web", "middle", 2_000);

        let streams = backend
            .describe_log_streams(&StreamsQuery {
                log_group_name: "/app/web".to_string(),
                descending: true,
                limit: 2,
            })
            .await
            .unwrap();

        let names: Vec<&str> = streams.iter().map(|s| s.log_stream_name.as_str()).collect();
        assert_eq!(names, vec!["newest", "middle"]);
    }
}
