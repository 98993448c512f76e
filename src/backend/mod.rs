//! Telemetry backend abstraction
//!
//! The providers only ever talk to these traits. A backend is bound to a single
//! region; providers built on it inherit that scope.

/// JSON-over-HTTP gateway backend
pub mod http;

/// Scriptable in-memory backend
pub mod mock;

/// Wire shapes and query parameters
pub mod types;

use crate::error::BackendError;
use async_trait::async_trait;
use types::{
    Datapoint, Dimension, EventsQuery, FilterQuery, MetricDescriptor, RawAlarm, RawInstance,
    RawInstanceStatus, RawLogEvent, RawLogGroup, RawLogStream, RawRegion, StatisticsQuery,
    StreamsQuery,
};

pub use http::HttpBackend;
pub use mock::MockBackend;

/// Capabilities shared by every backend
#[async_trait]
pub trait Backend: Send + Sync {
    /// Region this backend is scoped to
    fn region(&self) -> &str;

    /// Cheap authenticated call used to decide between live and offline mode
    async fn probe(&self) -> Result<(), BackendError>;
}

/// Instance inventory, status and console output
#[async_trait]
pub trait ComputeApi: Backend {
    /// Describe the given instances, or every visible instance when `instance_ids` is empty
    async fn describe_instances(
        &self,
        instance_ids: &[String],
    ) -> Result<Vec<RawInstance>, BackendError>;

    async fn describe_instance_status(
        &self,
        instance_id: &str,
    ) -> Result<Vec<RawInstanceStatus>, BackendError>;

    /// Decoded console text, `None` when the instance has produced none yet
    async fn get_console_output(&self, instance_id: &str) -> Result<Option<String>, BackendError>;

    async fn describe_regions(&self) -> Result<Vec<RawRegion>, BackendError>;
}

/// Time-series statistics and alarms
#[async_trait]
pub trait MetricsApi: Backend {
    async fn get_metric_statistics(
        &self,
        query: &StatisticsQuery,
    ) -> Result<Vec<Datapoint>, BackendError>;

    async fn list_metrics(
        &self,
        namespace: &str,
        dimension: &Dimension,
    ) -> Result<Vec<MetricDescriptor>, BackendError>;

    async fn describe_alarms(&self, name_prefix: &str) -> Result<Vec<RawAlarm>, BackendError>;
}

/// Log groups, streams and events
#[async_trait]
pub trait LogsApi: Backend {
    async fn describe_log_groups(
        &self,
        name_prefix: Option<&str>,
    ) -> Result<Vec<RawLogGroup>, BackendError>;

    async fn describe_log_streams(
        &self,
        query: &StreamsQuery,
    ) -> Result<Vec<RawLogStream>, BackendError>;

    async fn get_log_events(&self, query: &EventsQuery) -> Result<Vec<RawLogEvent>, BackendError>;

    async fn filter_log_events(&self, query: &FilterQuery)
        -> Result<Vec<RawLogEvent>, BackendError>;
}
