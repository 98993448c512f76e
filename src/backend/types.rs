//! Wire shapes exchanged with a telemetry backend
//!
//! Compute and metrics payloads use PascalCase keys, log payloads use
//! camelCase keys, mirroring the upstream services they stand in for.

use crate::model::Timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct RawInstance {
    pub instance_id: String,
    pub instance_type: String,
    pub state: NamedState,
    pub launch_time: Option<Timestamp>,
    pub public_ip_address: Option<String>,
    pub private_ip_address: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub placement: Option<Placement>,
    pub platform: Option<String>,
    pub architecture: Option<String>,
    #[serde(default)]
    pub tags: Vec<Tag>,
    #[serde(default)]
    pub security_groups: Vec<RawSecurityGroup>,
    #[serde(default)]
    pub block_device_mappings: Vec<BlockDeviceMapping>,
    pub monitoring: Option<MonitoringState>,
    pub iam_instance_profile: Option<IamInstanceProfile>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct NamedState {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Placement {
    pub availability_zone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Tag {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RawSecurityGroup {
    pub group_id: String,
    pub group_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct BlockDeviceMapping {
    pub device_name: String,
    pub ebs: Option<EbsDevice>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct EbsDevice {
    pub volume_id: String,
    pub delete_on_termination: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct MonitoringState {
    pub state: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct IamInstanceProfile {
    pub arn: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RawInstanceStatus {
    pub instance_id: String,
    pub instance_state: NamedState,
    pub system_status: StatusSummary,
    pub instance_status: StatusSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct StatusSummary {
    pub status: String,
    #[serde(default)]
    pub details: Vec<RawStatusDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RawStatusDetail {
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct RawRegion {
    pub region_name: String,
    pub endpoint: String,
}

/// One raw metric sample before normalization
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Datapoint {
    pub timestamp: Timestamp,
    pub average: Option<f64>,
    pub maximum: Option<f64>,
    pub minimum: Option<f64>,
    pub unit: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: String,
    pub value: String,
}

impl Dimension {
    pub fn instance(instance_id: &str) -> Self {
        Self {
            name: "InstanceId".to_string(),
            value: instance_id.to_string(),
        }
    }
}

/// Parameters of a metric statistics query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct StatisticsQuery {
    pub namespace: String,
    pub metric_name: String,
    pub dimensions: Vec<Dimension>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    /// Bucket width in seconds
    pub period: i64,
    pub statistics: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct MetricDescriptor {
    pub metric_name: String,
    pub namespace: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct RawAlarm {
    pub alarm_name: String,
    pub alarm_arn: String,
    pub state_value: String,
    pub state_reason: Option<String>,
    pub metric_name: String,
    pub namespace: String,
    pub threshold: f64,
    pub comparison_operator: String,
    pub evaluation_periods: u32,
    pub period: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawLogGroup {
    pub log_group_name: String,
    pub creation_time: Option<i64>,
    pub stored_bytes: Option<u64>,
    pub metric_filter_count: Option<u32>,
    pub arn: Option<String>,
    pub retention_in_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawLogStream {
    pub log_stream_name: String,
    pub creation_time: Option<i64>,
    pub first_event_time: Option<i64>,
    pub last_event_time: Option<i64>,
    pub stored_bytes: Option<u64>,
    pub arn: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RawLogEvent {
    pub timestamp: i64,
    pub message: String,
    /// Only present on filtered (search) results
    pub log_stream_name: Option<String>,
    pub ingestion_time: Option<i64>,
}

/// Streams of a group, ordered by most recent event first
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StreamsQuery {
    pub log_group_name: String,
    pub descending: bool,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EventsQuery {
    pub log_group_name: String,
    pub log_stream_name: String,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FilterQuery {
    pub log_group_name: String,
    pub filter_pattern: String,
    pub start_time: i64,
    pub end_time: i64,
    pub limit: usize,
}
