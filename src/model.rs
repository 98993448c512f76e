//! Normalized record types returned by the providers
//!
//! Everything here is built fresh per request from backend responses (or offline
//! fixtures), owned by the caller, and serializable for whatever layer renders it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Timestamp type for consistent time handling across the crate
pub type Timestamp = DateTime<Utc>;

/// Lifecycle state of a compute instance, exactly as the backend reports it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    Stopping,
    Stopped,
    ShuttingDown,
    Terminated,
}

impl InstanceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InstanceState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(InstanceState::Pending),
            "running" => Ok(InstanceState::Running),
            "stopping" => Ok(InstanceState::Stopping),
            "stopped" => Ok(InstanceState::Stopped),
            "shutting-down" => Ok(InstanceState::ShuttingDown),
            "terminated" => Ok(InstanceState::Terminated),
            other => Err(format!("unknown instance state '{}'", other)),
        }
    }
}

/// Snapshot of one compute instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Instance {
    pub instance_id: String,
    /// Value of the `Name` tag, or "Unnamed Instance"
    pub name: String,
    pub instance_type: String,
    pub state: InstanceState,
    pub launch_time: Option<Timestamp>,
    pub public_ip: Option<String>,
    pub private_ip: Option<String>,
    pub vpc_id: Option<String>,
    pub subnet_id: Option<String>,
    pub availability_zone: Option<String>,
    pub platform: String,
    pub architecture: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub security_groups: Vec<SecurityGroup>,
    pub block_devices: Vec<BlockDevice>,
    /// Detailed monitoring enabled
    pub monitoring: bool,
    pub iam_instance_profile: Option<String>,
}

impl Instance {
    pub fn is_running(&self) -> bool {
        self.state == InstanceState::Running
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SecurityGroup {
    pub group_id: String,
    pub group_name: String,
}

/// Block device attached to an instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BlockDevice {
    pub device_name: String,
    /// None for non-EBS devices
    pub volume_id: Option<String>,
    pub delete_on_termination: bool,
}

/// Health checks for a single instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceStatus {
    pub instance_id: String,
    pub state: InstanceState,
    pub system_status: String,
    pub instance_status: String,
    pub system_status_ok: bool,
    pub instance_status_ok: bool,
    pub details: Vec<StatusDetail>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusDetail {
    /// Which check this detail belongs to ("system" or "instance")
    pub scope: String,
    pub name: String,
    pub status: String,
}

/// Counts over an already fetched instance list
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstanceSummary {
    pub total: usize,
    pub pending: usize,
    pub running: usize,
    pub stopped: usize,
    pub terminated: usize,
    pub by_type: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Region {
    pub name: String,
    pub endpoint: String,
    pub display_name: String,
}

/// One normalized sample of a metric
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricPoint {
    pub timestamp: Timestamp,
    pub average: f64,
    pub maximum: f64,
    pub minimum: f64,
    pub unit: String,
}

/// Samples for one metric over one window, ascending by timestamp
pub type MetricSeries = Vec<MetricPoint>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkMetrics {
    pub network_in: MetricSeries,
    pub network_out: MetricSeries,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DiskMetrics {
    pub disk_read: MetricSeries,
    pub disk_write: MetricSeries,
}

/// CPU, network and disk series bundled with request metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceMetrics {
    pub instance_id: String,
    pub generated_at: Timestamp,
    pub duration_hours: u32,
    pub cpu: MetricSeries,
    pub network: NetworkMetrics,
    pub disk: DiskMetrics,
}

/// Metric alarm configured against an instance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Alarm {
    pub alarm_name: String,
    pub alarm_arn: String,
    pub state: String,
    pub state_reason: String,
    pub metric_name: String,
    pub namespace: String,
    pub threshold: f64,
    pub comparison_operator: String,
    pub evaluation_periods: u32,
    pub period: u32,
}

/// Severity of a threshold alert, ordered from quiet to loud
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    None,
    Low,
    Medium,
    High,
}

/// Derived alert state for a scalar reading
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AlertStatus {
    pub alert: bool,
    pub severity: AlertSeverity,
    pub message: String,
}

impl AlertStatus {
    /// A non-alerting status carrying an explanatory message
    pub fn quiet(message: impl Into<String>) -> Self {
        Self {
            alert: false,
            severity: AlertSeverity::None,
            message: message.into(),
        }
    }
}

/// A single log event, message already sanitized for display
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogEvent {
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub message: String,
    pub log_stream_name: Option<String>,
    pub ingestion_time: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogGroup {
    pub log_group_name: String,
    pub creation_time: Option<i64>,
    pub stored_bytes: u64,
    pub metric_filter_count: u32,
    pub arn: Option<String>,
    pub retention_in_days: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogStream {
    pub log_stream_name: String,
    pub creation_time: Option<i64>,
    pub first_event_time: Option<i64>,
    pub last_event_time: Option<i64>,
    pub stored_bytes: u64,
    pub arn: Option<String>,
}

/// An item a best-effort aggregation could not fetch
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Skipped {
    /// Stream or group name that failed
    pub item: String,
    pub reason: String,
}

/// Result of a best-effort aggregation over several upstream items
///
/// `attempted` counts every item queried, so `skipped.len()` of `attempted`
/// items were dropped from `items`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Collected<T> {
    pub items: Vec<T>,
    pub attempted: usize,
    pub skipped: Vec<Skipped>,
}

impl<T> Default for Collected<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            attempted: 0,
            skipped: Vec::new(),
        }
    }
}

impl<T> Collected<T> {
    pub fn skip(&mut self, item: impl Into<String>, reason: impl ToString) {
        self.skipped.push(Skipped {
            item: item.into(),
            reason: reason.to_string(),
        });
    }

    /// Fold another aggregation into this one
    pub fn absorb(&mut self, other: Collected<T>) {
        self.items.extend(other.items);
        self.attempted += other.attempted;
        self.skipped.extend(other.skipped);
    }
}

/// Logs correlated to one instance by log group naming conventions
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceLogs {
    pub instance_id: String,
    pub generated_at: Timestamp,
    pub duration_hours: u32,
    pub system_logs: Vec<LogEvent>,
    pub error_logs: Vec<LogEvent>,
    /// Streams sampled for system logs plus groups searched or failed outright
    pub attempted: usize,
    /// Log groups or streams that matched but could not be read
    pub skipped: Vec<Skipped>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_instance_state_round_trip_strings() {
        for state in [
            InstanceState::Pending,
            InstanceState::Running,
            InstanceState::Stopping,
            InstanceState::Stopped,
            InstanceState::ShuttingDown,
            InstanceState::Terminated,
        ] {
            assert_eq!(state.as_str().parse::<InstanceState>(), Ok(state));
            assert_eq!(
                serde_json::to_string(&state).unwrap(),
                format!("\"{}\"", state.as_str())
            );
        }
    }

    #[test]
    fn test_instance_state_rejects_unknown() {
        assert!("rebooting".parse::<InstanceState>().is_err());
        assert_eq!("RUNNING".parse::<InstanceState>(), Ok(InstanceState::Running));
    }

    #[test]
    fn test_alert_severity_ordering_and_serialization() {
        assert!(AlertSeverity::None < AlertSeverity::Low);
        assert!(AlertSeverity::Low < AlertSeverity::Medium);
        assert!(AlertSeverity::Medium < AlertSeverity::High);
        assert_eq!(
            serde_json::to_string(&AlertSeverity::Medium).unwrap(),
            "\"medium\""
        );
    }

    #[test]
    fn test_collected_absorb() {
        let mut first: Collected<u32> = Collected {
            items: vec![1],
            attempted: 2,
            skipped: Vec::new(),
        };
        first.skip("stream-b", "access denied");

        let second = Collected {
            items: vec![2, 3],
            attempted: 1,
            skipped: Vec::new(),
        };
        first.absorb(second);

        assert_eq!(first.items, vec![1, 2, 3]);
        assert_eq!(first.attempted, 3);
        assert_eq!(first.skipped.len(), 1);
        assert_eq!(first.skipped[0].item, "stream-b");
    }
}
