use crate::error::ProviderError;
use crate::model::{AlertStatus, Instance, InstanceSummary, Timestamp};
use crate::normalize::{classify_alert, TimeWindow};
use crate::providers::{InventoryProvider, MetricsProvider};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// Hours of CPU history consulted for each instance's alert
const OVERVIEW_WINDOW_HOURS: u32 = 1;

/// One instance with its latest CPU reading and alert
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InstanceOverview {
    pub instance: Instance,
    /// Latest average CPU, 0 when unknown
    pub current_cpu: f64,
    pub alert_status: AlertStatus,
}

/// Region-wide dashboard data
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Overview {
    pub region: String,
    pub generated_at: Timestamp,
    pub offline: bool,
    pub summary: InstanceSummary,
    pub instances: Vec<InstanceOverview>,
}

/// List instances, summarize them and attach a CPU alert to each
///
/// Only listing the instances can fail. A CPU lookup that fails or returns
/// nothing is reported in that instance's alert message instead.
///
/// # Arguments
/// * `threshold` - CPU percentage passed to [`classify_alert`]
/// * `now` - End of the one-hour CPU window
pub async fn build_overview(
    inventory: &InventoryProvider,
    metrics: &MetricsProvider,
    threshold: f64,
    now: Timestamp,
) -> Result<Overview, ProviderError> {
    let instances = inventory.list_instances().await?;
    let summary = InventoryProvider::summarize(&instances);
    let window = TimeWindow::ending_at(now, OVERVIEW_WINDOW_HOURS);

    let mut rows = Vec::with_capacity(instances.len());
    for instance in instances {
        let (current_cpu, alert_status) = if !instance.is_running() {
            (0.0, AlertStatus::quiet("Instance not running"))
        } else {
            match metrics.cpu(&instance.instance_id, &window).await {
                Ok(series) => match series.last() {
                    Some(latest) => (latest.average, classify_alert(latest.average, threshold)),
                    None => (0.0, AlertStatus::quiet("No CPU data available")),
                },
                Err(e) => {
                    warn!("CPU lookup for {} failed: {}", instance.instance_id, e);
                    (0.0, AlertStatus::quiet("Error fetching CPU data"))
                }
            }
        };
        debug!(
            "{}: cpu {:.1}%, severity {:?}",
            instance.instance_id, current_cpu, alert_status.severity
        );
        rows.push(InstanceOverview {
            instance,
            current_cpu,
            alert_status,
        });
    }

    Ok(Overview {
        region: inventory.region().to_string(),
        generated_at: now,
        offline: inventory.is_offline(),
        summary,
        instances: rows,
    })
}
