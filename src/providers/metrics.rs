use crate::backend::types::{Dimension, RawAlarm, StatisticsQuery};
use crate::backend::MetricsApi;
use crate::error::ProviderError;
use crate::model::{Alarm, DiskMetrics, InstanceMetrics, MetricSeries, NetworkMetrics};
use crate::normalize::{sort_and_format, TimeWindow, METRIC_PERIOD_SECONDS, UNIT_BYTES, UNIT_PERCENT};
use crate::offline::{self, MetricFamily, Role, Synthesizer};
use crate::providers::{probe_backend, ProviderSettings, RetryPolicy};
use chrono::Utc;
use log::{debug, info};
use std::sync::Arc;

/// Namespace of the per-instance compute metrics
pub const INSTANCE_NAMESPACE: &str = "AWS/EC2";

pub const CPU_UTILIZATION: &str = "CPUUtilization";
pub const NETWORK_IN: &str = "NetworkIn";
pub const NETWORK_OUT: &str = "NetworkOut";
pub const DISK_READ_BYTES: &str = "DiskReadBytes";
pub const DISK_WRITE_BYTES: &str = "DiskWriteBytes";

const STATISTICS: [&str; 3] = ["Average", "Maximum", "Minimum"];

enum Mode {
    Live(Arc<dyn MetricsApi>),
    Offline(Synthesizer),
}

/// Windowed metric series, metric names and alarms for instances
///
/// Offline, every series is synthesized around a baseline picked from the
/// instance id (see [`Role`]).
pub struct MetricsProvider {
    mode: Mode,
    region: String,
    retry: RetryPolicy,
}

impl MetricsProvider {
    /// Probe `backend` and build a live provider, or an offline one if the probe fails
    pub async fn connect(backend: Arc<dyn MetricsApi>, settings: &ProviderSettings) -> Self {
        if probe_backend(backend.as_ref(), &settings.retry, "Metrics").await {
            Self {
                mode: Mode::Live(backend),
                region: settings.region.clone(),
                retry: settings.retry.clone(),
            }
        } else {
            Self::offline(settings)
        }
    }

    /// Build a provider that synthesizes every series
    pub fn offline(settings: &ProviderSettings) -> Self {
        info!(
            "Metrics provider running offline for {} (seed: {:?})",
            settings.region, settings.seed
        );
        Self {
            mode: Mode::Offline(Synthesizer::new(settings.seed)),
            region: settings.region.clone(),
            retry: settings.retry.clone(),
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.mode, Mode::Offline(_))
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// CPU utilization, percent
    pub async fn cpu(
        &self,
        instance_id: &str,
        window: &TimeWindow,
    ) -> Result<MetricSeries, ProviderError> {
        self.series(instance_id, CPU_UTILIZATION, MetricFamily::Cpu, window)
            .await
    }

    /// Bytes received and sent
    pub async fn network(
        &self,
        instance_id: &str,
        window: &TimeWindow,
    ) -> Result<NetworkMetrics, ProviderError> {
        let (network_in, network_out) = tokio::try_join!(
            self.series(instance_id, NETWORK_IN, MetricFamily::Network, window),
            self.series(instance_id, NETWORK_OUT, MetricFamily::Network, window),
        )?;
        Ok(NetworkMetrics {
            network_in,
            network_out,
        })
    }

    /// Bytes read from and written to instance-store volumes
    pub async fn disk(
        &self,
        instance_id: &str,
        window: &TimeWindow,
    ) -> Result<DiskMetrics, ProviderError> {
        let (disk_read, disk_write) = tokio::try_join!(
            self.series(instance_id, DISK_READ_BYTES, MetricFamily::Disk, window),
            self.series(instance_id, DISK_WRITE_BYTES, MetricFamily::Disk, window),
        )?;
        Ok(DiskMetrics {
            disk_read,
            disk_write,
        })
    }

    /// CPU, network and disk together, fetched concurrently
    ///
    /// Fails as a whole if any of the three fails.
    pub async fn all(
        &self,
        instance_id: &str,
        window: &TimeWindow,
    ) -> Result<InstanceMetrics, ProviderError> {
        let (cpu, network, disk) = tokio::try_join!(
            self.cpu(instance_id, window),
            self.network(instance_id, window),
            self.disk(instance_id, window),
        )?;

        Ok(InstanceMetrics {
            instance_id: instance_id.to_string(),
            generated_at: Utc::now(),
            duration_hours: window.hours,
            cpu,
            network,
            disk,
        })
    }

    /// Any other metric in the instance namespace
    ///
    /// Missing units default to "Percent". Offline, the series is CPU shaped.
    pub async fn custom_metric(
        &self,
        instance_id: &str,
        metric_name: &str,
        window: &TimeWindow,
    ) -> Result<MetricSeries, ProviderError> {
        self.series(instance_id, metric_name, MetricFamily::Cpu, window)
            .await
    }

    /// Names of the metrics the backend holds for this instance, sorted
    pub async fn available_metric_names(
        &self,
        instance_id: &str,
    ) -> Result<Vec<String>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline(_) => {
                return Ok(offline::INSTANCE_METRIC_NAMES
                    .iter()
                    .map(|name| name.to_string())
                    .collect())
            }
            Mode::Live(api) => api.as_ref(),
        };

        let dimension = Dimension::instance(instance_id);
        let dimension = &dimension;
        let descriptors = self
            .retry
            .run("list_metrics", move || {
                api.list_metrics(INSTANCE_NAMESPACE, dimension)
            })
            .await?;

        let mut names: Vec<String> = descriptors.into_iter().map(|d| d.metric_name).collect();
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Alarms whose name starts with the instance id
    ///
    /// An upstream not-found yields an empty list.
    pub async fn alarms(&self, instance_id: &str) -> Result<Vec<Alarm>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline(_) => return Ok(Vec::new()),
            Mode::Live(api) => api.as_ref(),
        };

        match self
            .retry
            .run("describe_alarms", move || api.describe_alarms(instance_id))
            .await
        {
            Ok(alarms) => Ok(alarms.into_iter().map(to_alarm).collect()),
            Err(e) if e.is_not_found() => {
                debug!("No alarms for {}", instance_id);
                Ok(Vec::new())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn series(
        &self,
        instance_id: &str,
        metric_name: &str,
        family: MetricFamily,
        window: &TimeWindow,
    ) -> Result<MetricSeries, ProviderError> {
        let api = match &self.mode {
            Mode::Offline(synth) => {
                let role = Role::infer(instance_id);
                let baseline = match family {
                    MetricFamily::Cpu => role.cpu_baseline(),
                    MetricFamily::Network => role.network_baseline(),
                    MetricFamily::Disk => role.disk_baseline(),
                };
                return Ok(synth.series(family, baseline, window));
            }
            Mode::Live(api) => api.as_ref(),
        };

        let query = statistics_query(instance_id, metric_name, window);
        let query = &query;
        let points = self
            .retry
            .run("get_metric_statistics", move || {
                api.get_metric_statistics(query)
            })
            .await?;
        debug!(
            "{} for {}: {} datapoints",
            metric_name,
            instance_id,
            points.len()
        );

        let unit_default = match family {
            MetricFamily::Cpu => UNIT_PERCENT,
            MetricFamily::Network | MetricFamily::Disk => UNIT_BYTES,
        };
        Ok(sort_and_format(points, unit_default))
    }
}

fn statistics_query(instance_id: &str, metric_name: &str, window: &TimeWindow) -> StatisticsQuery {
    StatisticsQuery {
        namespace: INSTANCE_NAMESPACE.to_string(),
        metric_name: metric_name.to_string(),
        dimensions: vec![Dimension::instance(instance_id)],
        start_time: window.start,
        end_time: window.end,
        period: METRIC_PERIOD_SECONDS,
        statistics: STATISTICS.iter().map(|s| s.to_string()).collect(),
    }
}

fn to_alarm(raw: RawAlarm) -> Alarm {
    Alarm {
        alarm_name: raw.alarm_name,
        alarm_arn: raw.alarm_arn,
        state: raw.state_value,
        state_reason: raw.state_reason.unwrap_or_else(|| "N/A".to_string()),
        metric_name: raw.metric_name,
        namespace: raw.namespace,
        threshold: raw.threshold,
        comparison_operator: raw.comparison_operator,
        evaluation_periods: raw.evaluation_periods,
        period: raw.period,
    }
}
