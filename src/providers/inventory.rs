use crate::backend::types::{RawInstance, RawInstanceStatus, RawRegion};
use crate::backend::ComputeApi;
use crate::error::ProviderError;
use crate::model::{
    BlockDevice, Instance, InstanceState, InstanceStatus, InstanceSummary, Region, SecurityGroup,
    StatusDetail,
};
use crate::offline;
use crate::providers::{probe_backend, ProviderSettings, RetryPolicy};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const UNNAMED_INSTANCE: &str = "Unnamed Instance";
const DEFAULT_PLATFORM: &str = "linux";

/// Empty id list asks the backend for every instance
const ALL_INSTANCES: &[String] = &[];

enum Mode {
    Live(Arc<dyn ComputeApi>),
    Offline,
}

/// Lists compute instances, their health and console output
///
/// In offline mode every listing is the same three sample instances and every
/// instance reports healthy.
pub struct InventoryProvider {
    mode: Mode,
    region: String,
    retry: RetryPolicy,
}

/// Optional criteria for narrowing an instance list
///
/// Text criteria match case-insensitively; `name_pattern` is a substring match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InstanceFilter {
    pub state: Option<InstanceState>,
    pub instance_type: Option<String>,
    pub name_pattern: Option<String>,
}

impl InstanceFilter {
    pub fn matches(&self, instance: &Instance) -> bool {
        if let Some(state) = self.state {
            if instance.state != state {
                return false;
            }
        }
        if let Some(ref instance_type) = self.instance_type {
            if !instance.instance_type.eq_ignore_ascii_case(instance_type) {
                return false;
            }
        }
        if let Some(ref pattern) = self.name_pattern {
            if !instance
                .name
                .to_lowercase()
                .contains(&pattern.to_lowercase())
            {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, instances: Vec<Instance>) -> Vec<Instance> {
        instances.into_iter().filter(|i| self.matches(i)).collect()
    }
}

impl InventoryProvider {
    /// Probe `backend` and build a live provider, or an offline one if the probe fails
    pub async fn connect(backend: Arc<dyn ComputeApi>, settings: &ProviderSettings) -> Self {
        if probe_backend(backend.as_ref(), &settings.retry, "Inventory").await {
            Self {
                mode: Mode::Live(backend),
                region: settings.region.clone(),
                retry: settings.retry.clone(),
            }
        } else {
            Self::offline(settings)
        }
    }

    /// Build a provider serving the fixed sample inventory
    pub fn offline(settings: &ProviderSettings) -> Self {
        info!("Inventory provider running offline for {}", settings.region);
        Self {
            mode: Mode::Offline,
            region: settings.region.clone(),
            retry: settings.retry.clone(),
        }
    }

    pub fn is_offline(&self) -> bool {
        matches!(self.mode, Mode::Offline)
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    /// Every instance visible in this region
    ///
    /// # Errors
    ///
    /// `AuthorizationDenied` when the caller lacks permission, `UpstreamUnavailable`
    /// when the backend cannot be reached, `Upstream` otherwise.
    pub async fn list_instances(&self) -> Result<Vec<Instance>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => return Ok(offline::sample_instances()),
            Mode::Live(api) => api.as_ref(),
        };

        let raw = self
            .retry
            .run("describe_instances", move || api.describe_instances(ALL_INSTANCES))
            .await?;
        debug!("Fetched {} instances in {}", raw.len(), self.region);

        raw.into_iter().map(to_instance).collect()
    }

    /// A single instance, `None` if it does not exist
    pub async fn get_instance(&self, instance_id: &str) -> Result<Option<Instance>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => {
                return Ok(offline::sample_instances()
                    .into_iter()
                    .find(|i| i.instance_id == instance_id))
            }
            Mode::Live(api) => api.as_ref(),
        };

        let ids = [instance_id.to_string()];
        let ids = &ids[..];
        match self
            .retry
            .run("describe_instances", move || api.describe_instances(ids))
            .await
        {
            Ok(raw) => raw.into_iter().next().map(to_instance).transpose(),
            Err(e) if e.is_not_found() => {
                debug!("Instance {} not found", instance_id);
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Running instances only, or any other single state
    pub async fn instances_in_state(
        &self,
        state: InstanceState,
    ) -> Result<Vec<Instance>, ProviderError> {
        let filter = InstanceFilter {
            state: Some(state),
            ..InstanceFilter::default()
        };
        self.filter_instances(&filter).await
    }

    pub async fn filter_instances(
        &self,
        filter: &InstanceFilter,
    ) -> Result<Vec<Instance>, ProviderError> {
        Ok(filter.apply(self.list_instances().await?))
    }

    /// Health checks for one instance, `None` when the backend reports none
    pub async fn instance_status(
        &self,
        instance_id: &str,
    ) -> Result<Option<InstanceStatus>, ProviderError> {
        let api = match &self.mode {
            Mode::Offline => return Ok(Some(offline::instance_status(instance_id))),
            Mode::Live(api) => api.as_ref(),
        };

        match self
            .retry
            .run("describe_instance_status", move || {
                api.describe_instance_status(instance_id)
            })
            .await
        {
            Ok(statuses) => statuses.into_iter().next().map(to_status).transpose(),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Console output as display text
    ///
    /// Never fails: a missing instance or backend error is reported in the
    /// returned text instead.
    pub async fn console_output(&self, instance_id: &str) -> String {
        let api = match &self.mode {
            Mode::Offline => return offline::console_log(),
            Mode::Live(api) => api.as_ref(),
        };

        match self
            .retry
            .run("get_console_output", move || {
                api.get_console_output(instance_id)
            })
            .await
        {
            Ok(Some(output)) if !output.is_empty() => output,
            Ok(_) => "No console output available".to_string(),
            Err(e) if e.is_not_found() => "Instance not found".to_string(),
            Err(e) => {
                warn!("Console output for {} failed: {}", instance_id, e);
                format!("Error retrieving console output: {}", e)
            }
        }
    }

    /// Regions offered by the backend
    ///
    /// Falls back to a short list of well-known regions when offline or when
    /// the lookup fails or comes back empty.
    pub async fn list_regions(&self) -> Vec<Region> {
        let api = match &self.mode {
            Mode::Offline => return fallback_regions(),
            Mode::Live(api) => api.as_ref(),
        };

        match self
            .retry
            .run("describe_regions", move || api.describe_regions())
            .await
        {
            Ok(regions) if !regions.is_empty() => regions.into_iter().map(to_region).collect(),
            Ok(_) => fallback_regions(),
            Err(e) => {
                warn!("Region lookup failed, using defaults: {}", e);
                fallback_regions()
            }
        }
    }

    /// Count instances by state and type without re-fetching
    pub fn summarize(instances: &[Instance]) -> InstanceSummary {
        let mut summary = InstanceSummary {
            total: instances.len(),
            ..InstanceSummary::default()
        };

        for instance in instances {
            match instance.state {
                InstanceState::Pending => summary.pending += 1,
                InstanceState::Running => summary.running += 1,
                InstanceState::Stopped => summary.stopped += 1,
                InstanceState::Terminated => summary.terminated += 1,
                InstanceState::Stopping | InstanceState::ShuttingDown => {}
            }
            *summary
                .by_type
                .entry(instance.instance_type.clone())
                .or_insert(0) += 1;
        }

        summary
    }
}

fn parse_state(name: &str) -> Result<InstanceState, ProviderError> {
    name.parse::<InstanceState>().map_err(ProviderError::Upstream)
}

fn to_instance(raw: RawInstance) -> Result<Instance, ProviderError> {
    let state = parse_state(&raw.state.name)?;
    let name = raw
        .tags
        .iter()
        .find(|tag| tag.key == "Name")
        .map(|tag| tag.value.clone())
        .unwrap_or_else(|| UNNAMED_INSTANCE.to_string());

    Ok(Instance {
        instance_id: raw.instance_id,
        name,
        instance_type: raw.instance_type,
        state,
        launch_time: raw.launch_time,
        public_ip: raw.public_ip_address,
        private_ip: raw.private_ip_address,
        vpc_id: raw.vpc_id,
        subnet_id: raw.subnet_id,
        availability_zone: raw.placement.and_then(|p| p.availability_zone),
        platform: raw
            .platform
            .unwrap_or_else(|| DEFAULT_PLATFORM.to_string()),
        architecture: raw.architecture,
        tags: raw.tags.into_iter().map(|tag| (tag.key, tag.value)).collect(),
        security_groups: raw
            .security_groups
            .into_iter()
            .map(|sg| SecurityGroup {
                group_id: sg.group_id,
                group_name: sg.group_name,
            })
            .collect(),
        block_devices: raw
            .block_device_mappings
            .into_iter()
            .map(|mapping| BlockDevice {
                device_name: mapping.device_name,
                delete_on_termination: mapping
                    .ebs
                    .as_ref()
                    .and_then(|ebs| ebs.delete_on_termination)
                    .unwrap_or(false),
                volume_id: mapping.ebs.map(|ebs| ebs.volume_id),
            })
            .collect(),
        monitoring: raw
            .monitoring
            .map(|m| m.state == "enabled")
            .unwrap_or(false),
        iam_instance_profile: raw.iam_instance_profile.map(|profile| profile.arn),
    })
}

fn to_status(raw: RawInstanceStatus) -> Result<InstanceStatus, ProviderError> {
    let state = parse_state(&raw.instance_state.name)?;
    let details = raw
        .system_status
        .details
        .iter()
        .map(|d| ("system", d))
        .chain(raw.instance_status.details.iter().map(|d| ("instance", d)))
        .map(|(scope, detail)| StatusDetail {
            scope: scope.to_string(),
            name: detail.name.clone(),
            status: detail.status.clone(),
        })
        .collect();

    Ok(InstanceStatus {
        instance_id: raw.instance_id,
        state,
        system_status_ok: raw.system_status.status == "ok",
        instance_status_ok: raw.instance_status.status == "ok",
        system_status: raw.system_status.status,
        instance_status: raw.instance_status.status,
        details,
    })
}

fn to_region(raw: RawRegion) -> Region {
    Region {
        display_name: title_case(&raw.region_name),
        name: raw.region_name,
        endpoint: raw.endpoint,
    }
}

/// "us-east-1" -> "Us East 1"
fn title_case(region_name: &str) -> String {
    region_name
        .split('-')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn fallback_regions() -> Vec<Region> {
    [
        ("us-east-1", "US East (N. Virginia)"),
        ("us-west-2", "US West (Oregon)"),
        ("eu-west-1", "Europe (Ireland)"),
        ("ap-southeast-1", "Asia Pacific (Singapore)"),
    ]
    .iter()
    .map(|(name, display_name)| Region {
        name: name.to_string(),
        endpoint: format!("ec2.{}.amazonaws.com", name),
        display_name: display_name.to_string(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::types::{
        BlockDeviceMapping, EbsDevice, MonitoringState, NamedState, Placement, RawStatusDetail,
        StatusSummary, Tag,
    };
    use crate::backend::MockBackend;
    use crate::error::BackendError;
    use std::time::Duration;

    fn settings() -> ProviderSettings {
        ProviderSettings {
            retry: RetryPolicy::new(2, Duration::from_millis(1), Duration::from_secs(1)),
            ..ProviderSettings::default()
        }
    }

    fn raw(id: &str, state: &str, instance_type: &str, name: Option<&str>) -> RawInstance {
        RawInstance {
            instance_id: id.to_string(),
            instance_type: instance_type.to_string(),
            state: NamedState {
                name: state.to_string(),
            },
            launch_time: None,
            public_ip_address: None,
            private_ip_address: Some("10.0.0.5".to_string()),
            vpc_id: None,
            subnet_id: None,
            placement: Some(Placement {
                availability_zone: Some("us-east-1b".to_string()),
            }),
            platform: None,
            architecture: None,
            tags: name
                .map(|n| {
                    vec![Tag {
                        key: "Name".to_string(),
                        value: n.to_string(),
                    }]
                })
                .unwrap_or_default(),
            security_groups: Vec::new(),
            block_device_mappings: Vec::new(),
            monitoring: None,
            iam_instance_profile: None,
        }
    }

    async fn live(backend: MockBackend) -> InventoryProvider {
        let provider = InventoryProvider::connect(Arc::new(backend), &settings()).await;
        assert!(!provider.is_offline());
        provider
    }

    #[test]
    fn test_to_instance_defaults() {
        let instance = to_instance(raw("i-1", "running", "t3.micro", None)).unwrap();
        assert_eq!(instance.name, "Unnamed Instance");
        assert_eq!(instance.platform, "linux");
        assert_eq!(instance.availability_zone.as_deref(), Some("us-east-1b"));
        assert!(!instance.monitoring);
        assert!(instance.block_devices.is_empty());
    }

    #[test]
    fn test_to_instance_devices_and_monitoring() {
        let mut r = raw("i-2", "stopped", "m5.large", Some("db"));
        r.monitoring = Some(MonitoringState {
            state: "enabled".to_string(),
        });
        r.block_device_mappings = vec![
            BlockDeviceMapping {
                device_name: "/dev/xvda".to_string(),
                ebs: Some(EbsDevice {
                    volume_id: "vol-1".to_string(),
                    delete_on_termination: Some(true),
                }),
            },
            BlockDeviceMapping {
                device_name: "/dev/sdb".to_string(),
                ebs: None,
            },
        ];

        let instance = to_instance(r).unwrap();
        assert!(instance.monitoring);
        assert_eq!(instance.tags.get("Name").map(String::as_str), Some("db"));
        assert_eq!(instance.block_devices[0].volume_id.as_deref(), Some("vol-1"));
        assert!(instance.block_devices[0].delete_on_termination);
        assert_eq!(instance.block_devices[1].volume_id, None);
        assert!(!instance.block_devices[1].delete_on_termination);
    }

    #[test]
    fn test_unknown_state_is_upstream_error() {
        let result = to_instance(raw("i-3", "hibernating", "t3.micro", None));
        assert!(matches!(result, Err(ProviderError::Upstream(_))));
    }

    #[test]
    fn test_summarize() {
        let instances: Vec<Instance> = [
            raw("i-1", "running", "t3.micro", None),
            raw("i-2", "running", "t3.micro", None),
            raw("i-3", "stopped", "m5.large", None),
            raw("i-4", "stopping", "m5.large", None),
        ]
        .into_iter()
        .map(|r| to_instance(r).unwrap())
        .collect();

        let summary = InventoryProvider::summarize(&instances);
        assert_eq!(summary.total, 4);
        assert_eq!(summary.running, 2);
        assert_eq!(summary.stopped, 1);
        assert_eq!(summary.pending, 0);
        assert_eq!(summary.by_type.get("t3.micro"), Some(&2));
        assert_eq!(summary.by_type.get("m5.large"), Some(&2));
    }

    #[test]
    fn test_summarize_empty() {
        assert_eq!(InventoryProvider::summarize(&[]), InstanceSummary::default());
    }

    #[test]
    fn test_filter_case_insensitive() {
        let instances = offline::sample_instances();
        let filter = InstanceFilter {
            name_pattern: Some("SERVER".to_string()),
            instance_type: Some("T3.MEDIUM".to_string()),
            ..InstanceFilter::default()
        };
        let matched = filter.apply(instances);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].instance_id, offline::SAMPLE_WEB_ID);
    }

    #[test]
    fn test_title_case() {
        assert_eq!(title_case("us-east-1"), "Us East 1");
        assert_eq!(title_case("ap-southeast-2"), "Ap Southeast 2");
    }

    #[tokio::test]
    async fn test_unreachable_backend_goes_offline() {
        let backend = Arc::new(MockBackend::unreachable("us-east-1"));
        let provider = InventoryProvider::connect(backend.clone(), &settings()).await;

        assert!(provider.is_offline());
        let first = provider.list_instances().await.unwrap();
        let second = provider.list_instances().await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
        // Only the probe ever reached the backend
        assert_eq!(backend.calls(), vec!["probe"]);
    }

    #[tokio::test]
    async fn test_offline_status_and_console() {
        let provider = InventoryProvider::offline(&settings());
        let status = provider.instance_status("i-whatever").await.unwrap().unwrap();
        assert!(status.system_status_ok);
        assert_eq!(status.state, InstanceState::Running);
        assert!(provider.console_output("i-1").await.lines().count() > 1);
        assert_eq!(provider.list_regions().await.len(), 4);
    }

    #[tokio::test]
    async fn test_get_instance_not_found_is_none() {
        let provider = live(MockBackend::new("us-east-1")).await;
        assert_eq!(provider.get_instance("i-missing").await, Ok(None));
    }

    #[tokio::test]
    async fn test_access_denied_surfaces() {
        let provider = live(MockBackend::new("us-east-1").failing(
            "describe_instances",
            BackendError::AccessDenied("UnauthorizedOperation".to_string()),
        ))
        .await;

        assert!(matches!(
            provider.list_instances().await,
            Err(ProviderError::AuthorizationDenied(_))
        ));
    }

    #[tokio::test]
    async fn test_transient_failure_is_retried() {
        let backend = Arc::new(
            MockBackend::new("us-east-1")
                .with_instance(raw("i-1", "running", "t3.micro", Some("web")))
                .failing_times(
                    "describe_instances",
                    BackendError::Unavailable("503".to_string()),
                    1,
                ),
        );
        let provider = InventoryProvider::connect(backend.clone(), &settings()).await;

        let instances = provider.list_instances().await.unwrap();
        assert_eq!(instances.len(), 1);
        assert_eq!(backend.call_count("describe_instances"), 2);
    }

    #[tokio::test]
    async fn test_console_output_never_fails() {
        let provider = live(
            MockBackend::new("us-east-1")
                .with_instance(raw("i-1", "running", "t3.micro", None))
                .with_instance(raw("i-2", "running", "t3.micro", None))
                .with_console("i-2", "boot ok")
                .failing(
                    "get_console_output:i-err",
                    BackendError::AccessDenied("denied".to_string()),
                ),
        )
        .await;

        assert_eq!(provider.console_output("i-2").await, "boot ok");
        assert_eq!(
            provider.console_output("i-1").await,
            "No console output available"
        );
        assert_eq!(provider.console_output("i-nope").await, "Instance not found");
        assert!(provider
            .console_output("i-err")
            .await
            .starts_with("Error retrieving console output:"));
    }

    #[tokio::test]
    async fn test_instance_status_details() {
        let provider = live(MockBackend::new("us-east-1").with_status(RawInstanceStatus {
            instance_id: "i-1".to_string(),
            instance_state: NamedState {
                name: "running".to_string(),
            },
            system_status: StatusSummary {
                status: "ok".to_string(),
                details: vec![RawStatusDetail {
                    name: "reachability".to_string(),
                    status: "passed".to_string(),
                }],
            },
            instance_status: StatusSummary {
                status: "impaired".to_string(),
                details: vec![RawStatusDetail {
                    name: "reachability".to_string(),
                    status: "failed".to_string(),
                }],
            },
        }))
        .await;

        let status = provider.instance_status("i-1").await.unwrap().unwrap();
        assert!(status.system_status_ok);
        assert!(!status.instance_status_ok);
        assert_eq!(status.details.len(), 2);
        assert_eq!(status.details[1].scope, "instance");

        assert_eq!(provider.instance_status("i-2").await, Ok(None));
    }

    #[tokio::test]
    async fn test_regions_fallback_on_failure() {
        let provider = live(MockBackend::new("us-east-1").failing(
            "describe_regions",
            BackendError::AccessDenied("nope".to_string()),
        ))
        .await;
        let regions = provider.list_regions().await;
        assert_eq!(regions[0].display_name, "US East (N. Virginia)");

        let provider = live(
            MockBackend::new("us-east-1").with_region("eu-north-1", "ec2.eu-north-1.amazonaws.com"),
        )
        .await;
        let regions = provider.list_regions().await;
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].display_name, "Eu North 1");
    }
}
