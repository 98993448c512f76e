//! Telemetry providers
//!
//! Each provider is bound to one backend scope (region) and decides once, at
//! construction, whether it runs live or offline. The three providers never
//! call each other.

/// Compute instance inventory
pub mod inventory;

/// Log groups, streams and events
pub mod logs;

/// Metric series and alarms
pub mod metrics;

/// Timeout and retry wrapper for upstream calls
pub mod retry;

use crate::backend::Backend;
use crate::config::Config;
use crate::normalize::DEFAULT_MAX_MESSAGE_LENGTH;
use log::{info, warn};

pub use inventory::{InstanceFilter, InventoryProvider};
pub use logs::LogsProvider;
pub use metrics::MetricsProvider;
pub use retry::RetryPolicy;

/// Settings shared by every provider
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderSettings {
    pub region: String,
    pub retry: RetryPolicy,
    /// Seed for offline metric jitter
    pub seed: Option<u64>,
    pub max_message_length: usize,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            region: "us-east-1".to_string(),
            retry: RetryPolicy::default(),
            seed: None,
            max_message_length: DEFAULT_MAX_MESSAGE_LENGTH,
        }
    }
}

impl ProviderSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            region: config.region.clone(),
            retry: RetryPolicy::from_config(&config.backend),
            seed: config.offline.seed,
            max_message_length: config.logs.max_message_length,
        }
    }
}

/// Probe the backend once; `false` means the provider should run offline
pub(crate) async fn probe_backend<B>(backend: &B, retry: &RetryPolicy, provider: &str) -> bool
where
    B: Backend + ?Sized,
{
    match retry
        .single_attempt()
        .run("probe", move || backend.probe())
        .await
    {
        Ok(()) => {
            info!(
                "{} provider connected to backend in {}",
                provider,
                backend.region()
            );
            true
        }
        Err(e) => {
            warn!(
                "{} provider cannot reach backend ({}), switching to offline mode",
                provider, e
            );
            false
        }
    }
}
