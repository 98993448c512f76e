/// Error types for backends, providers and configuration
pub mod error;

/// Normalized record types
pub mod model;

/// Pure reshaping: series formatting, alert classification, text, windows
pub mod normalize;

/// Upstream telemetry backend traits and implementations
pub mod backend;

/// Inventory, metrics and logs providers
pub mod providers;

/// Offline fixtures and synthetic series
pub mod offline;

/// Region-wide instance overview with CPU alerts
pub mod overview;

/// Configuration management
pub mod config;

// Re-export commonly used types
pub use config::Config;
pub use error::{BackendError, ConfigError, ProviderError};
pub use normalize::TimeWindow;
pub use overview::{build_overview, Overview};
pub use providers::{InventoryProvider, LogsProvider, MetricsProvider, ProviderSettings};
