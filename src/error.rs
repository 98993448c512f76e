use std::time::Duration;
use thiserror::Error;

/// Errors reported by a telemetry backend
///
/// These are the upstream categories every backend implementation must map its
/// failures onto. Providers translate them into [`ProviderError`] or, where an
/// operation documents it, into a normal empty/`None` result.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BackendError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error("API error {code}: {message}")]
    Api { code: String, message: String },

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Invalid backend endpoint: {0}")]
    InvalidEndpoint(String),
}

impl BackendError {
    /// Whether retrying the same call could plausibly succeed
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Unavailable(_) | BackendError::Timeout(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, BackendError::NotFound(_))
    }
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            BackendError::Unavailable(format!("request timed out: {}", err))
        } else if err.is_decode() {
            BackendError::InvalidResponse(err.to_string())
        } else {
            BackendError::Unavailable(err.to_string())
        }
    }
}

/// Errors surfaced to callers of the providers
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("Insufficient permissions: {0}")]
    AuthorizationDenied(String),

    #[error("Telemetry backend unreachable: {0}")]
    UpstreamUnavailable(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<BackendError> for ProviderError {
    fn from(err: BackendError) -> Self {
        match err {
            BackendError::AccessDenied(msg) => ProviderError::AuthorizationDenied(msg),
            BackendError::Unavailable(_) | BackendError::Timeout(_) => {
                ProviderError::UpstreamUnavailable(err.to_string())
            }
            other => ProviderError::Upstream(other.to_string()),
        }
    }
}

/// Errors that can occur during configuration loading
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Invalid configuration value: {0}")]
    ValidationError(String),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),
}
