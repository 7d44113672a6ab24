//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;
use crate::operation::OperationKind;

/// Health checks must answer within this bound.
pub const MAX_HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Backend client configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Base URL of the campaign backend, without trailing slash.
    pub base_url: String,
    /// Bearer token issued by the auth service, if any.
    pub token: Option<SecretString>,
    /// Client timeout for bounded calls.
    pub request_timeout: Duration,
    /// Client timeout for the health check (never above 5s).
    pub health_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8000".to_string(),
            token: None,
            request_timeout: Duration::from_secs(30),
            health_timeout: MAX_HEALTH_TIMEOUT,
        }
    }
}

/// Retry and progress policy shared by every supervised operation.
#[derive(Debug, Clone)]
pub struct OperationPolicy {
    /// Attempts allowed per independent invocation.
    pub max_attempts: u32,
    /// Interval between cosmetic progress ticks.
    pub tick_interval: Duration,
    /// Largest pseudo-random progress increment per tick.
    pub max_tick_increment: u8,
}

impl Default for OperationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            tick_interval: Duration::from_millis(500),
            max_tick_increment: 8,
        }
    }
}

impl OperationPolicy {
    /// Base duration estimate in seconds for one attempt of `kind`.
    pub fn base_duration_secs(&self, kind: OperationKind) -> u32 {
        match kind {
            OperationKind::Clone => 60,
            OperationKind::DnsValidate => 20,
            OperationKind::AiGenerate => 45,
            OperationKind::TemplateSelect => 10,
        }
    }
}

/// Wizard configuration.
#[derive(Debug, Clone)]
pub struct WizardConfig {
    pub api: ApiConfig,
    pub operations: OperationPolicy,
    /// How long a probe result is reused before asking the backend again.
    pub probe_ttl: Duration,
    /// Where the local session snapshot is written.
    pub session_path: PathBuf,
    /// Optional directory for rolling log files.
    pub log_dir: Option<PathBuf>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            operations: OperationPolicy::default(),
            probe_ttl: Duration::from_millis(1000),
            session_path: PathBuf::from("./data/campaign-wizard.json"),
            log_dir: None,
        }
    }
}

impl WizardConfig {
    /// Build from `CAMPAIGN_WIZARD_*` environment variables, falling back to
    /// defaults for anything unset or unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let base_url = std::env::var("CAMPAIGN_WIZARD_API_URL")
            .unwrap_or(defaults.api.base_url)
            .trim_end_matches('/')
            .to_string();
        validate_base_url(&base_url)?;

        let token = std::env::var("CAMPAIGN_WIZARD_API_TOKEN")
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from);

        let request_timeout = env_u64("CAMPAIGN_WIZARD_REQUEST_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.api.request_timeout);

        let health_timeout = env_u64("CAMPAIGN_WIZARD_HEALTH_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.api.health_timeout)
            .min(MAX_HEALTH_TIMEOUT);

        let probe_ttl = env_u64("CAMPAIGN_WIZARD_PROBE_TTL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.probe_ttl);

        let max_attempts = env_u64("CAMPAIGN_WIZARD_MAX_ATTEMPTS")
            .and_then(|n| u32::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.operations.max_attempts);

        let tick_interval = env_u64("CAMPAIGN_WIZARD_TICK_MS")
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.operations.tick_interval);

        let session_path = std::env::var("CAMPAIGN_WIZARD_SESSION_PATH")
            .map(PathBuf::from)
            .unwrap_or(defaults.session_path);

        let log_dir = std::env::var("CAMPAIGN_WIZARD_LOG_DIR")
            .ok()
            .filter(|d| !d.trim().is_empty())
            .map(PathBuf::from);

        Ok(Self {
            api: ApiConfig {
                base_url,
                token,
                request_timeout,
                health_timeout,
            },
            operations: OperationPolicy {
                max_attempts,
                tick_interval,
                ..defaults.operations
            },
            probe_ttl,
            session_path,
            log_dir,
        })
    }
}

fn env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn validate_base_url(base_url: &str) -> Result<(), ConfigError> {
    let url = reqwest::Url::parse(base_url).map_err(|e| ConfigError::InvalidValue {
        key: "CAMPAIGN_WIZARD_API_URL".to_string(),
        message: e.to_string(),
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidValue {
            key: "CAMPAIGN_WIZARD_API_URL".to_string(),
            message: format!("unsupported scheme {}", url.scheme()),
        });
    }
    Ok(())
}
