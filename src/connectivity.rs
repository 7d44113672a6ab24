//! Connectivity probe: pre-flight health check for the campaign backend.
//!
//! The last result is cached for a short TTL and concurrent callers share a
//! single in-flight request, so several steps probing in the same render
//! cycle cost one round trip.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::CampaignApi;
use crate::config::MAX_HEALTH_TIMEOUT;
use crate::error::ApiError;

/// Process-wide view of backend reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Unknown,
    Connected,
    Disconnected,
}

impl std::fmt::Display for ConnectivityStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Unknown => "unknown",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        };
        write!(f, "{s}")
    }
}

/// Something that can answer a health check.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn health_check(&self) -> Result<(), ApiError>;
}

/// Adapts a full [`CampaignApi`] to [`HealthCheck`].
struct ApiHealth(Arc<dyn CampaignApi>);

#[async_trait]
impl HealthCheck for ApiHealth {
    async fn health_check(&self) -> Result<(), ApiError> {
        self.0.health_check().await
    }
}

#[derive(Debug, Clone, Copy)]
struct Cached {
    status: ConnectivityStatus,
    checked_at: Option<Instant>,
}

struct ProbeInner {
    health: Arc<dyn HealthCheck>,
    timeout: Duration,
    ttl: Duration,
    cached: RwLock<Cached>,
    refresh: Mutex<()>,
}

/// Shared connectivity probe. Cloning is cheap; clones share the cache.
#[derive(Clone)]
pub struct ConnectivityProbe {
    inner: Arc<ProbeInner>,
}

impl ConnectivityProbe {
    pub fn new(health: Arc<dyn HealthCheck>, timeout: Duration, ttl: Duration) -> Self {
        Self {
            inner: Arc::new(ProbeInner {
                health,
                timeout: timeout.min(MAX_HEALTH_TIMEOUT),
                ttl,
                cached: RwLock::new(Cached {
                    status: ConnectivityStatus::Unknown,
                    checked_at: None,
                }),
                refresh: Mutex::new(()),
            }),
        }
    }

    /// Probe through the campaign API's health endpoint.
    pub fn from_api(api: Arc<dyn CampaignApi>, timeout: Duration, ttl: Duration) -> Self {
        Self::new(Arc::new(ApiHealth(api)), timeout, ttl)
    }

    /// Last known status without touching the network.
    pub async fn status(&self) -> ConnectivityStatus {
        self.inner.cached.read().await.status
    }

    /// Drop the cached result so the next `check` asks the backend.
    pub async fn invalidate(&self) {
        self.inner.cached.write().await.checked_at = None;
    }

    /// Current reachability. Never fails: any error maps to `Disconnected`.
    pub async fn check(&self) -> ConnectivityStatus {
        if let Some(status) = self.fresh().await {
            return status;
        }

        let _refresh = self.inner.refresh.lock().await;
        // Someone else may have refreshed while we waited for the lock.
        if let Some(status) = self.fresh().await {
            return status;
        }

        let status = match tokio::time::timeout(self.inner.timeout, self.inner.health.health_check())
            .await
        {
            Ok(Ok(())) => ConnectivityStatus::Connected,
            Ok(Err(e)) => {
                warn!(error = %e, "Health check failed");
                ConnectivityStatus::Disconnected
            }
            Err(_) => {
                warn!(timeout = ?self.inner.timeout, "Health check timed out");
                ConnectivityStatus::Disconnected
            }
        };

        let previous = {
            let mut cached = self.inner.cached.write().await;
            let previous = cached.status;
            *cached = Cached {
                status,
                checked_at: Some(Instant::now()),
            };
            previous
        };

        if previous != status {
            info!(from = %previous, to = %status, "Connectivity changed");
        } else {
            debug!(%status, "Connectivity unchanged");
        }
        status
    }

    async fn fresh(&self) -> Option<ConnectivityStatus> {
        let cached = *self.inner.cached.read().await;
        let checked_at = cached.checked_at?;
        (checked_at.elapsed() < self.inner.ttl).then_some(cached.status)
    }
}
