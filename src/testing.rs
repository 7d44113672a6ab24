//! Test doubles shared by unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::api::{
    CampaignApi, CampaignId, ClonedPage, DnsRequest, DnsValidation, GenerateTemplatesRequest,
    GeneratedTemplate, SelectedTemplate,
};
use crate::connectivity::{ConnectivityProbe, HealthCheck};
use crate::error::ApiError;
use crate::steps::general::GeneralSettings;
use crate::wizard::step::StepKind;

/// Health check with a switchable answer.
pub(crate) struct FakeHealth {
    up: AtomicBool,
    calls: AtomicU32,
    delay: Option<Duration>,
}

impl FakeHealth {
    pub(crate) fn up() -> Self {
        Self {
            up: AtomicBool::new(true),
            calls: AtomicU32::new(0),
            delay: None,
        }
    }

    pub(crate) fn down() -> Self {
        let health = Self::up();
        health.set_up(false);
        health
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub(crate) fn set_up(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HealthCheck for FakeHealth {
    async fn health_check(&self) -> Result<(), ApiError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.up.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::Network {
                operation: "health_check".into(),
                reason: "connection refused".into(),
            })
        }
    }
}

pub(crate) fn probe_with(health: FakeHealth) -> ConnectivityProbe {
    ConnectivityProbe::new(
        Arc::new(health),
        Duration::from_secs(1),
        Duration::from_secs(1),
    )
}

/// In-memory campaign backend. Operation responses are queued per call;
/// an empty queue yields a plausible default.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    pub(crate) healthy: AtomicBool,
    pub(crate) create: Mutex<VecDeque<Result<CampaignId, ApiError>>>,
    pub(crate) clone: Mutex<VecDeque<Result<ClonedPage, ApiError>>>,
    pub(crate) select: Mutex<VecDeque<Result<SelectedTemplate, ApiError>>>,
    pub(crate) dns: Mutex<VecDeque<Result<DnsValidation, ApiError>>>,
    pub(crate) generate: Mutex<VecDeque<Result<Vec<GeneratedTemplate>, ApiError>>>,
    pub(crate) validate_landing: Mutex<VecDeque<Result<Option<String>, ApiError>>>,
    pub(crate) save_failures: Mutex<VecDeque<ApiError>>,
    pub(crate) stored: Mutex<HashMap<StepKind, serde_json::Value>>,
    pub(crate) saves: Mutex<Vec<(StepKind, serde_json::Value)>>,
    pub(crate) creates: AtomicU32,
    pub(crate) clone_requests: Mutex<Vec<String>>,
}

impl ScriptedApi {
    pub(crate) fn new() -> Arc<Self> {
        let api = Self::default();
        api.healthy.store(true, Ordering::SeqCst);
        Arc::new(api)
    }
}

#[async_trait]
impl CampaignApi for ScriptedApi {
    async fn health_check(&self) -> Result<(), ApiError> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::Network {
                operation: "health_check".into(),
                reason: "connection refused".into(),
            })
        }
    }

    async fn create_campaign(&self, _settings: &GeneralSettings) -> Result<CampaignId, ApiError> {
        let n = self.creates.fetch_add(1, Ordering::SeqCst) + 1;
        self.create
            .lock()
            .await
            .pop_front()
            .unwrap_or_else(|| Ok(CampaignId::new(format!("cmp-{n}"))))
    }

    async fn save_step(
        &self,
        _campaign_id: &CampaignId,
        step: StepKind,
        payload: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        if let Some(err) = self.save_failures.lock().await.pop_front() {
            return Err(err);
        }
        self.saves.lock().await.push((step, payload.clone()));
        self.stored.lock().await.insert(step, payload.clone());
        Ok(None)
    }

    async fn get_step(
        &self,
        _campaign_id: &CampaignId,
        step: StepKind,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        Ok(self.stored.lock().await.get(&step).cloned())
    }

    async fn clone_url(&self, _campaign_id: &CampaignId, url: &str) -> Result<ClonedPage, ApiError> {
        self.clone_requests.lock().await.push(url.to_string());
        self.clone.lock().await.pop_front().unwrap_or_else(|| {
            Ok(ClonedPage {
                preview_url: format!("https://preview.local/clone?src={url}"),
            })
        })
    }

    async fn select_template(
        &self,
        _campaign_id: &CampaignId,
        template_id: &str,
    ) -> Result<SelectedTemplate, ApiError> {
        self.select.lock().await.pop_front().unwrap_or_else(|| {
            Ok(SelectedTemplate {
                preview_url: Some(format!("https://preview.local/template/{template_id}")),
            })
        })
    }

    async fn validate_landing_step(
        &self,
        _campaign_id: &CampaignId,
    ) -> Result<Option<String>, ApiError> {
        self.validate_landing
            .lock()
            .await
            .pop_front()
            .unwrap_or(Ok(None))
    }

    async fn configure_dns(
        &self,
        _campaign_id: &CampaignId,
        _request: &DnsRequest,
    ) -> Result<DnsValidation, ApiError> {
        self.dns.lock().await.pop_front().unwrap_or_else(|| {
            Ok(DnsValidation {
                spf: crate::api::DnsRecordStatus::Valid,
                dkim: crate::api::DnsRecordStatus::Valid,
                dmarc: crate::api::DnsRecordStatus::Valid,
                validation_complete: true,
            })
        })
    }

    async fn generate_templates(
        &self,
        _campaign_id: &CampaignId,
        request: &GenerateTemplatesRequest,
    ) -> Result<Vec<GeneratedTemplate>, ApiError> {
        self.generate.lock().await.pop_front().unwrap_or_else(|| {
            Ok((1..=request.count)
                .map(|i| GeneratedTemplate {
                    id: format!("tpl-{i}"),
                    name: format!("{} #{i}", request.topic),
                    subject: None,
                    preview_url: None,
                })
                .collect())
        })
    }
}
