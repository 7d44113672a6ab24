//! Step state store: backend persistence and hydration of step payloads.

use std::sync::Arc;

use futures::future::join_all;
use tracing::{debug, info};

use crate::api::{CampaignApi, CampaignId};
use crate::error::SessionError;
use crate::steps::{GeneralSettings, StepPayload};

use super::step::StepKind;

/// Saves and loads step payloads through the campaign backend.
#[derive(Clone)]
pub struct StepStore {
    api: Arc<dyn CampaignApi>,
}

impl StepStore {
    pub fn new(api: Arc<dyn CampaignApi>) -> Self {
        Self { api }
    }

    pub fn api(&self) -> &Arc<dyn CampaignApi> {
        &self.api
    }

    pub async fn create_campaign(
        &self,
        settings: &GeneralSettings,
    ) -> Result<CampaignId, SessionError> {
        let id = self.api.create_campaign(settings).await?;
        info!(campaign_id = %id, name = %settings.name.trim(), "Campaign created");
        Ok(id)
    }

    pub async fn save(
        &self,
        campaign_id: &CampaignId,
        payload: &StepPayload,
    ) -> Result<(), SessionError> {
        let step = payload.kind();
        let body = payload
            .to_json()
            .map_err(|e| SessionError::Serialization(e.to_string()))?;
        self.api.save_step(campaign_id, step, &body).await?;
        debug!(%campaign_id, %step, "Step saved");
        Ok(())
    }

    /// Fetch one step. `Ok(None)` when the backend has nothing stored yet.
    pub async fn load(
        &self,
        campaign_id: &CampaignId,
        step: StepKind,
    ) -> Result<Option<StepPayload>, SessionError> {
        let Some(value) = self.api.get_step(campaign_id, step).await? else {
            return Ok(None);
        };
        if value.is_null() {
            return Ok(None);
        }
        StepPayload::from_json(step, value)
            .map(Some)
            .map_err(|e| SessionError::Serialization(format!("{step}: {e}")))
    }

    /// Fetch several steps concurrently. Each step keeps its own result so
    /// one failure does not hide the others.
    pub async fn load_all(
        &self,
        campaign_id: &CampaignId,
        steps: &[StepKind],
    ) -> Vec<(StepKind, Result<Option<StepPayload>, SessionError>)> {
        let fetches = steps.iter().map(|step| async move {
            (*step, self.load(campaign_id, *step).await)
        });
        join_all(fetches).await
    }

    /// Server-side landing page check. A refusal comes back as
    /// `StepNotReady` with the backend's message.
    pub async fn validate_landing(&self, campaign_id: &CampaignId) -> Result<(), SessionError> {
        match self.api.validate_landing_step(campaign_id).await {
            Ok(message) => {
                if let Some(message) = message {
                    debug!(%campaign_id, %message, "Landing page validated");
                }
                Ok(())
            }
            Err(crate::error::ApiError::Rejected { message, .. }) => {
                Err(SessionError::StepNotReady {
                    step: StepKind::LandingPage,
                    reason: message,
                })
            }
            Err(e) => Err(e.into()),
        }
    }
}
