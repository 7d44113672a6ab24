//! Campaign backend collaborator.
//!
//! The wizard never talks HTTP directly; steps, the probe and the supervisor
//! go through [`CampaignApi`] so tests can swap in a scripted backend.

pub mod http;
pub mod types;

pub use http::HttpCampaignApi;
pub use types::*;

use async_trait::async_trait;

use crate::error::ApiError;
use crate::steps::general::GeneralSettings;
use crate::wizard::step::StepKind;

/// Operations the wizard consumes from the campaign backend.
#[async_trait]
pub trait CampaignApi: Send + Sync {
    /// Lightweight liveness check. Any 2xx counts as healthy.
    async fn health_check(&self) -> Result<(), ApiError>;

    /// Create the campaign record from the general settings step.
    async fn create_campaign(&self, settings: &GeneralSettings) -> Result<CampaignId, ApiError>;

    /// Persist one step's payload. Idempotent per step.
    async fn save_step(
        &self,
        campaign_id: &CampaignId,
        step: StepKind,
        payload: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, ApiError>;

    /// Fetch a step's stored payload for hydration.
    async fn get_step(
        &self,
        campaign_id: &CampaignId,
        step: StepKind,
    ) -> Result<Option<serde_json::Value>, ApiError>;

    async fn clone_url(&self, campaign_id: &CampaignId, url: &str) -> Result<ClonedPage, ApiError>;

    async fn select_template(
        &self,
        campaign_id: &CampaignId,
        template_id: &str,
    ) -> Result<SelectedTemplate, ApiError>;

    /// Server-side check that the landing page step is usable. Returns the
    /// backend's message, if any.
    async fn validate_landing_step(&self, campaign_id: &CampaignId)
    -> Result<Option<String>, ApiError>;

    async fn configure_dns(
        &self,
        campaign_id: &CampaignId,
        request: &DnsRequest,
    ) -> Result<DnsValidation, ApiError>;

    async fn generate_templates(
        &self,
        campaign_id: &CampaignId,
        request: &GenerateTemplatesRequest,
    ) -> Result<Vec<GeneratedTemplate>, ApiError>;
}
