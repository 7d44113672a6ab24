//! Templates step: AI-generated email/news templates and the user's pick.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize, Serializer};
use tracing::info;

use crate::api::{CampaignApi, CampaignId, GenerateTemplatesRequest, GeneratedTemplate};
use crate::config::OperationPolicy;
use crate::connectivity::ConnectivityProbe;
use crate::error::{ApiError, RetryError};
use crate::operation::{OperationKind, OperationSlot, RemoteCall, RunOutcome};
use crate::wizard::gate::{GateContext, GateResult, StepGate};

use super::{ScopedRequest, StepPayload};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemplateType {
    #[default]
    Email,
    News,
}

impl std::fmt::Display for TemplateType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email => write!(f, "email"),
            Self::News => write!(f, "news"),
        }
    }
}

/// Payload of the templates step.
///
/// The UI keeps an ordered multi-selection, but the backend stores a single
/// template: the first selected id is sent as `primaryTemplateId`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSelection {
    #[serde(default)]
    pub template_type: TemplateType,
    #[serde(default)]
    available: Vec<GeneratedTemplate>,
    #[serde(default)]
    selected: Vec<String>,
}

impl Serialize for TemplateSelection {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Wire<'a> {
            template_type: TemplateType,
            available: &'a [GeneratedTemplate],
            selected: &'a [String],
            primary_template_id: Option<&'a str>,
        }
        Wire {
            template_type: self.template_type,
            available: &self.available,
            selected: &self.selected,
            primary_template_id: self.primary(),
        }
        .serialize(serializer)
    }
}

impl TemplateSelection {
    pub fn available(&self) -> &[GeneratedTemplate] {
        &self.available
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    /// The template the backend will actually use.
    pub fn primary(&self) -> Option<&str> {
        self.selected.first().map(String::as_str)
    }

    /// Add to the selection. Returns false for blank or already-selected ids.
    pub fn select(&mut self, template_id: &str) -> bool {
        let id = template_id.trim();
        if id.is_empty() || self.selected.iter().any(|s| s == id) {
            return false;
        }
        self.selected.push(id.to_string());
        true
    }

    pub fn deselect(&mut self, template_id: &str) -> bool {
        let before = self.selected.len();
        self.selected.retain(|s| s != template_id);
        self.selected.len() != before
    }

    /// Flip selection. Returns whether the id is now selected.
    pub fn toggle(&mut self, template_id: &str) -> bool {
        if self.deselect(template_id) {
            false
        } else {
            self.select(template_id)
        }
    }

    fn merge_available(&mut self, templates: Vec<GeneratedTemplate>) {
        for template in templates {
            match self.available.iter_mut().find(|t| t.id == template.id) {
                Some(existing) => *existing = template,
                None => self.available.push(template),
            }
        }
    }
}

impl StepGate for TemplateSelection {
    fn check(&self, _ctx: &GateContext) -> GateResult {
        if self.primary().is_none() {
            return GateResult::fail("selectedTemplates", "Select at least one template");
        }
        GateResult::Pass
    }
}

/// `generate templates` as a supervised call.
pub struct GenerateTemplatesCall {
    api: Arc<dyn CampaignApi>,
}

#[async_trait]
impl RemoteCall for GenerateTemplatesCall {
    type Request = ScopedRequest<GenerateTemplatesRequest>;
    type Output = Vec<GeneratedTemplate>;

    fn kind(&self) -> OperationKind {
        OperationKind::AiGenerate
    }

    async fn call(&self, request: &Self::Request) -> Result<Self::Output, ApiError> {
        self.api
            .generate_templates(&request.campaign_id, &request.input)
            .await
    }
}

/// Controller for the templates step.
pub struct TemplatesStep {
    selection: TemplateSelection,
    generate: OperationSlot<GenerateTemplatesCall>,
}

impl TemplatesStep {
    pub fn new(api: Arc<dyn CampaignApi>, probe: ConnectivityProbe, policy: OperationPolicy) -> Self {
        Self {
            selection: TemplateSelection::default(),
            generate: OperationSlot::new(GenerateTemplatesCall { api }, probe, policy),
        }
    }

    /// Restore from a saved payload.
    pub fn hydrate(&mut self, selection: TemplateSelection) {
        self.generate.reset();
        self.selection = selection;
    }

    pub fn selection(&self) -> &TemplateSelection {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut TemplateSelection {
        &mut self.selection
    }

    pub fn generation(&self) -> &OperationSlot<GenerateTemplatesCall> {
        &self.generate
    }

    /// Switching between email and news templates invalidates whatever was
    /// generated for the other type.
    pub fn set_template_type(&mut self, template_type: TemplateType) {
        if self.selection.template_type == template_type {
            return;
        }
        self.generate.reset();
        self.selection = TemplateSelection {
            template_type,
            ..TemplateSelection::default()
        };
    }

    /// Ask the AI service for templates of the current type.
    pub async fn generate(
        &mut self,
        campaign_id: CampaignId,
        topic: &str,
        count: u32,
        language: Option<String>,
    ) -> RunOutcome<Vec<GeneratedTemplate>> {
        let request = GenerateTemplatesRequest {
            template_type: self.selection.template_type.to_string(),
            topic: topic.trim().to_string(),
            count,
            language,
        };
        let outcome = self
            .generate
            .start(ScopedRequest::new(campaign_id, request))
            .await;
        self.absorb(&outcome);
        outcome
    }

    pub async fn retry_generate(&mut self) -> Result<RunOutcome<Vec<GeneratedTemplate>>, RetryError> {
        let outcome = self.generate.retry().await?;
        self.absorb(&outcome);
        Ok(outcome)
    }

    pub fn payload(&self) -> StepPayload {
        StepPayload::Templates(self.selection.clone())
    }

    /// Offer generated templates for selection. Ids already offered are
    /// replaced, so a result may be added more than once.
    pub fn add_generated(&mut self, templates: Vec<GeneratedTemplate>) {
        info!(count = templates.len(), "Templates generated");
        self.selection.merge_available(templates);
    }

    fn absorb(&mut self, outcome: &RunOutcome<Vec<GeneratedTemplate>>) {
        if let RunOutcome::Succeeded(templates) = outcome {
            self.add_generated(templates.clone());
        }
    }
}
