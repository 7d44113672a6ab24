//! Landing page step: clone an external site or pick a stock template.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::{CampaignApi, CampaignId, ClonedPage, SelectedTemplate};
use crate::config::OperationPolicy;
use crate::connectivity::ConnectivityProbe;
use crate::error::{ApiError, ErrorKind, OperationError};
use crate::operation::{OperationKind, OperationSlot, OperationState, RemoteCall, RunOutcome};
use crate::wizard::gate::{GateContext, GateResult, StepGate};

use super::{ScopedRequest, StepPayload};

/// Which way the landing page is being built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LandingTab {
    #[default]
    Clone,
    Template,
}

/// Payload of the landing page step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandingPage {
    pub active_tab: LandingTab,
    #[serde(default)]
    pub clone_url: Option<String>,
    pub clone_status: OperationState,
    #[serde(default)]
    pub cloned_preview_url: Option<String>,
    #[serde(default)]
    pub template_id: Option<String>,
    #[serde(default)]
    pub template_preview_url: Option<String>,
}

fn non_empty(s: &Option<String>) -> bool {
    s.as_deref().is_some_and(|s| !s.trim().is_empty())
}

impl StepGate for LandingPage {
    fn check(&self, _ctx: &GateContext) -> GateResult {
        // Only the active tab's data counts.
        match self.active_tab {
            LandingTab::Clone => {
                if self.clone_status != OperationState::Success {
                    return GateResult::fail("cloneUrl", "Clone the site before continuing");
                }
                if !non_empty(&self.cloned_preview_url) {
                    return GateResult::fail("cloneUrl", "Clone finished without a preview");
                }
                GateResult::Pass
            }
            LandingTab::Template => {
                if !non_empty(&self.template_id) {
                    return GateResult::fail("templateId", "Select a landing page template");
                }
                if !non_empty(&self.template_preview_url) {
                    return GateResult::fail("templateId", "Selected template has no preview yet");
                }
                GateResult::Pass
            }
        }
    }
}

/// Whether `url` can be sent to the clone service.
pub fn is_cloneable_url(url: &str) -> bool {
    reqwest::Url::parse(url.trim()).is_ok_and(|u| {
        matches!(u.scheme(), "http" | "https") && u.host_str().is_some_and(|h| !h.is_empty())
    })
}

/// `clone URL` as a supervised call. No client timeout.
pub struct CloneCall {
    api: Arc<dyn CampaignApi>,
}

#[async_trait]
impl RemoteCall for CloneCall {
    type Request = ScopedRequest<String>;
    type Output = ClonedPage;

    fn kind(&self) -> OperationKind {
        OperationKind::Clone
    }

    async fn call(&self, request: &Self::Request) -> Result<ClonedPage, ApiError> {
        self.api.clone_url(&request.campaign_id, &request.input).await
    }
}

/// `select template` as a supervised call.
pub struct SelectTemplateCall {
    api: Arc<dyn CampaignApi>,
}

#[async_trait]
impl RemoteCall for SelectTemplateCall {
    type Request = ScopedRequest<String>;
    type Output = SelectedTemplate;

    fn kind(&self) -> OperationKind {
        OperationKind::TemplateSelect
    }

    async fn call(&self, request: &Self::Request) -> Result<SelectedTemplate, ApiError> {
        self.api
            .select_template(&request.campaign_id, &request.input)
            .await
    }
}

/// Controller for the landing page step.
pub struct LandingPageStep {
    tab: LandingTab,
    clone_url: String,
    template_id: Option<String>,
    clone: OperationSlot<CloneCall>,
    template: OperationSlot<SelectTemplateCall>,
}

impl LandingPageStep {
    pub fn new(api: Arc<dyn CampaignApi>, probe: ConnectivityProbe, policy: OperationPolicy) -> Self {
        Self {
            tab: LandingTab::default(),
            clone_url: String::new(),
            template_id: None,
            clone: OperationSlot::new(
                CloneCall {
                    api: Arc::clone(&api),
                },
                probe.clone(),
                policy.clone(),
            ),
            template: OperationSlot::new(SelectTemplateCall { api }, probe, policy),
        }
    }

    pub fn tab(&self) -> LandingTab {
        self.tab
    }

    pub fn clone_url(&self) -> &str {
        &self.clone_url
    }

    pub fn template_id(&self) -> Option<&str> {
        self.template_id.as_deref()
    }

    pub fn clone_operation(&self) -> &OperationSlot<CloneCall> {
        &self.clone
    }

    pub fn template_operation(&self) -> &OperationSlot<SelectTemplateCall> {
        &self.template
    }

    /// Switch tabs. The operation behind the tab being left goes back to
    /// idle; a response still in flight for it will be ignored.
    pub fn set_tab(&mut self, tab: LandingTab) {
        if self.tab == tab {
            return;
        }
        match self.tab {
            LandingTab::Clone => self.clone.reset(),
            LandingTab::Template => self.template.reset(),
        }
        debug!(from = ?self.tab, to = ?tab, "Landing page tab switched");
        self.tab = tab;
    }

    /// Edit the URL to clone. A different URL invalidates any prior clone.
    pub fn set_clone_url(&mut self, url: &str) {
        let url = url.trim();
        if self.clone_url == url {
            return;
        }
        self.clone_url = url.to_string();
        self.clone.reset();
    }

    /// Whether the clone action should be enabled.
    pub fn can_clone(&self) -> bool {
        self.tab == LandingTab::Clone
            && is_cloneable_url(&self.clone_url)
            && self.clone.snapshot().state != OperationState::Running
    }

    pub async fn clone_site(&mut self, campaign_id: CampaignId) -> RunOutcome<ClonedPage> {
        if !is_cloneable_url(&self.clone_url) {
            return RunOutcome::Failed(OperationError::new(
                ErrorKind::Validation,
                "Enter a valid http(s) URL to clone",
            ));
        }
        self.set_tab(LandingTab::Clone);
        self.clone
            .start(ScopedRequest::new(campaign_id, self.clone_url.clone()))
            .await
    }

    /// Apply a stock template. Choosing a different template invalidates the
    /// previous preview.
    pub async fn choose_template(
        &mut self,
        campaign_id: CampaignId,
        template_id: &str,
    ) -> RunOutcome<SelectedTemplate> {
        let template_id = template_id.trim();
        if template_id.is_empty() {
            return RunOutcome::Failed(OperationError::new(
                ErrorKind::Validation,
                "Select a landing page template",
            ));
        }
        self.set_tab(LandingTab::Template);
        if self.template_id.as_deref() != Some(template_id) {
            self.template_id = Some(template_id.to_string());
            self.template.reset();
        }
        self.template
            .start(ScopedRequest::new(campaign_id, template_id.to_string()))
            .await
    }

    /// Preview for whichever tab is active.
    pub fn preview_url(&self) -> Option<String> {
        match self.tab {
            LandingTab::Clone => self.clone.result().map(|c| c.preview_url),
            LandingTab::Template => self.template.result().and_then(|t| t.preview_url),
        }
    }

    pub fn landing_page(&self) -> LandingPage {
        let clone = self.clone.snapshot();
        LandingPage {
            active_tab: self.tab,
            clone_url: (!self.clone_url.is_empty()).then(|| self.clone_url.clone()),
            clone_status: clone.state,
            cloned_preview_url: clone.result.map(|c| c.preview_url),
            template_id: self.template_id.clone(),
            template_preview_url: self.template.result().and_then(|t| t.preview_url),
        }
    }

    pub fn payload(&self) -> StepPayload {
        StepPayload::LandingPage(self.landing_page())
    }

    /// Restore from a saved payload, including finished operation results.
    pub fn hydrate(&mut self, page: &LandingPage) {
        self.tab = page.active_tab;
        self.clone_url = page.clone_url.clone().unwrap_or_default();
        self.template_id = page.template_id.clone();

        match (&page.clone_status, &page.cloned_preview_url) {
            (OperationState::Success, Some(preview_url)) => self.clone.restore_success(ClonedPage {
                preview_url: preview_url.clone(),
            }),
            _ => self.clone.reset(),
        }
        match &page.template_preview_url {
            Some(preview_url) if page.template_id.is_some() => {
                self.template.restore_success(SelectedTemplate {
                    preview_url: Some(preview_url.clone()),
                })
            }
            _ => self.template.reset(),
        }
    }
}
