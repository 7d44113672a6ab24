//! Headless driver: runs a campaign plan through the wizard, step by step,
//! the way a user would click through it.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{CampaignApi, CampaignId};
use crate::config::OperationPolicy;
use crate::connectivity::ConnectivityProbe;
use crate::error::{DriveError, ErrorKind, OperationError, RetryError, SessionError};
use crate::operation::{
    OperationKind, OperationSlot, OperationSnapshot, RemoteCall, RunOutcome,
};
use crate::steps::{
    GeneralSettings, ImportReport, LandingPageStep, LandingTab, SmtpDnsStep, StepPayload, Target,
    TargetList, TemplateType, TemplatesStep, TrainingSettings,
};
use crate::wizard::{GateContext, HydrationReport, StepGate, StepKind, WizardSession};

/// Everything needed to fill in the wizard without a user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPlan {
    pub general: GeneralSettings,
    #[serde(default)]
    pub targets: Vec<Target>,
    pub templates: TemplatePlan,
    pub landing_page: LandingPlan,
    pub smtp: SmtpPlan,
    #[serde(default)]
    pub training: TrainingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplatePlan {
    #[serde(default)]
    pub template_type: TemplateType,
    pub topic: String,
    #[serde(default = "default_template_count")]
    pub count: u32,
    #[serde(default)]
    pub language: Option<String>,
    /// Ids to select; the first generated template when empty.
    #[serde(default)]
    pub select: Vec<String>,
}

fn default_template_count() -> u32 {
    3
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LandingPlan {
    CloneUrl(String),
    TemplateId(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpPlan {
    pub from_email: String,
    pub from_name: String,
    #[serde(default)]
    pub domain: Option<String>,
}

/// Progress notifications for whoever is watching the run.
#[derive(Debug, Clone, PartialEq)]
pub enum DriveEvent {
    Hydrated(HydrationReport),
    StepStarted(StepKind),
    TargetsImported(ImportReport),
    OperationSucceeded {
        kind: OperationKind,
        attempt: u32,
    },
    OperationFailed {
        kind: OperationKind,
        error: OperationError,
        retry_label: Option<String>,
    },
    StepSubmitted {
        step: StepKind,
        next: Option<StepKind>,
    },
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Connectivity failures tolerated per operation before giving up.
    pub offline_retries: u32,
    /// Pause before re-probing an unreachable backend.
    pub offline_delay: Duration,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            offline_retries: 5,
            offline_delay: Duration::from_secs(2),
        }
    }
}

type Observer = Box<dyn Fn(&DriveEvent) + Send + Sync>;

pub struct WizardDriver {
    session: WizardSession,
    api: Arc<dyn CampaignApi>,
    probe: ConnectivityProbe,
    policy: OperationPolicy,
    options: DriverOptions,
    observer: Option<Observer>,
}

impl WizardDriver {
    pub fn new(
        session: WizardSession,
        api: Arc<dyn CampaignApi>,
        probe: ConnectivityProbe,
        policy: OperationPolicy,
    ) -> Self {
        Self {
            session,
            api,
            probe,
            policy,
            options: DriverOptions::default(),
            observer: None,
        }
    }

    pub fn with_options(mut self, options: DriverOptions) -> Self {
        self.options = options;
        self
    }

    pub fn on_event(mut self, observer: impl Fn(&DriveEvent) + Send + Sync + 'static) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn session(&self) -> &WizardSession {
        &self.session
    }

    pub fn into_session(self) -> WizardSession {
        self.session
    }

    /// Hydrate, then fill in and submit every remaining step.
    pub async fn run(&mut self, plan: &CampaignPlan) -> Result<(), DriveError> {
        let report = self.session.hydrate().await?;
        self.emit(DriveEvent::Hydrated(report));

        while let Some(step) = self.session.current_step() {
            self.emit(DriveEvent::StepStarted(step));
            let payload = match step {
                StepKind::General => StepPayload::General(plan.general.clone()),
                StepKind::Targets => self.prepare_targets(&plan.targets)?,
                StepKind::Templates => self.prepare_templates(&plan.templates).await?,
                StepKind::LandingPage => self.prepare_landing(&plan.landing_page).await?,
                StepKind::SmtpDns => self.prepare_smtp(&plan.smtp).await?,
                StepKind::Training => StepPayload::Training(plan.training.clone()),
            };
            let next = self.session.submit(payload).await?;
            self.emit(DriveEvent::StepSubmitted { step, next });
        }

        info!(
            campaign_id = ?self.session.campaign_id().map(CampaignId::as_str),
            "Campaign plan completed"
        );
        Ok(())
    }

    fn emit(&self, event: DriveEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }

    fn campaign_id(&self, step: StepKind) -> Result<CampaignId, DriveError> {
        self.session
            .campaign_id()
            .cloned()
            .ok_or(DriveError::Session(SessionError::NoCampaign { step }))
    }

    fn saved(&self, step: StepKind) -> Option<&StepPayload> {
        self.session.sequencer().draft().payload(step)
    }

    fn prepare_targets(&self, rows: &[Target]) -> Result<StepPayload, DriveError> {
        let mut list = TargetList::new();
        let report = list.import(rows.iter().cloned());
        for rejected in &report.rejected {
            warn!(
                row = rejected.row,
                email = %rejected.email,
                reason = %rejected.reason,
                "Target row rejected"
            );
        }
        self.emit(DriveEvent::TargetsImported(report));
        if list.is_empty() {
            return Err(DriveError::Plan {
                step: StepKind::Targets,
                reason: "no usable target rows".to_string(),
            });
        }
        Ok(StepPayload::Targets(list))
    }

    async fn prepare_templates(&self, plan: &TemplatePlan) -> Result<StepPayload, DriveError> {
        let mut step = TemplatesStep::new(
            Arc::clone(&self.api),
            self.probe.clone(),
            self.policy.clone(),
        );
        if let Some(StepPayload::Templates(saved)) = self.saved(StepKind::Templates) {
            step.hydrate(saved.clone());
        }
        step.set_template_type(plan.template_type);
        if !step.selection().selected().is_empty() {
            return Ok(step.payload());
        }

        if step.selection().available().is_empty() {
            let campaign_id = self.campaign_id(StepKind::Templates)?;
            let outcome = step
                .generate(campaign_id, &plan.topic, plan.count, plan.language.clone())
                .await;
            let templates = self.settle(step.generation(), outcome).await?;
            step.add_generated(templates);
        }

        let wanted: Vec<String> = if plan.select.is_empty() {
            step.selection()
                .available()
                .iter()
                .take(1)
                .map(|t| t.id.clone())
                .collect()
        } else {
            plan.select.clone()
        };
        for id in &wanted {
            if !step.selection().available().iter().any(|t| &t.id == id) {
                return Err(DriveError::Plan {
                    step: StepKind::Templates,
                    reason: format!("template {id} was not generated"),
                });
            }
            step.selection_mut().select(id);
        }
        Ok(step.payload())
    }

    async fn prepare_landing(&self, plan: &LandingPlan) -> Result<StepPayload, DriveError> {
        let mut step = LandingPageStep::new(
            Arc::clone(&self.api),
            self.probe.clone(),
            self.policy.clone(),
        );
        if let Some(StepPayload::LandingPage(saved)) = self.saved(StepKind::LandingPage) {
            step.hydrate(saved);
        }

        match plan {
            LandingPlan::CloneUrl(url) => {
                step.set_tab(LandingTab::Clone);
                step.set_clone_url(url);
                if step.payload().check(&GateContext::now()).is_ok() {
                    return Ok(step.payload());
                }
                let campaign_id = self.campaign_id(StepKind::LandingPage)?;
                let outcome = step.clone_site(campaign_id).await;
                self.settle(step.clone_operation(), outcome).await?;
            }
            LandingPlan::TemplateId(template_id) => {
                step.set_tab(LandingTab::Template);
                if step.template_id() == Some(template_id.trim())
                    && step.payload().check(&GateContext::now()).is_ok()
                {
                    return Ok(step.payload());
                }
                let campaign_id = self.campaign_id(StepKind::LandingPage)?;
                let outcome = step.choose_template(campaign_id, template_id).await;
                self.settle(step.template_operation(), outcome).await?;
            }
        }
        Ok(step.payload())
    }

    async fn prepare_smtp(&self, plan: &SmtpPlan) -> Result<StepPayload, DriveError> {
        let mut step = SmtpDnsStep::new(
            Arc::clone(&self.api),
            self.probe.clone(),
            self.policy.clone(),
        );
        if let Some(StepPayload::SmtpDns(saved)) = self.saved(StepKind::SmtpDns) {
            step.hydrate(saved);
        }
        step.set_from_email(&plan.from_email);
        step.set_from_name(&plan.from_name);
        step.set_domain(plan.domain.as_deref());
        if step.settings().dns.is_some() {
            return Ok(step.payload());
        }

        let campaign_id = self.campaign_id(StepKind::SmtpDns)?;
        let outcome = step.validate_dns(campaign_id).await;
        self.settle(step.dns_operation(), outcome).await?;
        Ok(step.payload())
    }

    /// Keep pressing retry on a failed run until it succeeds or the slot
    /// stops offering a retry.
    async fn settle<C: RemoteCall>(
        &self,
        slot: &OperationSlot<C>,
        mut outcome: RunOutcome<C::Output>,
    ) -> Result<C::Output, DriveError> {
        let kind = slot.kind();
        let mut offline = 0;
        loop {
            match outcome {
                RunOutcome::Succeeded(output) => {
                    let snapshot = slot.snapshot();
                    self.emit(DriveEvent::OperationSucceeded {
                        kind,
                        attempt: snapshot.attempt,
                    });
                    return Ok(output);
                }
                RunOutcome::Superseded => return Err(superseded(kind)),
                RunOutcome::Failed(error) => {
                    self.before_retry(&slot.snapshot(), error, &mut offline).await?;
                    outcome = slot
                        .retry()
                        .await
                        .map_err(|source| DriveError::Retry { kind, source })?;
                }
            }
        }
    }

    /// Report a failure and decide whether to try again. Unreachable backends
    /// are re-probed after a pause; anything else is retried only while the
    /// slot offers a retry.
    async fn before_retry<T>(
        &self,
        snapshot: &OperationSnapshot<T>,
        error: OperationError,
        offline: &mut u32,
    ) -> Result<(), DriveError> {
        let kind = snapshot.kind;
        self.emit(DriveEvent::OperationFailed {
            kind,
            error: error.clone(),
            retry_label: snapshot.retry_label(),
        });

        if error.kind == ErrorKind::Connectivity {
            *offline += 1;
            if *offline > self.options.offline_retries {
                return Err(DriveError::Offline { checks: *offline });
            }
            tokio::time::sleep(self.options.offline_delay).await;
            self.probe.invalidate().await;
        }

        if snapshot.can_retry() {
            return Ok(());
        }
        let message = snapshot.terminal_message().unwrap_or(error.message);
        Err(DriveError::Operation {
            kind,
            error: OperationError::new(error.kind, message),
        })
    }
}

fn superseded(kind: OperationKind) -> DriveError {
    DriveError::Retry {
        kind,
        source: RetryError::NothingToRetry,
    }
}
