//! The campaign draft: one record per step plus the campaign id.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::api::CampaignId;
use crate::steps::StepPayload;

use super::gate::{GateContext, GateFailure, StepGate};
use super::step::StepKind;

/// Progress of one step, derived from its payload and gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    NotStarted,
    InProgress,
    Complete,
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::NotStarted => "not_started",
            Self::InProgress => "in_progress",
            Self::Complete => "complete",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    step: StepKind,
    status: StepStatus,
    payload: Option<StepPayload>,
    /// Whether the payload was accepted through an advance.
    #[serde(default)]
    submitted: bool,
}

impl StepRecord {
    fn new(step: StepKind) -> Self {
        Self {
            step,
            status: StepStatus::NotStarted,
            payload: None,
            submitted: false,
        }
    }

    pub fn step(&self) -> StepKind {
        self.step
    }

    pub fn status(&self) -> StepStatus {
        self.status
    }

    pub fn payload(&self) -> Option<&StepPayload> {
        self.payload.as_ref()
    }

    pub fn is_submitted(&self) -> bool {
        self.submitted
    }

    fn derive_status(&mut self, ctx: &GateContext) {
        self.status = match &self.payload {
            None => StepStatus::NotStarted,
            Some(payload) if self.submitted && payload.check(ctx).is_ok() => StepStatus::Complete,
            Some(_) => StepStatus::InProgress,
        };
    }
}

/// The in-progress campaign as the wizard knows it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampaignDraft {
    campaign_id: Option<CampaignId>,
    steps: Vec<StepRecord>,
}

impl Default for CampaignDraft {
    fn default() -> Self {
        Self::new()
    }
}

impl CampaignDraft {
    pub fn new() -> Self {
        Self {
            campaign_id: None,
            steps: StepKind::ALL.iter().map(|s| StepRecord::new(*s)).collect(),
        }
    }

    pub fn campaign_id(&self) -> Option<&CampaignId> {
        self.campaign_id.as_ref()
    }

    pub fn records(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn record(&self, step: StepKind) -> &StepRecord {
        &self.steps[step.index()]
    }

    pub fn payload(&self, step: StepKind) -> Option<&StepPayload> {
        self.record(step).payload()
    }

    pub fn status(&self, step: StepKind) -> StepStatus {
        self.record(step).status
    }

    /// Set the campaign id. Once set it never changes: a different id is
    /// ignored and `false` returned.
    pub fn assign_campaign_id(&mut self, id: CampaignId) -> bool {
        match &self.campaign_id {
            None => {
                self.campaign_id = Some(id);
                true
            }
            Some(existing) if *existing == id => false,
            Some(existing) => {
                warn!(
                    campaign_id = %existing,
                    ignored = %id,
                    "Campaign id already assigned, ignoring a different one"
                );
                false
            }
        }
    }

    /// Keep an edit that has not been submitted. The step drops back to
    /// in progress until it is advanced again.
    pub fn record_draft(&mut self, payload: StepPayload, ctx: &GateContext) {
        let record = &mut self.steps[payload.kind().index()];
        record.payload = Some(payload);
        record.submitted = false;
        record.derive_status(ctx);
    }

    /// Accept a payload as the step's submitted value. Nothing changes when
    /// the gate fails.
    pub fn complete(&mut self, payload: StepPayload, ctx: &GateContext) -> Result<(), GateFailure> {
        if let Some(failure) = payload.check(ctx).failure() {
            return Err(failure.clone());
        }
        let record = &mut self.steps[payload.kind().index()];
        record.payload = Some(payload);
        record.submitted = true;
        record.derive_status(ctx);
        Ok(())
    }

    /// Replace a step's payload with the server's copy, keeping whether it
    /// had been submitted.
    pub fn restore(&mut self, payload: StepPayload, ctx: &GateContext) {
        let record = &mut self.steps[payload.kind().index()];
        record.payload = Some(payload);
        record.derive_status(ctx);
    }

    /// Re-derive every status. Time-dependent gates (launch date) can turn a
    /// complete step back to in progress.
    pub fn refresh(&mut self, ctx: &GateContext) {
        for record in &mut self.steps {
            record.derive_status(ctx);
        }
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|r| r.status == StepStatus::Complete)
            .count()
    }

    /// One record per step, in order, each holding its own step's payload.
    pub(crate) fn is_well_formed(&self) -> bool {
        self.steps.len() == StepKind::ALL.len()
            && self.steps.iter().zip(StepKind::ALL).all(|(record, step)| {
                record.step == step && record.payload.as_ref().is_none_or(|p| p.kind() == step)
            })
    }
}
