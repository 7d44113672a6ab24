//! Wizard sequencer: which step is current and when the user may move on.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::CampaignId;
use crate::error::AdvanceError;
use crate::steps::StepPayload;

use super::draft::CampaignDraft;
use super::gate::{GateContext, GateResult, StepGate};
use super::step::StepKind;

/// Owns the draft and the current step index.
///
/// The index runs from 0 (general settings) to `StepKind::ALL.len()`, which
/// means every step has been submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WizardSequencer {
    session_id: Uuid,
    draft: CampaignDraft,
    current: usize,
}

impl WizardSequencer {
    /// Fresh wizard on step 0 with an empty draft.
    pub fn start() -> Self {
        let sequencer = Self {
            session_id: Uuid::new_v4(),
            draft: CampaignDraft::new(),
            current: 0,
        };
        info!(session_id = %sequencer.session_id, "Wizard started");
        sequencer
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// The step on screen, or `None` once finished.
    pub fn current_step(&self) -> Option<StepKind> {
        StepKind::from_index(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn is_finished(&self) -> bool {
        self.current >= StepKind::ALL.len()
    }

    pub fn draft(&self) -> &CampaignDraft {
        &self.draft
    }

    pub fn campaign_id(&self) -> Option<&CampaignId> {
        self.draft.campaign_id()
    }

    /// Gate verdict for a payload, for enabling the "Next" action.
    pub fn evaluate(&self, payload: &StepPayload, ctx: &GateContext) -> GateResult {
        payload.check(ctx)
    }

    /// Keep an unsubmitted edit in the draft.
    pub fn update_draft(&mut self, payload: StepPayload, ctx: &GateContext) {
        self.draft.record_draft(payload, ctx);
    }

    /// Checks that do not depend on the backend: not finished, right step,
    /// gate passes.
    pub fn check_submission(
        &self,
        payload: &StepPayload,
        ctx: &GateContext,
    ) -> Result<StepKind, AdvanceError> {
        let expected = self.current_step().ok_or(AdvanceError::Finished)?;
        let got = payload.kind();
        if got != expected {
            return Err(AdvanceError::StepMismatch { expected, got });
        }
        if let GateResult::Fail(failure) = payload.check(ctx) {
            return Err(AdvanceError::Gate {
                step: expected,
                failure,
            });
        }
        Ok(expected)
    }

    /// Submit the current step's payload and move on.
    ///
    /// `created_campaign_id` is the id returned by create campaign when
    /// submitting step 0. Returns the new current step (`None` when the
    /// wizard is finished). A rejection leaves the sequencer untouched.
    pub fn advance(
        &mut self,
        payload: StepPayload,
        created_campaign_id: Option<CampaignId>,
    ) -> Result<Option<StepKind>, AdvanceError> {
        self.advance_at(payload, created_campaign_id, &GateContext::now())
    }

    pub fn advance_at(
        &mut self,
        payload: StepPayload,
        created_campaign_id: Option<CampaignId>,
        ctx: &GateContext,
    ) -> Result<Option<StepKind>, AdvanceError> {
        let step = self.check_submission(&payload, ctx)?;

        if step.is_first() {
            match created_campaign_id {
                Some(id) => {
                    self.draft.assign_campaign_id(id);
                }
                None if self.draft.campaign_id().is_some() => {}
                None => return Err(AdvanceError::MissingCampaignId { step }),
            }
        } else if self.draft.campaign_id().is_none() {
            return Err(AdvanceError::MissingCampaignId { step });
        }

        self.draft
            .complete(payload, ctx)
            .map_err(|failure| AdvanceError::Gate { step, failure })?;
        self.current += 1;

        let next = self.current_step();
        match next {
            Some(next) => debug!(from = %step, to = %next, "Wizard advanced"),
            None => info!(
                session_id = %self.session_id,
                campaign_id = ?self.draft.campaign_id().map(CampaignId::as_str),
                "Wizard finished"
            ),
        }
        Ok(next)
    }

    /// Go back one step. Payloads are kept. Returns the new current step, or
    /// `None` when already on the first step.
    pub fn retreat(&mut self) -> Option<StepKind> {
        if self.current == 0 {
            return None;
        }
        self.current -= 1;
        let step = self.current_step();
        debug!(to = ?step, "Wizard moved back");
        step
    }

    /// Re-derive step statuses against `ctx`.
    pub fn refresh(&mut self, ctx: &GateContext) {
        self.draft.refresh(ctx);
    }

    pub(crate) fn draft_mut(&mut self) -> &mut CampaignDraft {
        &mut self.draft
    }

    pub(crate) fn is_well_formed(&self) -> bool {
        self.current <= StepKind::ALL.len() && self.draft.is_well_formed()
    }
}
