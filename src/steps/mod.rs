//! Per-step payloads, gates and controllers.
//!
//! Each step owns its payload and the operation slots it triggers. The
//! sequencer only ever sees the finished [`StepPayload`].

pub mod general;
pub mod landing;
pub mod smtp;
pub mod targets;
pub mod templates;
pub mod training;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::api::CampaignId;
use crate::wizard::gate::{GateContext, GateResult, StepGate};
use crate::wizard::step::StepKind;

pub use general::GeneralSettings;
pub use landing::{LandingPage, LandingPageStep, LandingTab};
pub use smtp::{SmtpDnsStep, SmtpSettings};
pub use targets::{ImportReport, RowRejection, Target, TargetList};
pub use templates::{TemplateSelection, TemplateType, TemplatesStep};
pub use training::TrainingSettings;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9\-]*[A-Za-z0-9])?)+$",
    )
    .unwrap()
});

/// Whether `s` has the shape of an email address.
pub fn is_email_shaped(s: &str) -> bool {
    EMAIL_RE.is_match(s.trim())
}

/// Request scoped to one campaign, as every supervised call is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopedRequest<T> {
    pub campaign_id: CampaignId,
    pub input: T,
}

impl<T> ScopedRequest<T> {
    pub fn new(campaign_id: CampaignId, input: T) -> Self {
        Self { campaign_id, input }
    }
}

/// A step's finished payload, as handed to the sequencer and saved to the
/// backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", content = "data", rename_all = "snake_case")]
pub enum StepPayload {
    General(GeneralSettings),
    Targets(TargetList),
    Templates(TemplateSelection),
    LandingPage(LandingPage),
    SmtpDns(SmtpSettings),
    Training(TrainingSettings),
}

impl StepPayload {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::General(_) => StepKind::General,
            Self::Targets(_) => StepKind::Targets,
            Self::Templates(_) => StepKind::Templates,
            Self::LandingPage(_) => StepKind::LandingPage,
            Self::SmtpDns(_) => StepKind::SmtpDns,
            Self::Training(_) => StepKind::Training,
        }
    }

    /// Body sent to the step's save endpoint.
    pub fn to_json(&self) -> Result<serde_json::Value, serde_json::Error> {
        match self {
            Self::General(p) => serde_json::to_value(p),
            Self::Targets(p) => serde_json::to_value(p),
            Self::Templates(p) => serde_json::to_value(p),
            Self::LandingPage(p) => serde_json::to_value(p),
            Self::SmtpDns(p) => serde_json::to_value(p),
            Self::Training(p) => serde_json::to_value(p),
        }
    }

    /// Parse a body returned by the step's get endpoint.
    pub fn from_json(step: StepKind, value: serde_json::Value) -> Result<Self, serde_json::Error> {
        Ok(match step {
            StepKind::General => Self::General(serde_json::from_value(value)?),
            StepKind::Targets => Self::Targets(serde_json::from_value(value)?),
            StepKind::Templates => Self::Templates(serde_json::from_value(value)?),
            StepKind::LandingPage => Self::LandingPage(serde_json::from_value(value)?),
            StepKind::SmtpDns => Self::SmtpDns(serde_json::from_value(value)?),
            StepKind::Training => Self::Training(serde_json::from_value(value)?),
        })
    }
}

impl StepGate for StepPayload {
    fn check(&self, ctx: &GateContext) -> GateResult {
        match self {
            Self::General(p) => p.check(ctx),
            Self::Targets(p) => p.check(ctx),
            Self::Templates(p) => p.check(ctx),
            Self::LandingPage(p) => p.check(ctx),
            Self::SmtpDns(p) => p.check(ctx),
            Self::Training(p) => p.check(ctx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_shapes() {
        assert!(is_email_shaped("a@b.com"));
        assert!(is_email_shaped("ops@x.com"));
        assert!(is_email_shaped("first.last+tag@mail.example.co.uk"));
        assert!(is_email_shaped("  padded@example.com "));
        assert!(!is_email_shaped("not-an-email"));
        assert!(!is_email_shaped("a@b"));
        assert!(!is_email_shaped("@b.com"));
        assert!(!is_email_shaped("a@-b.com"));
        assert!(!is_email_shaped("a b@c.com"));
        assert!(!is_email_shaped(""));
    }

    #[test]
    fn payload_json_matches_its_step() {
        let payload = StepPayload::Training(TrainingSettings::disabled());
        let json = payload.to_json().unwrap();
        let parsed = StepPayload::from_json(StepKind::Training, json).unwrap();
        assert_eq!(parsed, payload);
        assert_eq!(parsed.kind(), StepKind::Training);
    }

    #[test]
    fn wrong_shape_for_step_is_an_error() {
        let json = serde_json::json!({"fromEmail": 42});
        assert!(StepPayload::from_json(StepKind::SmtpDns, json).is_err());
    }
}
