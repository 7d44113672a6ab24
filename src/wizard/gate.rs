//! Step validation gates.
//!
//! A gate is a pure predicate over a step's payload. It never touches the
//! network, never panics and is cheap enough to re-run after every edit so
//! the "Next" action can follow it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inputs a gate may depend on besides the payload itself.
#[derive(Debug, Clone, Copy)]
pub struct GateContext {
    pub now: DateTime<Utc>,
}

impl GateContext {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }

    pub fn now() -> Self {
        Self::at(Utc::now())
    }
}

/// Why a step is not ready, tied to the field the UI should highlight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateFailure {
    pub field: String,
    pub reason: String,
}

impl std::fmt::Display for GateFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Verdict of a gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "ok")]
pub enum GateResult {
    #[serde(rename = "true")]
    Pass,
    #[serde(rename = "false")]
    Fail(GateFailure),
}

impl GateResult {
    pub fn fail(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Fail(GateFailure {
            field: field.into(),
            reason: reason.into(),
        })
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Pass)
    }

    pub fn failure(&self) -> Option<&GateFailure> {
        match self {
            Self::Pass => None,
            Self::Fail(failure) => Some(failure),
        }
    }

    /// Chain another check, keeping the first failure.
    pub fn and_then(self, next: impl FnOnce() -> GateResult) -> GateResult {
        match self {
            Self::Pass => next(),
            fail => fail,
        }
    }
}

/// Implemented by every step payload.
pub trait StepGate {
    fn check(&self, ctx: &GateContext) -> GateResult;
}
