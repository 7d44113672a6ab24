//! Operation state machine and the snapshot the UI renders.

use serde::{Deserialize, Serialize};

use crate::error::{OperationError, RetryError};

use super::kind::OperationKind;

/// Highest progress value shown while an operation is still running. The
/// last stretch is reserved for the real terminal response.
pub const PROGRESS_CEILING: u8 = 89;

/// Attempt multiplier cap for duration estimates.
const ESTIMATE_ATTEMPT_CAP: u32 = 3;

/// State of a supervised operation.
///
/// `Idle → Running → Success`, or `Idle → Running → Error → (Running → Error)*`
/// until success or the retry budget runs out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationState {
    Idle,
    Running,
    Success,
    Error,
}

impl OperationState {
    pub fn can_transition_to(&self, target: OperationState) -> bool {
        use OperationState::*;
        matches!(
            (self, target),
            (Idle, Running)
                | (Idle, Error)
                | (Running, Success)
                | (Running, Error)
                | (Running, Running)
                | (Error, Running)
                | (Error, Error)
                | (Success, Running)
                | (Success, Error)
                | (_, Idle)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Success | Self::Error)
    }
}

impl std::fmt::Display for OperationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Success => "success",
            Self::Error => "error",
        };
        write!(f, "{s}")
    }
}

/// Estimated duration for an attempt: `base * min(attempt, 3)`.
pub fn estimate_duration_secs(base_secs: u32, attempt: u32) -> u32 {
    base_secs.saturating_mul(attempt.clamp(1, ESTIMATE_ATTEMPT_CAP))
}

/// Everything the UI needs to render one operation slot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OperationSnapshot<T> {
    pub kind: OperationKind,
    pub state: OperationState,
    /// Attempts made in the current invocation (1-based once running).
    pub attempt: u32,
    pub max_attempts: u32,
    /// Cosmetic 0–100 progress. Carries no information from the server.
    pub progress: u8,
    pub estimated_duration_secs: u32,
    pub last_error: Option<OperationError>,
    /// Bumped on every trigger and reset; responses for older generations
    /// are discarded.
    pub generation: u64,
    pub result: Option<T>,
}

impl<T> OperationSnapshot<T> {
    pub fn idle(kind: OperationKind, max_attempts: u32) -> Self {
        Self {
            kind,
            state: OperationState::Idle,
            attempt: 0,
            max_attempts,
            progress: 0,
            estimated_duration_secs: 0,
            last_error: None,
            generation: 0,
            result: None,
        }
    }

    /// Why a retry is not available right now, if it isn't.
    pub fn retry_blocker(&self) -> Option<RetryError> {
        match self.state {
            OperationState::Idle => Some(RetryError::NothingToRetry),
            OperationState::Running => Some(RetryError::InProgress),
            OperationState::Success => Some(RetryError::AlreadySucceeded),
            OperationState::Error => match &self.last_error {
                None => Some(RetryError::NothingToRetry),
                Some(err) if !err.is_retryable() => {
                    Some(RetryError::NotRetryable { kind: err.kind })
                }
                Some(_) if self.attempt >= self.max_attempts => Some(RetryError::Exhausted {
                    attempts: self.attempt,
                    max: self.max_attempts,
                }),
                Some(_) => None,
            },
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retry_blocker().is_none()
    }

    /// Label for the retry affordance, e.g. `Retry (1/3)`.
    pub fn retry_label(&self) -> Option<String> {
        self.can_retry()
            .then(|| format!("Retry ({}/{})", self.attempt, self.max_attempts))
    }

    /// Message for a failure that will not be retried.
    pub fn terminal_message(&self) -> Option<String> {
        if self.state != OperationState::Error || self.can_retry() {
            return None;
        }
        let err = self.last_error.as_ref()?;
        Some(match self.retry_blocker() {
            Some(RetryError::Exhausted { attempts, .. }) => format!(
                "{} failed after {attempts} attempts. Please check the server status and try again later.",
                self.kind
            ),
            _ => err.message.clone(),
        })
    }

    pub(crate) fn reset(&mut self) {
        self.state = OperationState::Idle;
        self.attempt = 0;
        self.progress = 0;
        self.estimated_duration_secs = 0;
        self.last_error = None;
        self.result = None;
    }

    pub(crate) fn begin_attempt(&mut self, base_secs: u32) {
        self.transition(OperationState::Running);
        self.attempt += 1;
        self.progress = 0;
        self.estimated_duration_secs = estimate_duration_secs(base_secs, self.attempt);
        self.last_error = None;
        self.result = None;
    }

    /// Add a tick increment, holding below the ceiling. Returns whether the
    /// value changed.
    pub(crate) fn advance_progress(&mut self, increment: u8) -> bool {
        if self.state != OperationState::Running {
            return false;
        }
        let next = self.progress.saturating_add(increment).min(PROGRESS_CEILING);
        if next > self.progress {
            self.progress = next;
            true
        } else {
            false
        }
    }

    pub(crate) fn succeed(&mut self, result: T) {
        self.transition(OperationState::Success);
        self.progress = 100;
        self.last_error = None;
        self.result = Some(result);
    }

    pub(crate) fn fail(&mut self, error: OperationError) {
        self.transition(OperationState::Error);
        self.last_error = Some(error);
        self.result = None;
    }

    /// Show a previously saved result. Bypasses `Running`, so it starts from
    /// a clean slot.
    pub(crate) fn restore(&mut self, result: T) {
        self.reset();
        self.state = OperationState::Success;
        self.progress = 100;
        self.result = Some(result);
    }

    fn transition(&mut self, target: OperationState) {
        debug_assert!(
            self.state.can_transition_to(target),
            "illegal operation transition {} -> {target}",
            self.state
        );
        self.state = target;
    }
}
