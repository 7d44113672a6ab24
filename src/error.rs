//! Error types for the campaign wizard.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::operation::OperationKind;
use crate::wizard::gate::GateFailure;
use crate::wizard::step::StepKind;

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(String),
}

/// Failures talking to the campaign backend.
///
/// Transport failures (`Timeout`, `Network`) are kept apart from backend
/// answers (`Status`, `Rejected`) so the supervisor can classify them.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    #[error("{operation} network failure: {reason}")]
    Network { operation: String, reason: String },

    #[error("{operation} returned HTTP {status}: {message}")]
    Status {
        operation: String,
        status: u16,
        message: String,
    },

    #[error("{operation} rejected by backend: {message}")]
    Rejected { operation: String, message: String },

    #[error("{operation} returned an unreadable response: {reason}")]
    Decode { operation: String, reason: String },
}

impl ApiError {
    /// Name of the backend operation that failed.
    pub fn operation(&self) -> &str {
        match self {
            ApiError::Timeout { operation, .. }
            | ApiError::Network { operation, .. }
            | ApiError::Status { operation, .. }
            | ApiError::Rejected { operation, .. }
            | ApiError::Decode { operation, .. } => operation,
        }
    }
}

/// Classification of an operation failure as shown to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Probe reported the backend unreachable; nothing was sent.
    Connectivity,
    /// A bounded operation hit its client timeout.
    Timeout,
    /// Transport failure (refused, reset, DNS).
    Network,
    /// Backend refused the request (bad input, auth).
    #[serde(rename = "http_4xx")]
    Http4xx,
    /// Backend fault.
    #[serde(rename = "http_5xx")]
    Http5xx,
    /// Envelope came back with `success: false`.
    Rejected,
    /// Local gate failure. Never involves the network.
    Validation,
}

impl ErrorKind {
    /// Whether a failure of this kind may be retried by the user.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Connectivity | Self::Timeout | Self::Network | Self::Http5xx
        )
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Connectivity => "connectivity",
            Self::Timeout => "timeout",
            Self::Network => "network",
            Self::Http4xx => "http_4xx",
            Self::Http5xx => "http_5xx",
            Self::Rejected => "rejected",
            Self::Validation => "validation",
        };
        write!(f, "{s}")
    }
}

/// A classified operation failure. This is what the UI sees; raw transport
/// errors stop at the supervisor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct OperationError {
    pub kind: ErrorKind,
    pub message: String,
}

impl OperationError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn connectivity() -> Self {
        Self::new(
            ErrorKind::Connectivity,
            "Backend is unreachable. Check your connection and try again.",
        )
    }

    /// The caller stopped waiting before the backend answered.
    pub fn interrupted() -> Self {
        Self::new(
            ErrorKind::Network,
            "Operation was interrupted before the backend answered.",
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}

impl From<&ApiError> for OperationError {
    fn from(err: &ApiError) -> Self {
        let kind = match err {
            ApiError::Timeout { .. } => ErrorKind::Timeout,
            ApiError::Network { .. } => ErrorKind::Network,
            ApiError::Status { status, .. } if (400..500).contains(status) => ErrorKind::Http4xx,
            ApiError::Status { .. } => ErrorKind::Http5xx,
            ApiError::Rejected { .. } => ErrorKind::Rejected,
            // A body we cannot read is a backend fault.
            ApiError::Decode { .. } => ErrorKind::Http5xx,
        };
        Self::new(kind, err.to_string())
    }
}

/// Reasons the sequencer refuses to advance.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AdvanceError {
    #[error("Step {step} is not ready: {failure}")]
    Gate { step: StepKind, failure: GateFailure },

    #[error("Payload for {got} submitted while the wizard is on {expected}")]
    StepMismatch { expected: StepKind, got: StepKind },

    #[error("Step {step} requires the campaign id returned by create campaign")]
    MissingCampaignId { step: StepKind },

    #[error("Wizard is already finished")]
    Finished,
}

/// Reasons a retry was refused.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RetryError {
    #[error("No previous attempt to retry")]
    NothingToRetry,

    #[error("Operation is still running")]
    InProgress,

    #[error("Last attempt succeeded")]
    AlreadySucceeded,

    #[error("A {kind} failure is not retryable")]
    NotRetryable { kind: ErrorKind },

    #[error("Retry budget exhausted after {attempts} of {max} attempts")]
    Exhausted { attempts: u32, max: u32 },
}

/// Errors from the step store and the local session file.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Step {step} needs a campaign id but none has been created")]
    NoCampaign { step: StepKind },

    #[error("Step {step} cannot be submitted: {reason}")]
    StepNotReady { step: StepKind, reason: String },

    #[error("Backend call failed: {0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Advance(#[from] AdvanceError),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from running a campaign plan end to end.
#[derive(Debug, thiserror::Error)]
pub enum DriveError {
    #[error("{0}")]
    Session(#[from] SessionError),

    #[error("{kind} failed: {error}")]
    Operation {
        kind: OperationKind,
        error: OperationError,
    },

    #[error("{kind}: {source}")]
    Retry {
        kind: OperationKind,
        #[source]
        source: RetryError,
    },

    #[error("Backend stayed unreachable after {checks} connectivity checks")]
    Offline { checks: u32 },

    #[error("Plan is not usable for step {step}: {reason}")]
    Plan { step: StepKind, reason: String },
}
