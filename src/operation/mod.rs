//! Supervised long-running operations.

pub mod kind;
pub mod state;
pub mod supervisor;
mod ticker;

pub use kind::{OperationKind, TimeoutClass};
pub use state::{OperationSnapshot, OperationState, PROGRESS_CEILING, estimate_duration_secs};
pub use supervisor::{OperationSlot, RemoteCall, RunOutcome};
