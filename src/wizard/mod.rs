//! Wizard core: step order, gates, the draft and its persistence.

pub mod draft;
pub mod gate;
pub mod persist;
pub mod sequencer;
pub mod session;
pub mod step;
pub mod store;

pub use draft::{CampaignDraft, StepRecord, StepStatus};
pub use gate::{GateContext, GateFailure, GateResult, StepGate};
pub use persist::SessionFile;
pub use sequencer::WizardSequencer;
pub use session::{HydrationReport, WizardSession};
pub use step::StepKind;
pub use store::StepStore;
