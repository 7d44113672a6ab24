//! Training step: what happens to targets who fall for the simulation.

use serde::{Deserialize, Serialize};

use crate::wizard::gate::{GateContext, GateResult, StepGate};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingSettings {
    pub enabled: bool,
    #[serde(default)]
    pub module_ids: Vec<String>,
    /// Days a target has to finish the assigned training.
    #[serde(default)]
    pub due_in_days: Option<u32>,
    /// Assign training as soon as a target clicks, rather than at campaign end.
    #[serde(default)]
    pub send_on_click: bool,
}

impl TrainingSettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            module_ids: Vec::new(),
            due_in_days: None,
            send_on_click: false,
        }
    }

    pub fn with_modules<I, S>(modules: I, due_in_days: u32) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            enabled: true,
            module_ids: modules.into_iter().map(Into::into).collect(),
            due_in_days: Some(due_in_days),
            send_on_click: false,
        }
    }
}

impl Default for TrainingSettings {
    fn default() -> Self {
        Self::disabled()
    }
}

impl StepGate for TrainingSettings {
    fn check(&self, _ctx: &GateContext) -> GateResult {
        if !self.enabled {
            return GateResult::Pass;
        }
        if !self.module_ids.iter().any(|m| !m.trim().is_empty()) {
            return GateResult::fail("moduleIds", "Select at least one training module");
        }
        match self.due_in_days {
            Some(days) if days > 0 => GateResult::Pass,
            _ => GateResult::fail("dueInDays", "Training needs a due date"),
        }
    }
}
