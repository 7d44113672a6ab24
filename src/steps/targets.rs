//! Targets step: the people who will receive the simulated phishing emails.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::wizard::gate::{GateContext, GateResult, StepGate};

use super::is_email_shaped;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Target {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<String>,
}

impl Target {
    pub fn new(
        first_name: impl Into<String>,
        last_name: impl Into<String>,
        email: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            last_name: last_name.into(),
            email: email.into(),
            department: None,
            position: None,
        }
    }

    /// Case-insensitive key used for duplicate detection.
    pub fn email_key(&self) -> String {
        self.email.trim().to_lowercase()
    }

    fn problem(&self) -> Option<RowRejection> {
        if self.first_name.trim().is_empty() || self.last_name.trim().is_empty() {
            return Some(RowRejection::MissingName);
        }
        if !is_email_shaped(&self.email) {
            return Some(RowRejection::InvalidEmail);
        }
        None
    }
}

/// Why an imported row was not added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowRejection {
    MissingName,
    InvalidEmail,
    Duplicate,
}

impl std::fmt::Display for RowRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "first and last name are required"),
            Self::InvalidEmail => write!(f, "email address is not valid"),
            Self::Duplicate => write!(f, "email address is already in the list"),
        }
    }
}

/// One row an import refused.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectedRow {
    /// 1-based row number within the import.
    pub row: usize,
    pub email: String,
    pub reason: RowRejection,
}

/// Outcome of merging imported rows into the list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub accepted: usize,
    pub rejected: Vec<RejectedRow>,
}

/// Payload of the targets step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetList {
    #[serde(default)]
    targets: Vec<Target>,
}

impl TargetList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn targets(&self) -> &[Target] {
        &self.targets
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    pub fn contains_email(&self, email: &str) -> bool {
        let key = email.trim().to_lowercase();
        self.targets.iter().any(|t| t.email_key() == key)
    }

    /// Add one target, refusing invalid rows and duplicates.
    pub fn add(&mut self, target: Target) -> Result<(), RowRejection> {
        if let Some(problem) = target.problem() {
            return Err(problem);
        }
        if self.contains_email(&target.email) {
            return Err(RowRejection::Duplicate);
        }
        self.targets.push(Target {
            email: target.email.trim().to_string(),
            ..target
        });
        Ok(())
    }

    /// Merge already-parsed import rows, reporting each refused row.
    pub fn import(&mut self, rows: impl IntoIterator<Item = Target>) -> ImportReport {
        let mut report = ImportReport::default();
        for (i, row) in rows.into_iter().enumerate() {
            let email = row.email.clone();
            match self.add(row) {
                Ok(()) => report.accepted += 1,
                Err(reason) => report.rejected.push(RejectedRow {
                    row: i + 1,
                    email,
                    reason,
                }),
            }
        }
        debug!(
            accepted = report.accepted,
            rejected = report.rejected.len(),
            "Imported targets"
        );
        report
    }

    /// Remove a target by email. Returns whether anything was removed.
    pub fn remove(&mut self, email: &str) -> bool {
        let key = email.trim().to_lowercase();
        let before = self.targets.len();
        self.targets.retain(|t| t.email_key() != key);
        self.targets.len() != before
    }
}

impl StepGate for TargetList {
    fn check(&self, _ctx: &GateContext) -> GateResult {
        if self.targets.is_empty() {
            return GateResult::fail("targets", "Add at least one target");
        }
        let mut seen = HashSet::new();
        for (i, target) in self.targets.iter().enumerate() {
            if let Some(problem) = target.problem() {
                return GateResult::fail(format!("targets[{i}]"), problem.to_string());
            }
            if !seen.insert(target.email_key()) {
                return GateResult::fail(
                    format!("targets[{i}].email"),
                    format!("{} appears more than once", target.email),
                );
            }
        }
        GateResult::Pass
    }
}
