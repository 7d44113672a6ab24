//! General settings step (step 0). Submitting it creates the campaign.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::wizard::gate::{GateContext, GateResult, StepGate};

/// Minimum campaign name length, in characters, after trimming.
pub const MIN_NAME_LEN: usize = 3;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneralSettings {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// When the first emails go out.
    pub launch_at: DateTime<Utc>,
    /// IANA zone the launch time was picked in, for display.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl StepGate for GeneralSettings {
    fn check(&self, ctx: &GateContext) -> GateResult {
        let name_len = self.name.trim().chars().count();
        if name_len == 0 {
            return GateResult::fail("name", "Campaign name is required");
        }
        if name_len < MIN_NAME_LEN {
            return GateResult::fail(
                "name",
                format!("Campaign name must be at least {MIN_NAME_LEN} characters"),
            );
        }
        if self.launch_at <= ctx.now {
            return GateResult::fail("launchAt", "Launch date must be in the future");
        }
        GateResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn settings(name: &str, launch_in: Duration) -> (GeneralSettings, GateContext) {
        let now = Utc::now();
        (
            GeneralSettings {
                name: name.to_string(),
                description: String::new(),
                launch_at: now + launch_in,
                timezone: None,
            },
            GateContext::at(now),
        )
    }

    #[test]
    fn valid_settings_pass() {
        let (s, ctx) = settings("Q3 awareness", Duration::days(2));
        assert!(s.check(&ctx).is_ok());
    }

    #[test]
    fn short_or_blank_name_fails() {
        let (s, ctx) = settings("ab", Duration::days(2));
        assert_eq!(s.check(&ctx).failure().unwrap().field, "name");

        let (s, ctx) = settings("   ", Duration::days(2));
        assert_eq!(
            s.check(&ctx).failure().unwrap().reason,
            "Campaign name is required"
        );

        // Padding does not count toward the length.
        let (s, ctx) = settings("  ab  ", Duration::days(2));
        assert!(!s.check(&ctx).is_ok());
    }

    #[test]
    fn launch_must_be_strictly_future() {
        let (s, ctx) = settings("Q3 awareness", Duration::zero());
        assert_eq!(s.check(&ctx).failure().unwrap().field, "launchAt");

        let (s, ctx) = settings("Q3 awareness", Duration::minutes(-5));
        assert!(!s.check(&ctx).is_ok());
    }
}
