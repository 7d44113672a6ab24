//! The ordered wizard steps.

use serde::{Deserialize, Serialize};

/// One screen of the campaign wizard, in declaration order.
///
/// General → Targets → Templates → LandingPage → SmtpDns → Training.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    General,
    Targets,
    Templates,
    LandingPage,
    SmtpDns,
    Training,
}

impl StepKind {
    /// All steps in wizard order.
    pub const ALL: [StepKind; 6] = [
        StepKind::General,
        StepKind::Targets,
        StepKind::Templates,
        StepKind::LandingPage,
        StepKind::SmtpDns,
        StepKind::Training,
    ];

    /// 0-based position in the wizard.
    pub fn index(&self) -> usize {
        match self {
            Self::General => 0,
            Self::Targets => 1,
            Self::Templates => 2,
            Self::LandingPage => 3,
            Self::SmtpDns => 4,
            Self::Training => 5,
        }
    }

    pub fn from_index(index: usize) -> Option<StepKind> {
        Self::ALL.get(index).copied()
    }

    pub fn next(&self) -> Option<StepKind> {
        Self::from_index(self.index() + 1)
    }

    pub fn previous(&self) -> Option<StepKind> {
        self.index().checked_sub(1).and_then(Self::from_index)
    }

    pub fn is_first(&self) -> bool {
        self.index() == 0
    }

    /// Path segment used by the backend's step endpoints.
    pub fn path_segment(&self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Targets => "targets",
            Self::Templates => "templates",
            Self::LandingPage => "landing-page",
            Self::SmtpDns => "smtp",
            Self::Training => "training",
        }
    }

    /// Human-readable step title.
    pub fn title(&self) -> &'static str {
        match self {
            Self::General => "General settings",
            Self::Targets => "Targets",
            Self::Templates => "Email templates",
            Self::LandingPage => "Landing page",
            Self::SmtpDns => "SMTP & DNS",
            Self::Training => "Training",
        }
    }
}

impl std::fmt::Display for StepKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::General => "general",
            Self::Targets => "targets",
            Self::Templates => "templates",
            Self::LandingPage => "landing_page",
            Self::SmtpDns => "smtp_dns",
            Self::Training => "training",
        };
        write!(f, "{s}")
    }
}
