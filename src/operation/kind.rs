//! Kinds of supervised operations and their timeout class.

use serde::{Deserialize, Serialize};

/// A long-running remote call the wizard supervises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Clone an external site into a landing page.
    Clone,
    /// Configure sender DNS and validate SPF/DKIM/DMARC.
    DnsValidate,
    /// Generate email/news templates with the AI service.
    AiGenerate,
    /// Apply a stock landing template.
    TemplateSelect,
}

/// Whether the client puts a deadline on the remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutClass {
    /// Fails locally once the client timeout elapses.
    Bounded,
    /// No client timeout; server-side limits apply.
    Unbounded,
}

impl OperationKind {
    pub fn timeout_class(&self) -> TimeoutClass {
        match self {
            Self::Clone => TimeoutClass::Unbounded,
            Self::DnsValidate | Self::AiGenerate | Self::TemplateSelect => TimeoutClass::Bounded,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Clone => "clone",
            Self::DnsValidate => "dns_validate",
            Self::AiGenerate => "ai_generate",
            Self::TemplateSelect => "template_select",
        };
        write!(f, "{s}")
    }
}
