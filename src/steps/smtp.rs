//! SMTP/DNS step: sender identity and SPF/DKIM/DMARC validation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{CampaignApi, CampaignId, DnsRecordStatus, DnsRequest, DnsValidation};
use crate::config::OperationPolicy;
use crate::connectivity::ConnectivityProbe;
use crate::error::{ApiError, ErrorKind, OperationError, RetryError};
use crate::operation::{OperationKind, OperationSlot, RemoteCall, RunOutcome};
use crate::wizard::gate::{GateContext, GateResult, StepGate};

use super::{ScopedRequest, StepPayload, is_email_shaped};

/// Minimum sender display name length, in characters, after trimming.
pub const MIN_FROM_NAME_LEN: usize = 2;

/// Payload of the SMTP/DNS step.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpSettings {
    pub from_email: String,
    pub from_name: String,
    /// Sending domain. Defaults to the domain of `from_email`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(default)]
    pub dns: Option<DnsValidation>,
}

impl SmtpSettings {
    /// Domain whose records are validated.
    pub fn sender_domain(&self) -> Option<String> {
        let explicit = self
            .domain
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty());
        match explicit {
            Some(domain) => Some(domain.to_lowercase()),
            None => self
                .from_email
                .trim()
                .rsplit_once('@')
                .map(|(_, domain)| domain.to_lowercase())
                .filter(|d| !d.is_empty()),
        }
    }
}

impl StepGate for SmtpSettings {
    fn check(&self, _ctx: &GateContext) -> GateResult {
        if !is_email_shaped(&self.from_email) {
            return GateResult::fail("fromEmail", "Enter a valid sender email address");
        }
        if self.from_name.trim().chars().count() < MIN_FROM_NAME_LEN {
            return GateResult::fail(
                "fromName",
                format!("Sender name must be at least {MIN_FROM_NAME_LEN} characters"),
            );
        }
        let Some(dns) = &self.dns else {
            return GateResult::fail("dns", "Validate DNS records before continuing");
        };
        let records = [("spf", dns.spf), ("dkim", dns.dkim), ("dmarc", dns.dmarc)];
        if let Some((field, _)) = records.iter().find(|(_, s)| !s.is_terminal()) {
            return GateResult::fail(*field, "DNS check has not finished");
        }
        if !dns.validation_complete {
            return GateResult::fail("dns", "DNS validation is not complete");
        }
        GateResult::Pass
    }
}

/// `configure DNS` as a supervised call.
pub struct DnsCall {
    api: Arc<dyn CampaignApi>,
}

#[async_trait]
impl RemoteCall for DnsCall {
    type Request = ScopedRequest<DnsRequest>;
    type Output = DnsValidation;

    fn kind(&self) -> OperationKind {
        OperationKind::DnsValidate
    }

    async fn call(&self, request: &Self::Request) -> Result<DnsValidation, ApiError> {
        self.api
            .configure_dns(&request.campaign_id, &request.input)
            .await
    }
}

/// Controller for the SMTP/DNS step.
pub struct SmtpDnsStep {
    settings: SmtpSettings,
    dns: OperationSlot<DnsCall>,
}

impl SmtpDnsStep {
    pub fn new(api: Arc<dyn CampaignApi>, probe: ConnectivityProbe, policy: OperationPolicy) -> Self {
        Self {
            settings: SmtpSettings::default(),
            dns: OperationSlot::new(DnsCall { api }, probe, policy),
        }
    }

    pub fn dns_operation(&self) -> &OperationSlot<DnsCall> {
        &self.dns
    }

    /// A new sender address means the records have to be checked again.
    pub fn set_from_email(&mut self, from_email: &str) {
        let from_email = from_email.trim();
        if self.settings.from_email != from_email {
            self.settings.from_email = from_email.to_string();
            self.dns.reset();
        }
    }

    /// Display name only; it has no bearing on the DNS records.
    pub fn set_from_name(&mut self, from_name: &str) {
        self.settings.from_name = from_name.to_string();
    }

    pub fn set_domain(&mut self, domain: Option<&str>) {
        let domain = domain.map(|d| d.trim().to_string()).filter(|d| !d.is_empty());
        if self.settings.domain != domain {
            self.settings.domain = domain;
            self.dns.reset();
        }
    }

    pub fn sender_domain(&self) -> Option<String> {
        self.settings.sender_domain()
    }

    pub async fn validate_dns(&mut self, campaign_id: CampaignId) -> RunOutcome<DnsValidation> {
        if !is_email_shaped(&self.settings.from_email) {
            return RunOutcome::Failed(OperationError::new(
                ErrorKind::Validation,
                "Enter a valid sender email address",
            ));
        }
        let Some(domain) = self.sender_domain() else {
            return RunOutcome::Failed(OperationError::new(
                ErrorKind::Validation,
                "No sending domain to validate",
            ));
        };
        let request = DnsRequest {
            domain,
            from_email: self.settings.from_email.clone(),
            from_name: self.settings.from_name.trim().to_string(),
        };
        let outcome = self
            .dns
            .start(ScopedRequest::new(campaign_id, request))
            .await;
        log_outcome(&outcome);
        outcome
    }

    pub async fn retry_dns(&mut self) -> Result<RunOutcome<DnsValidation>, RetryError> {
        let outcome = self.dns.retry().await?;
        log_outcome(&outcome);
        Ok(outcome)
    }

    /// Current settings with the DNS result the slot is showing.
    pub fn settings(&self) -> SmtpSettings {
        SmtpSettings {
            dns: self.dns.result(),
            ..self.settings.clone()
        }
    }

    pub fn payload(&self) -> StepPayload {
        StepPayload::SmtpDns(self.settings())
    }

    pub fn hydrate(&mut self, settings: &SmtpSettings) {
        self.settings = SmtpSettings {
            dns: None,
            ..settings.clone()
        };
        match &settings.dns {
            Some(dns) => self.dns.restore_success(dns.clone()),
            None => self.dns.reset(),
        }
    }
}

fn log_outcome(outcome: &RunOutcome<DnsValidation>) {
    if let RunOutcome::Succeeded(dns) = outcome {
        let failing = [dns.spf, dns.dkim, dns.dmarc]
            .iter()
            .filter(|s| matches!(s, DnsRecordStatus::Invalid | DnsRecordStatus::Missing))
            .count();
        info!(
            complete = dns.validation_complete,
            failing, "DNS validation finished"
        );
    }
}
