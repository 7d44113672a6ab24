//! Request and response shapes for the campaign backend.
//!
//! Every response uses the `{ success, data?, message? }` envelope. Field
//! names are camelCase on the wire.

use serde::{Deserialize, Serialize};

/// Opaque campaign identifier issued by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CampaignId(String);

impl CampaignId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CampaignId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Standard response envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedCampaign {
    pub campaign_id: CampaignId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloneRequest {
    pub url: String,
}

/// Result of cloning a site into a landing page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClonedPage {
    pub preview_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectTemplateRequest {
    pub template_id: String,
}

/// Result of choosing a stock landing template.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedTemplate {
    #[serde(default)]
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsRequest {
    pub domain: String,
    pub from_email: String,
    pub from_name: String,
}

/// Validation state of one DNS record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DnsRecordStatus {
    /// Not checked yet.
    #[default]
    Pending,
    /// Check in progress on the server.
    Checking,
    Valid,
    Invalid,
    /// Record absent from the zone.
    Missing,
}

impl DnsRecordStatus {
    /// Whether the server has finished checking this record.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Valid | Self::Invalid | Self::Missing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsValidation {
    pub spf: DnsRecordStatus,
    pub dkim: DnsRecordStatus,
    pub dmarc: DnsRecordStatus,
    pub validation_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsConfigured {
    pub validation_results: DnsValidation,
}

/// Inputs for AI template generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateTemplatesRequest {
    /// `email` or `news`.
    pub template_type: String,
    pub topic: String,
    pub count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedTemplate {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub preview_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedTemplates {
    pub templates: Vec<GeneratedTemplate>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_without_data_parses() {
        let env: ApiEnvelope<ClonedPage> =
            serde_json::from_str(r#"{"success": false, "message": "bad url"}"#).unwrap();
        assert!(!env.success);
        assert!(env.data.is_none());
        assert_eq!(env.message.as_deref(), Some("bad url"));
    }

    fn decode<T: serde::de::DeserializeOwned>(body: &str) -> ApiEnvelope<T> {
        serde_json::from_str(body).unwrap()
    }

    #[test]
    fn envelope_decodes_for_any_payload_type() {
        let env: ApiEnvelope<Vec<String>> = decode(r#"{"success": true, "data": ["a", "b"]}"#);
        assert_eq!(env.data, Some(vec!["a".to_string(), "b".to_string()]));
        let env: ApiEnvelope<ClonedPage> = decode(r#"{"success": true}"#);
        assert!(env.data.is_none());
    }

    #[test]
    fn wire_names_are_camel_case() {
        let json = serde_json::to_value(DnsValidation {
            spf: DnsRecordStatus::Valid,
            dkim: DnsRecordStatus::Missing,
            dmarc: DnsRecordStatus::Checking,
            validation_complete: false,
        })
        .unwrap();
        assert_eq!(json["validationComplete"], false);
        assert_eq!(json["dkim"], "missing");

        let created: CreatedCampaign =
            serde_json::from_str(r#"{"campaignId": "cmp-42"}"#).unwrap();
        assert_eq!(created.campaign_id.as_str(), "cmp-42");
    }

    #[test]
    fn dns_terminal_statuses() {
        assert!(!DnsRecordStatus::Pending.is_terminal());
        assert!(!DnsRecordStatus::Checking.is_terminal());
        assert!(DnsRecordStatus::Valid.is_terminal());
        assert!(DnsRecordStatus::Invalid.is_terminal());
        assert!(DnsRecordStatus::Missing.is_terminal());
    }
}
