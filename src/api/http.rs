//! reqwest-backed [`CampaignApi`].

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::config::ApiConfig;
use crate::error::{ApiError, ConfigError};
use crate::operation::{OperationKind, TimeoutClass};
use crate::steps::general::GeneralSettings;
use crate::wizard::step::StepKind;

use super::CampaignApi;
use super::types::*;

/// Longest backend error body echoed into an error message.
const MAX_ERROR_BODY: usize = 300;

/// HTTP client for the campaign backend.
pub struct HttpCampaignApi {
    client: reqwest::Client,
    base_url: String,
    token: Option<SecretString>,
    request_timeout: Duration,
    health_timeout: Duration,
}

impl HttpCampaignApi {
    pub fn new(config: &ApiConfig) -> Result<Self, ConfigError> {
        // No client-wide timeout: the clone call must be able to wait on the
        // server. Bounded calls set one per request.
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
            request_timeout: config.request_timeout,
            health_timeout: config.health_timeout,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    fn campaign_url(&self, campaign_id: &CampaignId, rest: &str) -> String {
        self.url(&format!("/api/campaigns/{}{rest}", campaign_id.as_str()))
    }

    /// Client timeout for an operation kind: `None` for unbounded kinds.
    fn timeout_for(&self, kind: OperationKind) -> Option<Duration> {
        match kind.timeout_class() {
            TimeoutClass::Bounded => Some(self.request_timeout),
            TimeoutClass::Unbounded => None,
        }
    }

    fn request(&self, method: Method, url: String, timeout: Option<Duration>) -> RequestBuilder {
        let mut builder = self.client.request(method, url);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(ref token) = self.token {
            builder = builder.bearer_auth(token.expose_secret());
        }
        builder
    }

    /// Send a request and unwrap the `{ success, data, message }` envelope.
    async fn send<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
        timeout: Option<Duration>,
    ) -> Result<Option<T>, ApiError> {
        Ok(self.send_envelope(operation, builder, timeout).await?.data)
    }

    /// Send a request and return the whole envelope once `success` is true.
    async fn send_envelope<T: DeserializeOwned>(
        &self,
        operation: &str,
        builder: RequestBuilder,
        timeout: Option<Duration>,
    ) -> Result<ApiEnvelope<T>, ApiError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| transport_error(operation, e, timeout))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| transport_error(operation, e, timeout))?;

        if !status.is_success() {
            let message = serde_json::from_str::<ApiEnvelope<serde_json::Value>>(&body)
                .ok()
                .and_then(|env| env.message)
                .unwrap_or_else(|| truncate(&body, MAX_ERROR_BODY));
            warn!(operation, status = status.as_u16(), "Backend returned error status");
            return Err(ApiError::Status {
                operation: operation.to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let envelope: ApiEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| ApiError::Decode {
                operation: operation.to_string(),
                reason: e.to_string(),
            })?;

        if !envelope.success {
            return Err(ApiError::Rejected {
                operation: operation.to_string(),
                message: envelope
                    .message
                    .unwrap_or_else(|| "request was not accepted".to_string()),
            });
        }

        debug!(operation, "Backend call succeeded");
        Ok(envelope)
    }

    async fn send_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        operation: &str,
        method: Method,
        url: String,
        body: &B,
        timeout: Option<Duration>,
    ) -> Result<Option<T>, ApiError> {
        let builder = self.request(method, url, timeout).json(body);
        self.send(operation, builder, timeout).await
    }
}

#[async_trait]
impl CampaignApi for HttpCampaignApi {
    async fn health_check(&self) -> Result<(), ApiError> {
        let timeout = Some(self.health_timeout);
        let resp = self
            .request(Method::GET, self.url("/api/health"), timeout)
            .send()
            .await
            .map_err(|e| transport_error("health_check", e, timeout))?;

        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ApiError::Status {
                operation: "health_check".to_string(),
                status: resp.status().as_u16(),
                message: "health check failed".to_string(),
            })
        }
    }

    async fn create_campaign(&self, settings: &GeneralSettings) -> Result<CampaignId, ApiError> {
        let created: Option<CreatedCampaign> = self
            .send_json(
                "create_campaign",
                Method::POST,
                self.url("/api/campaigns"),
                settings,
                Some(self.request_timeout),
            )
            .await?;
        created
            .map(|c| c.campaign_id)
            .ok_or_else(|| missing_data("create_campaign"))
    }

    async fn save_step(
        &self,
        campaign_id: &CampaignId,
        step: StepKind,
        payload: &serde_json::Value,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        self.send_json(
            "save_step",
            Method::PUT,
            self.campaign_url(campaign_id, &format!("/steps/{}", step.path_segment())),
            payload,
            Some(self.request_timeout),
        )
        .await
    }

    async fn get_step(
        &self,
        campaign_id: &CampaignId,
        step: StepKind,
    ) -> Result<Option<serde_json::Value>, ApiError> {
        let timeout = Some(self.request_timeout);
        let builder = self.request(
            Method::GET,
            self.campaign_url(campaign_id, &format!("/steps/{}", step.path_segment())),
            timeout,
        );
        self.send("get_step", builder, timeout).await
    }

    async fn clone_url(&self, campaign_id: &CampaignId, url: &str) -> Result<ClonedPage, ApiError> {
        let cloned: Option<ClonedPage> = self
            .send_json(
                "clone_url",
                Method::POST,
                self.campaign_url(campaign_id, "/landing-page/clone"),
                &CloneRequest {
                    url: url.to_string(),
                },
                self.timeout_for(OperationKind::Clone),
            )
            .await?;
        cloned.ok_or_else(|| missing_data("clone_url"))
    }

    async fn select_template(
        &self,
        campaign_id: &CampaignId,
        template_id: &str,
    ) -> Result<SelectedTemplate, ApiError> {
        let selected: Option<SelectedTemplate> = self
            .send_json(
                "select_template",
                Method::POST,
                self.campaign_url(campaign_id, "/landing-page/template"),
                &SelectTemplateRequest {
                    template_id: template_id.to_string(),
                },
                self.timeout_for(OperationKind::TemplateSelect),
            )
            .await?;
        Ok(selected.unwrap_or_default())
    }

    async fn validate_landing_step(
        &self,
        campaign_id: &CampaignId,
    ) -> Result<Option<String>, ApiError> {
        let timeout = Some(self.request_timeout);
        let builder = self.request(
            Method::POST,
            self.campaign_url(campaign_id, "/landing-page/validate"),
            timeout,
        );
        let envelope: ApiEnvelope<serde_json::Value> = self
            .send_envelope("validate_landing_step", builder, timeout)
            .await?;
        Ok(envelope.message)
    }

    async fn configure_dns(
        &self,
        campaign_id: &CampaignId,
        request: &DnsRequest,
    ) -> Result<DnsValidation, ApiError> {
        let configured: Option<DnsConfigured> = self
            .send_json(
                "configure_dns",
                Method::POST,
                self.campaign_url(campaign_id, "/dns"),
                request,
                self.timeout_for(OperationKind::DnsValidate),
            )
            .await?;
        configured
            .map(|c| c.validation_results)
            .ok_or_else(|| missing_data("configure_dns"))
    }

    async fn generate_templates(
        &self,
        campaign_id: &CampaignId,
        request: &GenerateTemplatesRequest,
    ) -> Result<Vec<GeneratedTemplate>, ApiError> {
        let generated: Option<GeneratedTemplates> = self
            .send_json(
                "generate_templates",
                Method::POST,
                self.campaign_url(campaign_id, "/templates/generate"),
                request,
                self.timeout_for(OperationKind::AiGenerate),
            )
            .await?;
        generated
            .map(|g| g.templates)
            .ok_or_else(|| missing_data("generate_templates"))
    }
}

fn transport_error(operation: &str, err: reqwest::Error, timeout: Option<Duration>) -> ApiError {
    if err.is_timeout() {
        ApiError::Timeout {
            operation: operation.to_string(),
            timeout: timeout.unwrap_or_default(),
        }
    } else {
        ApiError::Network {
            operation: operation.to_string(),
            reason: err.to_string(),
        }
    }
}

fn missing_data(operation: &str) -> ApiError {
    ApiError::Decode {
        operation: operation.to_string(),
        reason: "response envelope has no data".to_string(),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max).collect();
        format!("{cut}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api(base_url: &str) -> HttpCampaignApi {
        HttpCampaignApi::new(&ApiConfig {
            base_url: base_url.to_string(),
            ..ApiConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn urls_strip_trailing_slash() {
        let api = api("http://backend:8000/");
        let id = CampaignId::new("c1");
        assert_eq!(api.url("/api/health"), "http://backend:8000/api/health");
        assert_eq!(
            api.campaign_url(&id, "/landing-page/clone"),
            "http://backend:8000/api/campaigns/c1/landing-page/clone"
        );
    }

    #[test]
    fn clone_has_no_client_timeout() {
        let api = api("http://backend:8000");
        assert_eq!(api.timeout_for(OperationKind::Clone), None);
        assert_eq!(
            api.timeout_for(OperationKind::DnsValidate),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn truncate_long_bodies() {
        assert_eq!(truncate("short", 10), "short");
        let long = "x".repeat(20);
        let cut = truncate(&long, 5);
        assert!(cut.starts_with("xxxxx"));
        assert!(cut.ends_with('…'));
    }
}
