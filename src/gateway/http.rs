//! HTTP gateway - multipart form posts to the ledger script endpoint
//!
//! The request carries no custom headers. The multipart encoder sets the
//! content type itself; overriding it would turn the request into one that
//! needs a cross-origin preflight.

use async_trait::async_trait;
use reqwest::{multipart::Form, Client, Url};
use tracing::{debug, info, warn};

use super::{
    audit_fields, AmbiguousFailurePolicy, GatewayOutcome, SubmissionGateway, SubmissionRequest,
};
use crate::auth::VerifiedIdentity;
use crate::config::PortalConfig;
use crate::types::{PortalError, Result};

/// Gateway posting to one externally configured endpoint
pub struct HttpGateway {
    endpoint: Option<Url>,
    policy: AmbiguousFailurePolicy,
    client: Client,
}

impl HttpGateway {
    /// Create a gateway, failing fast when the endpoint is absent or malformed
    pub fn new(config: &PortalConfig) -> Result<Self> {
        let raw = config.script_url.as_deref().ok_or_else(|| {
            PortalError::Config("SCRIPT_URL is required to submit records".into())
        })?;
        let endpoint = parse_endpoint(raw)?;
        Self::build(Some(endpoint), config.ambiguous_failure)
    }

    /// Create a gateway whose missing endpoint is only reported at the
    /// first submission attempt
    pub fn lazy(endpoint: Option<&str>, policy: AmbiguousFailurePolicy) -> Result<Self> {
        let endpoint = endpoint.map(parse_endpoint).transpose()?;
        Self::build(endpoint, policy)
    }

    fn build(endpoint: Option<Url>, policy: AmbiguousFailurePolicy) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| PortalError::Config(format!("Failed to build HTTP client: {}", e)))?;

        if let Some(ref url) = endpoint {
            info!(endpoint = %url, policy = ?policy, "HttpGateway created");
        }

        Ok(Self {
            endpoint,
            policy,
            client,
        })
    }

    /// Configured ambiguous-failure policy
    pub fn policy(&self) -> AmbiguousFailurePolicy {
        self.policy
    }

    fn endpoint(&self) -> Result<&Url> {
        self.endpoint.as_ref().ok_or_else(|| {
            PortalError::Config("Submission endpoint URL is missing from configuration".into())
        })
    }

    fn ambiguous(&self, reason: String) -> Result<GatewayOutcome> {
        match self.policy {
            AmbiguousFailurePolicy::TreatAsSuccess => {
                warn!(reason = %reason, "Ambiguous transport failure treated as delivered");
                Ok(GatewayOutcome::AssumedDelivered { reason })
            }
            AmbiguousFailurePolicy::Report => {
                warn!(reason = %reason, "Ambiguous transport failure reported");
                Err(PortalError::Ambiguous(reason))
            }
        }
    }
}

fn parse_endpoint(raw: &str) -> Result<Url> {
    Url::parse(raw.trim())
        .map_err(|e| PortalError::Config(format!("Invalid submission endpoint '{}': {}", raw, e)))
}

fn to_form(fields: Vec<(String, String)>) -> Form {
    fields
        .into_iter()
        .fold(Form::new(), |form, (key, value)| form.text(key, value))
}

/// Pull a human-readable message out of an endpoint response body.
///
/// JSON bodies may carry `error` or `message`; anything else non-blank is
/// used verbatim.
fn extract_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        return json_message(&value);
    }
    Some(trimmed.to_string())
}

fn json_message(value: &serde_json::Value) -> Option<String> {
    ["error", "message"]
        .iter()
        .find_map(|key| value.get(*key).and_then(|v| v.as_str()))
        .map(str::to_string)
}

fn is_error_result(value: &serde_json::Value) -> bool {
    value
        .get("result")
        .and_then(|v| v.as_str())
        .map(|r| r.eq_ignore_ascii_case("error"))
        .unwrap_or(false)
}

#[async_trait]
impl SubmissionGateway for HttpGateway {
    async fn submit(&self, request: SubmissionRequest) -> Result<GatewayOutcome> {
        let endpoint = self.endpoint()?.clone();

        info!(
            destination = %request.destination,
            fields = request.fields.len(),
            authenticated = request.auth_token.is_some(),
            "Submitting record"
        );

        let form = to_form(request.form_fields());
        let response = match self.client.post(endpoint).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => return self.ambiguous(e.to_string()),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Endpoint rejected submission");
            return Err(PortalError::Transport {
                status: Some(status.as_u16()),
                message: extract_message(&body),
            });
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => return self.ambiguous(e.to_string()),
        };

        match serde_json::from_str::<serde_json::Value>(body.trim()) {
            Ok(value) if is_error_result(&value) => {
                warn!(status = status.as_u16(), "Endpoint returned an error result");
                Err(PortalError::Transport {
                    status: Some(status.as_u16()),
                    message: json_message(&value),
                })
            }
            Ok(value) => {
                debug!(destination = %request.destination, "Submission acknowledged");
                Ok(GatewayOutcome::Accepted { body: Some(value) })
            }
            Err(_) => {
                debug!(
                    destination = %request.destination,
                    "Submission acknowledged without a JSON body"
                );
                Ok(GatewayOutcome::Accepted { body: None })
            }
        }
    }

    async fn log_user(&self, identity: &VerifiedIdentity) -> Result<()> {
        let endpoint = self.endpoint()?.clone();
        let form = to_form(audit_fields(identity));

        // Response is deliberately not read
        self.client.post(endpoint).multipart(form).send().await?;
        debug!("Audit log call sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_endpoint() {
        let config = PortalConfig::default();
        let err = HttpGateway::new(&config).err().unwrap();
        assert!(matches!(err, PortalError::Config(_)));
    }

    #[test]
    fn test_new_rejects_malformed_endpoint() {
        let config = PortalConfig {
            script_url: Some("not a url".into()),
            ..Default::default()
        };
        assert!(matches!(
            HttpGateway::new(&config),
            Err(PortalError::Config(_))
        ));
    }

    #[tokio::test]
    async fn test_lazy_gateway_fails_at_first_submit() {
        let gateway = HttpGateway::lazy(None, AmbiguousFailurePolicy::TreatAsSuccess).unwrap();
        let result = gateway.submit(SubmissionRequest::new("Anonymous")).await;
        assert!(matches!(result, Err(PortalError::Config(_))));
    }

    #[test]
    fn test_extract_message() {
        assert_eq!(
            extract_message(r#"{"result":"error","error":"Sheet missing"}"#),
            Some("Sheet missing".into())
        );
        assert_eq!(
            extract_message(r#"{"message":"quota exceeded"}"#),
            Some("quota exceeded".into())
        );
        assert_eq!(extract_message("Bad Gateway"), Some("Bad Gateway".into()));
        assert_eq!(extract_message("  "), None);
        assert_eq!(extract_message(r#"{"result":"error"}"#), None);
    }

    #[test]
    fn test_error_result_detection() {
        let err: serde_json::Value = serde_json::json!({"result": "error"});
        let ok: serde_json::Value = serde_json::json!({"result": "success"});
        assert!(is_error_result(&err));
        assert!(!is_error_result(&ok));
    }
}
