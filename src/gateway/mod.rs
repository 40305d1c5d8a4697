//! Submission gateway - the boundary to the spreadsheet-backed ledger
//!
//! Every record leaves the portal as a flat set of string form fields
//! posted to one configured endpoint. The destination label travels as the
//! `sheetName` field and an optional session credential as `auth_token`.
//!
//! ## Ambiguous failures
//!
//! A browser-style POST to the ledger endpoint can fail in a way that is
//! indistinguishable from a cross-origin response whose body was hidden.
//! The gateway treats those as delivered unless configured with
//! [`AmbiguousFailurePolicy::Report`]. Definite rejections (HTTP error
//! status, or an explicit error result in the body) are always reported.

pub mod http;
pub mod mock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::auth::VerifiedIdentity;
use crate::types::Result;

pub use http::HttpGateway;
pub use mock::{MockGateway, MockResponse};

/// Form field carrying the destination label
pub const SHEET_NAME_FIELD: &str = "sheetName";
/// Form field carrying the session credential
pub const AUTH_TOKEN_FIELD: &str = "auth_token";
/// Action value for the audit call
pub const LOG_USER_ACTION: &str = "logUser";

/// What to do with a failure that cannot be told apart from an opaque
/// cross-origin response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum AmbiguousFailurePolicy {
    /// Assume the write landed
    #[default]
    TreatAsSuccess,
    /// Surface it as `PortalError::Ambiguous`
    Report,
}

/// A single record addressed to one destination ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub destination: String,
    pub fields: Vec<(String, String)>,
    pub auth_token: Option<String>,
}

impl SubmissionRequest {
    pub fn new(destination: impl Into<String>) -> Self {
        Self {
            destination: destination.into(),
            fields: Vec::new(),
            auth_token: None,
        }
    }

    /// Append a data field
    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    /// Attach the session credential, if there is one
    pub fn with_auth_token(mut self, token: Option<&str>) -> Self {
        self.auth_token = token.map(str::to_string);
        self
    }

    /// Flatten into the wire field order: `sheetName`, data fields, `auth_token`
    pub fn form_fields(&self) -> Vec<(String, String)> {
        let mut out = Vec::with_capacity(self.fields.len() + 2);
        out.push((SHEET_NAME_FIELD.to_string(), self.destination.clone()));
        out.extend(self.fields.iter().cloned());
        if let Some(ref token) = self.auth_token {
            out.push((AUTH_TOKEN_FIELD.to_string(), token.clone()));
        }
        out
    }

    /// Value of a data field
    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

/// Successful gateway result
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayOutcome {
    /// The endpoint acknowledged the write
    Accepted { body: Option<serde_json::Value> },
    /// The request failed ambiguously and the policy assumed delivery
    AssumedDelivered { reason: String },
}

impl GatewayOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Fields of the audit call for an admitted identity
pub fn audit_fields(identity: &VerifiedIdentity) -> Vec<(String, String)> {
    vec![
        ("action".to_string(), LOG_USER_ACTION.to_string()),
        ("name".to_string(), identity.display_name.clone()),
        ("email".to_string(), identity.email.clone()),
        ("sub".to_string(), identity.subject_id.clone()),
    ]
}

/// Outbound boundary for record submission and audit logging
#[async_trait]
pub trait SubmissionGateway: Send + Sync {
    /// Post a record to its destination ledger
    async fn submit(&self, request: SubmissionRequest) -> Result<GatewayOutcome>;

    /// Record an admitted identity. Callers do not wait on this.
    async fn log_user(&self, identity: &VerifiedIdentity) -> Result<()>;
}
