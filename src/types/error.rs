//! Error types for the grievance portal
//!
//! Every error is scoped to a single user action. None of them is fatal to
//! the process; the user recovers by fixing input or re-triggering.

use crate::validation::ValidationErrors;

/// Notification text used when the gateway gives no usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Network error, please try again.";

/// Notification text shown when the identity gate refuses an account.
pub const ACCESS_RESTRICTED_MESSAGE: &str =
    "Access Restricted: Please use your college email ID.";

/// Main error type for portal operations
#[derive(Debug, thiserror::Error)]
pub enum PortalError {
    /// Local field validation failed; never sent over the wire
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// Required configuration is absent or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// The endpoint answered with a definite failure
    #[error("Transport error (status {status:?}): {}", .message.as_deref().unwrap_or("no message"))]
    Transport {
        status: Option<u16>,
        message: Option<String>,
    },

    /// The request failed in a way indistinguishable from an opaque
    /// cross-origin response. Only surfaced under `AmbiguousFailurePolicy::Report`.
    #[error("Ambiguous transport failure: {0}")]
    Ambiguous(String),

    /// The verified email is outside the allowed organizational domain
    #[error("Identity rejected: {email}")]
    IdentityRejected { email: String },

    /// The identity assertion could not be decoded
    #[error("Invalid credential: {0}")]
    InvalidCredential(String),

    /// The operation needs an admitted session
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
}

impl PortalError {
    /// Text for the failure notification shown to the user.
    ///
    /// Server-provided messages win; everything else collapses to the
    /// generic network message.
    pub fn user_message(&self) -> String {
        match self {
            Self::Transport {
                message: Some(message),
                ..
            } if !message.trim().is_empty() => message.clone(),
            Self::IdentityRejected { .. } | Self::InvalidCredential(_) => {
                ACCESS_RESTRICTED_MESSAGE.to_string()
            }
            Self::Unauthorized(reason) => reason.clone(),
            _ => GENERIC_FAILURE_MESSAGE.to_string(),
        }
    }

    /// True for the identity-gate rejection family
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::IdentityRejected { .. } | Self::InvalidCredential(_)
        )
    }
}

impl From<reqwest::Error> for PortalError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport {
            status: err.status().map(|s| s.as_u16()),
            message: None,
        }
    }
}

impl From<jsonwebtoken::errors::Error> for PortalError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        Self::InvalidCredential(format!("JWT error: {}", err))
    }
}

/// Result type alias for portal operations
pub type Result<T> = std::result::Result<T, PortalError>;
