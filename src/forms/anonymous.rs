//! Anonymous feedback workflow
//!
//! A category selection and a free-text message, submitted as one record to
//! the `Anonymous` ledger. The whole record resets after a successful
//! submission and is retained after a failure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{InFlight, Notification, SubmitOutcome};
use crate::gateway::{GatewayOutcome, SubmissionGateway, SubmissionRequest};
use crate::types::{PortalError, Result};
use crate::validation::{
    validate_anonymous, ValidationErrors, CATEGORY_REQUIRED, FIELD_CATEGORY, FIELD_MESSAGE,
};

/// Destination ledger for anonymous records
pub const ANONYMOUS_DESTINATION: &str = "Anonymous";

const SUBMITTED_MESSAGE: &str = "Submission received. Thank you!";

/// Concern type for anonymous feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "General")]
    General,
    #[serde(rename = "Event Issue")]
    EventIssue,
    #[serde(rename = "Team Conflict")]
    TeamConflict,
    #[serde(rename = "Suggestion")]
    Suggestion,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::General,
        Category::EventIssue,
        Category::TeamConflict,
        Category::Suggestion,
    ];

    /// Label shown to the user and written to the ledger
    pub fn label(&self) -> &'static str {
        match self {
            Category::General => "General",
            Category::EventIssue => "Event Issue",
            Category::TeamConflict => "Team Conflict",
            Category::Suggestion => "Suggestion",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self> {
        Category::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                let mut errors = ValidationErrors::new();
                errors.insert(FIELD_CATEGORY, CATEGORY_REQUIRED);
                PortalError::Validation(errors)
            })
    }
}

/// Anonymous feedback record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousRecord {
    pub category: Option<Category>,
    pub message: String,
}

impl AnonymousRecord {
    /// Wire fields; an unset category is sent as an empty string
    pub fn to_fields(&self) -> Vec<(String, String)> {
        vec![
            (
                FIELD_CATEGORY.to_string(),
                self.category.map(|c| c.label()).unwrap_or_default().to_string(),
            ),
            (FIELD_MESSAGE.to_string(), self.message.clone()),
        ]
    }
}

/// Editable fields of the anonymous form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnonymousField {
    Category,
    Message,
}

impl AnonymousField {
    pub fn key(&self) -> &'static str {
        match self {
            AnonymousField::Category => FIELD_CATEGORY,
            AnonymousField::Message => FIELD_MESSAGE,
        }
    }
}

/// View state of the anonymous form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnonymousView {
    pub record: AnonymousRecord,
    pub errors: ValidationErrors,
    /// Submit control is disabled while set
    pub submitting: bool,
}

impl AnonymousView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a keystroke or selection. Unknown category labels unset the
    /// category. The edited field's error is cleared.
    pub fn apply_field_edit(&mut self, field: AnonymousField, value: &str) {
        match field {
            AnonymousField::Category => self.record.category = value.parse().ok(),
            AnonymousField::Message => self.record.message = value.to_string(),
        }
        self.errors.clear(field.key());
    }

    /// Replace the error set with a fresh validation pass
    pub fn apply_validation_result(&mut self, errors: ValidationErrors) {
        self.errors = errors;
    }

    pub fn apply_submit_started(&mut self) {
        self.submitting = true;
    }

    /// Success resets the record and errors; failure keeps everything
    pub fn apply_submit_outcome(&mut self, result: &Result<GatewayOutcome>) {
        if result.is_ok() {
            self.record = AnonymousRecord::default();
            self.errors = ValidationErrors::new();
        }
        self.submitting = false;
    }
}

/// Coordinates validate -> submit -> report -> reset for anonymous records
pub struct AnonymousOrchestrator<G: SubmissionGateway + ?Sized> {
    gateway: Arc<G>,
    in_flight: AtomicBool,
}

impl<G: SubmissionGateway + ?Sized> AnonymousOrchestrator<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            in_flight: AtomicBool::new(false),
        }
    }

    /// True while a submission is awaiting the gateway
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validate the view's record and, if valid, post it to the ledger
    pub async fn submit(&self, view: &mut AnonymousView, auth_token: Option<&str>) -> SubmitOutcome {
        let errors = validate_anonymous(&view.record);
        view.apply_validation_result(errors.clone());
        if !errors.is_valid() {
            debug!(fields = %errors, "Anonymous submission blocked by validation");
            return SubmitOutcome::Invalid(errors);
        }

        let Some(_claim) = InFlight::try_claim(&self.in_flight) else {
            debug!("Anonymous submission ignored while another is in flight");
            return SubmitOutcome::Busy;
        };
        view.apply_submit_started();

        let request = view
            .record
            .to_fields()
            .into_iter()
            .fold(SubmissionRequest::new(ANONYMOUS_DESTINATION), |req, (k, v)| {
                req.field(k, v)
            })
            .with_auth_token(auth_token);

        let result = self.gateway.submit(request).await;
        view.apply_submit_outcome(&result);

        match result {
            Ok(outcome) => {
                info!(confirmed = outcome.is_confirmed(), "Anonymous submission delivered");
                SubmitOutcome::Submitted {
                    outcome,
                    notification: Notification::success(SUBMITTED_MESSAGE),
                }
            }
            Err(error) => {
                warn!(error = %error, "Anonymous submission failed");
                let notification = Notification::error(error.user_message());
                SubmitOutcome::Failed {
                    error,
                    notification,
                }
            }
        }
    }
}
