//! Identified support workflow
//!
//! One identity block (name, roll number, email) feeds two sub-modes:
//! writing a grievance, and booking a meeting through the scheduling
//! widget. The identity is never reset after a submission so the user can
//! file several grievances, or file and then book, without retyping it.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::{InFlight, Notification, SubmitOutcome};
use crate::gateway::{GatewayOutcome, SubmissionGateway, SubmissionRequest};
use crate::types::Result;
use crate::validation::{
    validate_grievance, validate_identity, ValidationErrors, FIELD_EMAIL, FIELD_GRIEVANCE_TEXT,
    FIELD_NAME, FIELD_ROLL_NUMBER,
};

/// Destination ledger for identified grievances
pub const PUBLIC_DESTINATION: &str = "Public";

/// Default booking page for the scheduling widget
pub const DEFAULT_SCHEDULER_URL: &str = "https://calendly.com/rishi-a25377-nst/30min";

const SUBMITTED_MESSAGE: &str = "Grievance submitted successfully.";
const REVEALED_MESSAGE: &str = "Identity verified. Scheduler unlocked.";
const FIX_FIELDS_MESSAGE: &str = "Please fix the highlighted fields.";

/// Who is filing
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityRecord {
    pub name: String,
    pub roll_number: String,
    pub email: String,
}

/// Grievance body
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GrievanceRecord {
    pub grievance_text: String,
}

/// Sub-mode of the identified workflow
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicMode {
    /// "Write Grievance"
    #[default]
    Grievance,
    /// "Book Meeting"
    Meeting,
}

impl PublicMode {
    pub fn label(&self) -> &'static str {
        match self {
            PublicMode::Grievance => "Write Grievance",
            PublicMode::Meeting => "Book Meeting",
        }
    }
}

/// Editable fields of the identified form
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicField {
    Name,
    RollNumber,
    Email,
    GrievanceText,
}

impl PublicField {
    pub fn key(&self) -> &'static str {
        match self {
            PublicField::Name => FIELD_NAME,
            PublicField::RollNumber => FIELD_ROLL_NUMBER,
            PublicField::Email => FIELD_EMAIL,
            PublicField::GrievanceText => FIELD_GRIEVANCE_TEXT,
        }
    }
}

/// Values handed to the scheduling widget
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerPrefill {
    pub name: String,
    pub email: String,
}

/// View state of the identified form
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicView {
    pub identity: IdentityRecord,
    pub grievance: GrievanceRecord,
    pub mode: PublicMode,
    pub scheduler_revealed: bool,
    pub errors: ValidationErrors,
    pub submitting: bool,
}

impl PublicView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a keystroke; the edited field's error is cleared
    pub fn apply_field_edit(&mut self, field: PublicField, value: &str) {
        let value = value.to_string();
        match field {
            PublicField::Name => self.identity.name = value,
            PublicField::RollNumber => self.identity.roll_number = value,
            PublicField::Email => self.identity.email = value,
            PublicField::GrievanceText => self.grievance.grievance_text = value,
        }
        self.errors.clear(field.key());
    }

    /// Merge a validation pass into the visible errors
    pub fn apply_validation_result(&mut self, errors: ValidationErrors) {
        self.errors.merge(errors);
    }

    /// Switching sub-mode always hides the scheduler again
    pub fn apply_mode_change(&mut self, mode: PublicMode) {
        self.mode = mode;
        self.scheduler_revealed = false;
    }

    pub fn apply_submit_started(&mut self) {
        self.submitting = true;
    }

    /// Success clears the grievance text and errors; identity stays
    pub fn apply_submit_outcome(&mut self, result: &Result<GatewayOutcome>) {
        if result.is_ok() {
            self.grievance = GrievanceRecord::default();
            self.errors = ValidationErrors::new();
        }
        self.submitting = false;
    }

    /// True when the widget should be rendered
    pub fn scheduler_visible(&self) -> bool {
        self.scheduler_revealed && self.mode == PublicMode::Meeting
    }

    /// Prefill for the widget, only once it is visible
    pub fn scheduler_prefill(&self) -> Option<SchedulerPrefill> {
        self.scheduler_visible().then(|| SchedulerPrefill {
            name: self.identity.name.clone(),
            email: self.identity.email.clone(),
        })
    }
}

/// Coordinates validate -> submit -> report -> reset for grievances
pub struct GrievanceOrchestrator<G: SubmissionGateway + ?Sized> {
    gateway: Arc<G>,
    in_flight: AtomicBool,
}

impl<G: SubmissionGateway + ?Sized> GrievanceOrchestrator<G> {
    pub fn new(gateway: Arc<G>) -> Self {
        Self {
            gateway,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Validate identity and grievance together and, if both pass, post to
    /// the `Public` ledger
    pub async fn submit(&self, view: &mut PublicView, auth_token: Option<&str>) -> SubmitOutcome {
        let mut errors = validate_identity(&view.identity);
        errors.merge(validate_grievance(&view.grievance));
        view.apply_validation_result(errors.clone());
        if !errors.is_valid() {
            debug!(fields = %errors, "Grievance submission blocked by validation");
            return SubmitOutcome::Invalid(errors);
        }

        let Some(_claim) = InFlight::try_claim(&self.in_flight) else {
            debug!("Grievance submission ignored while another is in flight");
            return SubmitOutcome::Busy;
        };
        view.apply_submit_started();

        let request = SubmissionRequest::new(PUBLIC_DESTINATION)
            .field("name", view.identity.name.clone())
            .field("roll_number", view.identity.roll_number.clone())
            .field("email", view.identity.email.clone())
            .field("grievance_text", view.grievance.grievance_text.trim())
            .with_auth_token(auth_token);

        let result = self.gateway.submit(request).await;
        view.apply_submit_outcome(&result);

        match result {
            Ok(outcome) => {
                info!(confirmed = outcome.is_confirmed(), "Grievance delivered");
                SubmitOutcome::Submitted {
                    outcome,
                    notification: Notification::success(SUBMITTED_MESSAGE),
                }
            }
            Err(error) => {
                warn!(error = %error, "Grievance submission failed");
                let notification = Notification::error(error.user_message());
                SubmitOutcome::Failed {
                    error,
                    notification,
                }
            }
        }
    }
}

/// Third-party booking widget settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchedulerWidget {
    pub url: String,
    /// Hex colour without the leading `#`
    pub primary_color: String,
    pub hide_gdpr_banner: bool,
}

impl Default for SchedulerWidget {
    fn default() -> Self {
        Self {
            url: DEFAULT_SCHEDULER_URL.to_string(),
            primary_color: "2563eb".to_string(),
            hide_gdpr_banner: true,
        }
    }
}

impl SchedulerWidget {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Booking URL carrying prefill and page settings as query parameters
    pub fn booking_url(&self, prefill: &SchedulerPrefill) -> String {
        let separator = if self.url.contains('?') { '&' } else { '?' };
        let mut url = format!(
            "{}{}name={}&email={}&primary_color={}",
            self.url,
            separator,
            urlencoding::encode(&prefill.name),
            urlencoding::encode(&prefill.email),
            urlencoding::encode(&self.primary_color),
        );
        if self.hide_gdpr_banner {
            url.push_str("&hide_gdpr_banner=1");
        }
        url
    }
}

/// Gates the scheduling widget behind identity validation.
///
/// Makes no network call; the widget receives the already-validated name
/// and email as prefill.
#[derive(Debug, Clone, Default)]
pub struct SchedulerRevealGate {
    widget: SchedulerWidget,
}

impl SchedulerRevealGate {
    pub fn new(widget: SchedulerWidget) -> Self {
        Self { widget }
    }

    pub fn widget(&self) -> &SchedulerWidget {
        &self.widget
    }

    /// Validate identity and reveal the widget when it passes
    pub fn reveal(&self, view: &mut PublicView) -> Notification {
        let errors = validate_identity(&view.identity);
        let valid = errors.is_valid();
        view.apply_validation_result(errors);

        if valid {
            view.scheduler_revealed = true;
            info!("Scheduler revealed");
            Notification::success(REVEALED_MESSAGE)
        } else {
            view.scheduler_revealed = false;
            debug!("Scheduler reveal blocked by validation");
            Notification::error(FIX_FIELDS_MESSAGE)
        }
    }

    /// Booking URL for the view's identity, once revealed
    pub fn booking_url(&self, view: &PublicView) -> Option<String> {
        view.scheduler_prefill()
            .map(|prefill| self.widget.booking_url(&prefill))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::{MockGateway, MockResponse};
    use crate::validation::{EMAIL_INVALID, GRIEVANCE_TOO_SHORT, NAME_REQUIRED};

    fn identified_view() -> PublicView {
        let mut view = PublicView::new();
        view.apply_field_edit(PublicField::Name, "Asha Rao");
        view.apply_field_edit(PublicField::RollNumber, "R-101");
        view.apply_field_edit(PublicField::Email, "asha@org.edu");
        view
    }

    #[tokio::test]
    async fn test_grievance_success_keeps_identity() {
        let gateway = Arc::new(MockGateway::new());
        let orchestrator = GrievanceOrchestrator::new(gateway.clone());
        let mut view = identified_view();
        view.apply_field_edit(PublicField::GrievanceText, "  The lab is locked on weekends.  ");
        let identity_before = view.identity.clone();

        let outcome = orchestrator.submit(&mut view, Some("token-abc")).await;
        assert!(outcome.is_submitted());
        assert_eq!(
            outcome.notification().unwrap().message,
            "Grievance submitted successfully."
        );

        assert_eq!(view.identity, identity_before);
        assert_eq!(view.grievance.grievance_text, "");
        assert!(view.errors.is_empty());

        let sent = &gateway.submissions()[0];
        assert_eq!(sent.destination, PUBLIC_DESTINATION);
        assert_eq!(sent.get("roll_number"), Some("R-101"));
        assert_eq!(sent.get("grievance_text"), Some("The lab is locked on weekends."));
        assert_eq!(sent.auth_token.as_deref(), Some("token-abc"));
    }

    #[tokio::test]
    async fn test_grievance_failure_retains_record_and_reports_server_message() {
        let gateway = Arc::new(
            MockGateway::new().with_response(MockResponse::Reject("Sheet is locked".into())),
        );
        let orchestrator = GrievanceOrchestrator::new(gateway);
        let mut view = identified_view();
        view.apply_field_edit(PublicField::GrievanceText, "The lab is locked on weekends.");
        let identity_before = view.identity.clone();

        let outcome = orchestrator.submit(&mut view, None).await;
        let notification = outcome.notification().unwrap();
        assert!(!notification.is_success());
        assert_eq!(notification.message, "Sheet is locked");

        assert_eq!(view.identity, identity_before);
        assert_eq!(view.grievance.grievance_text, "The lab is locked on weekends.");
        assert!(!view.submitting);
        assert!(!orchestrator.is_in_flight());
    }

    #[tokio::test]
    async fn test_grievance_failure_without_message_uses_generic_text() {
        let gateway = Arc::new(MockGateway::new().with_response(MockResponse::RejectSilently));
        let orchestrator = GrievanceOrchestrator::new(gateway);
        let mut view = identified_view();
        view.apply_field_edit(PublicField::GrievanceText, "The lab is locked on weekends.");

        let outcome = orchestrator.submit(&mut view, None).await;
        assert!(matches!(outcome, SubmitOutcome::Failed { .. }));
        assert_eq!(
            outcome.notification().unwrap().message,
            "Network error, please try again."
        );
        assert_eq!(view.grievance.grievance_text, "The lab is locked on weekends.");
        assert!(!view.submitting);
        assert!(!orchestrator.is_in_flight());
    }

    #[tokio::test]
    async fn test_grievance_reports_identity_and_text_errors() {
        let gateway = Arc::new(MockGateway::new());
        let orchestrator = GrievanceOrchestrator::new(gateway.clone());
        let mut view = PublicView::new();
        view.apply_field_edit(PublicField::Email, "x@y");

        let outcome = orchestrator.submit(&mut view, None).await;
        assert!(matches!(outcome, SubmitOutcome::Invalid(_)));
        assert_eq!(gateway.call_count(), 0);
        assert_eq!(view.errors.get(FIELD_NAME), Some(NAME_REQUIRED));
        assert_eq!(view.errors.get(FIELD_EMAIL), Some(EMAIL_INVALID));
        assert_eq!(view.errors.get(FIELD_GRIEVANCE_TEXT), Some(GRIEVANCE_TOO_SHORT));
    }

    #[test]
    fn test_reveal_requires_valid_identity() {
        let gate = SchedulerRevealGate::default();
        let mut view = PublicView::new();
        view.apply_mode_change(PublicMode::Meeting);

        let notification = gate.reveal(&mut view);
        assert!(!notification.is_success());
        assert_eq!(notification.message, "Please fix the highlighted fields.");
        assert!(!view.scheduler_visible());
        assert!(gate.booking_url(&view).is_none());
    }

    #[test]
    fn test_reveal_is_not_sticky_across_mode_changes() {
        let gate = SchedulerRevealGate::default();
        let mut view = identified_view();
        view.apply_mode_change(PublicMode::Meeting);

        let notification = gate.reveal(&mut view);
        assert!(notification.is_success());
        assert!(view.scheduler_visible());

        view.apply_mode_change(PublicMode::Grievance);
        view.apply_mode_change(PublicMode::Meeting);
        assert!(!view.scheduler_visible());
        assert!(view.scheduler_prefill().is_none());
    }

    #[test]
    fn test_reveal_does_not_require_grievance_text() {
        let gate = SchedulerRevealGate::default();
        let mut view = identified_view();
        view.apply_mode_change(PublicMode::Meeting);

        assert!(gate.reveal(&mut view).is_success());
        assert_eq!(view.errors.get(FIELD_GRIEVANCE_TEXT), None);
    }

    #[test]
    fn test_booking_url_prefill() {
        let gate = SchedulerRevealGate::default();
        let mut view = identified_view();
        view.apply_mode_change(PublicMode::Meeting);
        gate.reveal(&mut view);

        let url = gate.booking_url(&view).unwrap();
        assert_eq!(
            url,
            "https://calendly.com/rishi-a25377-nst/30min?name=Asha%20Rao&email=asha%40org.edu&primary_color=2563eb&hide_gdpr_banner=1"
        );
    }

    #[test]
    fn test_edit_clears_field_error() {
        let mut view = PublicView::new();
        view.apply_validation_result(validate_identity(&view.identity));
        assert_eq!(view.errors.len(), 3);

        view.apply_field_edit(PublicField::Email, "a");
        assert_eq!(view.errors.get(FIELD_EMAIL), None);
        assert_eq!(view.errors.len(), 2);
    }
}
