//! Form workflows
//!
//! Each workflow keeps an explicit view-state record and pure transition
//! functions (`apply_*`) so state changes can be driven without a renderer.
//! Orchestrators sequence validate -> submit -> report -> reset on top of
//! those transitions.
//!
//! - **anonymous**: category + message, posted to the `Anonymous` ledger
//! - **public**: identity block shared by grievance submission and the
//!   scheduler reveal

pub mod anonymous;
pub mod public;

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::gateway::GatewayOutcome;
use crate::types::PortalError;
use crate::validation::ValidationErrors;

pub use anonymous::{
    AnonymousField, AnonymousOrchestrator, AnonymousRecord, AnonymousView, Category,
    ANONYMOUS_DESTINATION,
};
pub use public::{
    GrievanceOrchestrator, GrievanceRecord, IdentityRecord, PublicField, PublicMode, PublicView,
    SchedulerPrefill, SchedulerRevealGate, SchedulerWidget, PUBLIC_DESTINATION,
};

/// Severity of a user-facing notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Success,
    Error,
}

/// Toast shown after an action completes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub level: NotificationLevel,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.level == NotificationLevel::Success
    }
}

/// Result of one submit trigger
#[derive(Debug)]
pub enum SubmitOutcome {
    /// Gateway accepted (or assumed delivery); workflow fields were reset
    Submitted {
        outcome: GatewayOutcome,
        notification: Notification,
    },
    /// Validation blocked the attempt; no gateway call was made
    Invalid(ValidationErrors),
    /// Gateway failed; the record was retained
    Failed {
        error: PortalError,
        notification: Notification,
    },
    /// Another submission from the same orchestrator is in flight
    Busy,
}

impl SubmitOutcome {
    /// Notification to display, if the outcome has one
    pub fn notification(&self) -> Option<&Notification> {
        match self {
            Self::Submitted { notification, .. } | Self::Failed { notification, .. } => {
                Some(notification)
            }
            Self::Invalid(_) | Self::Busy => None,
        }
    }

    pub fn is_submitted(&self) -> bool {
        matches!(self, Self::Submitted { .. })
    }
}

/// Claim on an orchestrator's in-flight flag, released on drop
pub(crate) struct InFlight<'a> {
    flag: &'a AtomicBool,
}

impl<'a> InFlight<'a> {
    /// Claim the flag, or `None` if a submission already holds it
    pub(crate) fn try_claim(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_in_flight_is_exclusive_and_released() {
        let flag = AtomicBool::new(false);

        let first = InFlight::try_claim(&flag);
        assert!(first.is_some());
        assert!(InFlight::try_claim(&flag).is_none());

        drop(first);
        assert!(!flag.load(Ordering::SeqCst));
        assert!(InFlight::try_claim(&flag).is_some());
    }

    #[test]
    fn test_outcome_notifications() {
        assert!(SubmitOutcome::Busy.notification().is_none());
        assert!(SubmitOutcome::Invalid(ValidationErrors::new())
            .notification()
            .is_none());

        let failed = SubmitOutcome::Failed {
            error: PortalError::Ambiguous("x".into()),
            notification: Notification::error("Network error, please try again."),
        };
        assert!(!failed.notification().unwrap().is_success());
    }
}
