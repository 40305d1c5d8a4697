//! Portal shell - tab selection, optional login gate, and both workflows
//!
//! When an identity gate is installed, every action is refused until a
//! login has been admitted. The admitted credential travels as
//! `auth_token` on identified grievances only; anonymous feedback never
//! carries it.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use crate::auth::{IdentityGate, Session, VerifiedIdentity};
use crate::forms::{
    AnonymousOrchestrator, AnonymousView, GrievanceOrchestrator, Notification, PublicMode,
    PublicView, SchedulerRevealGate, SchedulerWidget, SubmitOutcome,
};
use crate::gateway::SubmissionGateway;
use crate::types::{PortalError, Result};

/// Top-level tabs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortalTab {
    #[default]
    Anonymous,
    Public,
}

impl PortalTab {
    pub const ALL: [PortalTab; 2] = [PortalTab::Anonymous, PortalTab::Public];

    pub fn label(&self) -> &'static str {
        match self {
            PortalTab::Anonymous => "Anonymous Feedback",
            PortalTab::Public => "Identified Support",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            PortalTab::Anonymous => "Share concerns without revealing your identity.",
            PortalTab::Public => "Submit a grievance or request a meeting.",
        }
    }
}

/// The whole client: login state, active tab and both form workflows
pub struct Portal<G: SubmissionGateway + ?Sized> {
    gate: Option<IdentityGate>,
    session: Option<Session>,
    tab: PortalTab,
    anonymous: AnonymousView,
    public: PublicView,
    anonymous_orchestrator: AnonymousOrchestrator<G>,
    grievance_orchestrator: GrievanceOrchestrator<G>,
    reveal: SchedulerRevealGate,
}

impl<G: SubmissionGateway + ?Sized> Portal<G> {
    /// Create an ungated portal over one gateway
    pub fn new(gateway: Arc<G>, scheduler: SchedulerWidget) -> Self {
        Self {
            gate: None,
            session: None,
            tab: PortalTab::default(),
            anonymous: AnonymousView::new(),
            public: PublicView::new(),
            anonymous_orchestrator: AnonymousOrchestrator::new(Arc::clone(&gateway)),
            grievance_orchestrator: GrievanceOrchestrator::new(gateway),
            reveal: SchedulerRevealGate::new(scheduler),
        }
    }

    /// Require an admitted login before any action
    pub fn with_identity_gate(mut self, gate: IdentityGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Run a login assertion through the gate.
    ///
    /// Without a gate there is nothing to log into and the call is refused.
    pub fn login(&mut self, credential: &str) -> Result<&VerifiedIdentity> {
        let gate = self
            .gate
            .as_ref()
            .ok_or_else(|| PortalError::Config("Login is not enabled for this portal".into()))?;

        let session = gate.admit(credential, |identity, _| {
            info!(subject = %identity.subject_id, "Session started");
        })?;
        Ok(self.session.insert(session).identity())
    }

    /// Identity of the current session, if any
    pub fn identity(&self) -> Option<&VerifiedIdentity> {
        self.session.as_ref().map(Session::identity)
    }

    fn ensure_admitted(&self) -> Result<()> {
        if self.gate.is_some() && self.session.is_none() {
            return Err(PortalError::Unauthorized(
                "Please sign in with your college email to continue.".into(),
            ));
        }
        Ok(())
    }

    fn credential(&self) -> Option<&str> {
        self.session.as_ref().map(Session::credential)
    }

    pub fn tab(&self) -> PortalTab {
        self.tab
    }

    pub fn select_tab(&mut self, tab: PortalTab) {
        self.tab = tab;
    }

    pub fn anonymous_view(&self) -> &AnonymousView {
        &self.anonymous
    }

    pub fn anonymous_view_mut(&mut self) -> &mut AnonymousView {
        &mut self.anonymous
    }

    pub fn public_view(&self) -> &PublicView {
        &self.public
    }

    pub fn public_view_mut(&mut self) -> &mut PublicView {
        &mut self.public
    }

    pub fn scheduler(&self) -> &SchedulerRevealGate {
        &self.reveal
    }

    /// Switch the identified workflow's sub-mode
    pub fn set_public_mode(&mut self, mode: PublicMode) {
        self.public.apply_mode_change(mode);
    }

    /// Borrow both workflows at once so their submissions can overlap
    pub fn workflows(&mut self) -> Result<(AnonymousWorkflow<'_, G>, GrievanceWorkflow<'_, G>)> {
        self.ensure_admitted()?;
        let anonymous = AnonymousWorkflow {
            orchestrator: &self.anonymous_orchestrator,
            view: &mut self.anonymous,
        };
        let grievance = GrievanceWorkflow {
            orchestrator: &self.grievance_orchestrator,
            view: &mut self.public,
            auth_token: self.session.as_ref().map(Session::credential),
        };
        Ok((anonymous, grievance))
    }

    pub async fn submit_anonymous(&mut self) -> Result<SubmitOutcome> {
        let (mut anonymous, _) = self.workflows()?;
        Ok(anonymous.submit().await)
    }

    pub async fn submit_grievance(&mut self) -> Result<SubmitOutcome> {
        let (_, mut grievance) = self.workflows()?;
        Ok(grievance.submit().await)
    }

    /// Wait for login audit calls still in flight
    pub async fn flush_audits(&self) {
        if let Some(gate) = &self.gate {
            gate.flush_audits().await;
        }
    }

    pub fn reveal_scheduler(&mut self) -> Result<Notification> {
        self.ensure_admitted()?;
        Ok(self.reveal.reveal(&mut self.public))
    }

    /// Booking link once the scheduler is revealed
    pub fn booking_url(&self) -> Option<String> {
        self.reveal.booking_url(&self.public)
    }

    /// True when the caller holds a credential for submissions
    pub fn is_authenticated(&self) -> bool {
        self.credential().is_some()
    }
}

/// Anonymous form borrowed out of a [`Portal`]
pub struct AnonymousWorkflow<'a, G: SubmissionGateway + ?Sized> {
    orchestrator: &'a AnonymousOrchestrator<G>,
    view: &'a mut AnonymousView,
}

impl<G: SubmissionGateway + ?Sized> AnonymousWorkflow<'_, G> {
    pub fn view(&mut self) -> &mut AnonymousView {
        &mut *self.view
    }

    /// Anonymous records never carry the session credential
    pub async fn submit(&mut self) -> SubmitOutcome {
        self.orchestrator.submit(&mut *self.view, None).await
    }
}

/// Identified form borrowed out of a [`Portal`], with the session credential
pub struct GrievanceWorkflow<'a, G: SubmissionGateway + ?Sized> {
    orchestrator: &'a GrievanceOrchestrator<G>,
    view: &'a mut PublicView,
    auth_token: Option<&'a str>,
}

impl<G: SubmissionGateway + ?Sized> GrievanceWorkflow<'_, G> {
    pub fn view(&mut self) -> &mut PublicView {
        &mut *self.view
    }

    pub async fn submit(&mut self) -> SubmitOutcome {
        self.orchestrator.submit(&mut *self.view, self.auth_token).await
    }
}
