//! Mock gateway for testing.

use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::{AmbiguousFailurePolicy, GatewayOutcome, SubmissionGateway, SubmissionRequest};
use crate::auth::VerifiedIdentity;
use crate::types::{PortalError, Result};

/// How the mock answers a submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// Acknowledge the write
    Accept,
    /// Definite rejection carrying a server message
    Reject(String),
    /// Definite rejection with no usable body
    RejectSilently,
    /// Failure indistinguishable from an opaque response
    Ambiguous,
}

/// Mock gateway recording every call.
///
/// Configurable response, delay and ambiguous-failure policy.
pub struct MockGateway {
    response: Mutex<MockResponse>,
    policy: AmbiguousFailurePolicy,
    delay: Option<Duration>,
    submissions: Mutex<Vec<SubmissionRequest>>,
    audits: Mutex<Vec<VerifiedIdentity>>,
    call_count: AtomicU32,
}

impl MockGateway {
    /// Create a mock that accepts every submission
    pub fn new() -> Self {
        Self {
            response: Mutex::new(MockResponse::Accept),
            policy: AmbiguousFailurePolicy::default(),
            delay: None,
            submissions: Mutex::new(Vec::new()),
            audits: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// Set the response
    pub fn with_response(self, response: MockResponse) -> Self {
        self.set_response(response);
        self
    }

    /// Set the ambiguous-failure policy
    pub fn with_policy(mut self, policy: AmbiguousFailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Hold each submission open for `delay` before answering
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Change the response for subsequent calls
    pub fn set_response(&self, response: MockResponse) {
        if let Ok(mut slot) = self.response.lock() {
            *slot = response;
        }
    }

    /// Number of times submit was called
    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Submissions received so far
    pub fn submissions(&self) -> Vec<SubmissionRequest> {
        self.submissions
            .lock()
            .map(|s| s.clone())
            .unwrap_or_default()
    }

    /// Identities passed to the audit call so far
    pub fn audits(&self) -> Vec<VerifiedIdentity> {
        self.audits.lock().map(|a| a.clone()).unwrap_or_default()
    }

    fn current_response(&self) -> MockResponse {
        self.response
            .lock()
            .map(|r| r.clone())
            .unwrap_or(MockResponse::Accept)
    }
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SubmissionGateway for MockGateway {
    async fn submit(&self, request: SubmissionRequest) -> Result<GatewayOutcome> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut submissions) = self.submissions.lock() {
            submissions.push(request);
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        match self.current_response() {
            MockResponse::Accept => Ok(GatewayOutcome::Accepted { body: None }),
            MockResponse::Reject(message) => Err(PortalError::Transport {
                status: Some(500),
                message: Some(message),
            }),
            MockResponse::RejectSilently => Err(PortalError::Transport {
                status: None,
                message: None,
            }),
            MockResponse::Ambiguous => match self.policy {
                AmbiguousFailurePolicy::TreatAsSuccess => Ok(GatewayOutcome::AssumedDelivered {
                    reason: "mock ambiguous failure".into(),
                }),
                AmbiguousFailurePolicy::Report => {
                    Err(PortalError::Ambiguous("mock ambiguous failure".into()))
                }
            },
        }
    }

    async fn log_user(&self, identity: &VerifiedIdentity) -> Result<()> {
        if let Ok(mut audits) = self.audits.lock() {
            audits.push(identity.clone());
        }
        Ok(())
    }
}
