//! Identity gate for login-restricted deployments
//!
//! The login widget hands over a signed JWT. It is decoded locally without
//! signature verification (the widget is the trusted party) and the `email`
//! claim is compared against one organizational domain suffix with a
//! literal `ends_with`.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::gateway::SubmissionGateway;
use crate::types::{PortalError, Result};

/// Suffix admitted when no domain is configured
pub const DEFAULT_ALLOWED_DOMAIN: &str = "@rishihood.edu.in";

/// Claims read from the login assertion
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IdentityClaims {
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sub: String,
    #[serde(default)]
    pub email_verified: Option<bool>,
    /// Hosted domain, when the provider reports one
    #[serde(default)]
    pub hd: Option<String>,
    #[serde(default)]
    pub picture: Option<String>,
}

/// Identity admitted by the gate. Held for the session, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifiedIdentity {
    pub display_name: String,
    pub email: String,
    pub subject_id: String,
}

impl From<IdentityClaims> for VerifiedIdentity {
    fn from(claims: IdentityClaims) -> Self {
        let display_name = claims
            .name
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| claims.email.clone());
        Self {
            display_name,
            email: claims.email,
            subject_id: claims.sub,
        }
    }
}

/// Admitted identity plus the raw assertion, forwarded as `auth_token`
#[derive(Debug, Clone)]
pub struct Session {
    identity: VerifiedIdentity,
    credential: String,
}

impl Session {
    pub fn identity(&self) -> &VerifiedIdentity {
        &self.identity
    }

    pub fn credential(&self) -> &str {
        &self.credential
    }
}

/// Admission check over login assertions
pub struct IdentityGate {
    allowed_suffix: String,
    audit: Option<Arc<dyn SubmissionGateway>>,
    pending_audits: Mutex<Vec<JoinHandle<()>>>,
}

impl IdentityGate {
    /// Create a gate for one domain suffix (e.g. `@org.edu`)
    pub fn new(allowed_suffix: impl Into<String>) -> Self {
        Self {
            allowed_suffix: allowed_suffix.into(),
            audit: None,
            pending_audits: Mutex::new(Vec::new()),
        }
    }

    /// Send admitted identities to this gateway's audit call
    pub fn with_audit(mut self, gateway: Arc<dyn SubmissionGateway>) -> Self {
        self.audit = Some(gateway);
        self
    }

    pub fn allowed_suffix(&self) -> &str {
        &self.allowed_suffix
    }

    /// Decode the assertion's claims without verifying its signature
    pub fn decode(&self, credential: &str) -> Result<IdentityClaims> {
        let mut validation = Validation::default();
        validation.insecure_disable_signature_validation();
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();

        let data = decode::<IdentityClaims>(
            credential.trim(),
            &DecodingKey::from_secret(&[]),
            &validation,
        )?;
        Ok(data.claims)
    }

    /// Decode and apply the domain check
    pub fn check(&self, credential: &str) -> Result<VerifiedIdentity> {
        let claims = self.decode(credential)?;
        if !claims.email.ends_with(&self.allowed_suffix) {
            warn!(suffix = %self.allowed_suffix, "Login rejected: email outside allowed domain");
            return Err(PortalError::IdentityRejected {
                email: claims.email,
            });
        }
        Ok(VerifiedIdentity::from(claims))
    }

    /// Admit the holder of `credential`.
    ///
    /// On success `on_admit` runs with the identity and raw credential, and
    /// the audit call is spawned without being awaited (see
    /// [`IdentityGate::flush_audits`]). On rejection
    /// `on_admit` is never called.
    pub fn admit<F>(&self, credential: &str, on_admit: F) -> Result<Session>
    where
        F: FnOnce(&VerifiedIdentity, &str),
    {
        let identity = self.check(credential)?;
        info!(subject = %identity.subject_id, "Login admitted");

        on_admit(&identity, credential);
        self.spawn_audit(identity.clone());

        Ok(Session {
            identity,
            credential: credential.trim().to_string(),
        })
    }

    fn spawn_audit(&self, identity: VerifiedIdentity) {
        let Some(gateway) = self.audit.clone() else {
            return;
        };

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(async move {
                    match gateway.log_user(&identity).await {
                        Ok(()) => debug!(subject = %identity.subject_id, "Audit log recorded"),
                        Err(e) => warn!(error = %e, "Audit log call failed"),
                    }
                });
                if let Ok(mut pending) = self.pending_audits.lock() {
                    pending.retain(|t| !t.is_finished());
                    pending.push(task);
                }
            }
            Err(_) => warn!("No async runtime available; audit log call skipped"),
        }
    }

    /// Wait for audit calls spawned by `admit` to finish.
    ///
    /// Short-lived callers run this before the runtime shuts down. Audit
    /// failures are logged, never returned.
    pub async fn flush_audits(&self) {
        let pending = match self.pending_audits.lock() {
            Ok(mut pending) => std::mem::take(&mut *pending),
            Err(_) => return,
        };
        for task in pending {
            if let Err(e) = task.await {
                warn!(error = %e, "Audit log task did not complete");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::MockGateway;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn credential(claims: serde_json::Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"widget-side-secret"),
        )
        .unwrap()
    }

    fn member() -> String {
        credential(json!({
            "email": "asha@org.edu",
            "name": "Asha Rao",
            "sub": "1098",
            "email_verified": true,
            "exp": 1
        }))
    }

    #[test]
    fn test_decode_ignores_signature_and_expiry() {
        let gate = IdentityGate::new("@org.edu");
        let claims = gate.decode(&member()).unwrap();
        assert_eq!(claims.email, "asha@org.edu");
        assert_eq!(claims.sub, "1098");
        assert_eq!(claims.email_verified, Some(true));
    }

    #[test]
    fn test_other_domain_rejected_without_callback() {
        let gate = IdentityGate::new("@org.edu");
        let outsider = credential(json!({"email": "a@otherdomain.com", "sub": "7"}));

        let mut called = false;
        let result = gate.admit(&outsider, |_, _| called = true);

        assert!(!called);
        match result {
            Err(PortalError::IdentityRejected { email }) => assert_eq!(email, "a@otherdomain.com"),
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_suffix_is_literal() {
        let gate = IdentityGate::new("@org.edu");
        let lookalike = credential(json!({"email": "a@evilorg.edu.com", "sub": "7"}));
        assert!(gate.check(&lookalike).is_err());
    }

    #[test]
    fn test_garbage_credential_is_invalid() {
        let gate = IdentityGate::new("@org.edu");
        let err = gate.check("not-a-jwt").unwrap_err();
        assert!(matches!(err, PortalError::InvalidCredential(_)));
        assert!(err.is_rejection());
    }

    #[test]
    fn test_missing_name_falls_back_to_email() {
        let gate = IdentityGate::new("@org.edu");
        let token = credential(json!({"email": "asha@org.edu", "sub": "1"}));
        let identity = gate.check(&token).unwrap();
        assert_eq!(identity.display_name, "asha@org.edu");
    }

    #[test]
    fn test_admit_without_runtime_skips_audit() {
        let mock = Arc::new(MockGateway::new());
        let gate = IdentityGate::new("@org.edu").with_audit(mock.clone());

        let mut seen = None;
        let session = gate
            .admit(&member(), |identity, _| seen = Some(identity.clone()))
            .unwrap();

        assert_eq!(seen.as_ref(), Some(session.identity()));
        assert!(mock.audits().is_empty());
    }

    #[tokio::test]
    async fn test_admit_forwards_identity_to_audit() {
        let mock = Arc::new(MockGateway::new());
        let gate = IdentityGate::new("@org.edu").with_audit(mock.clone());

        let token = member();
        let session = gate.admit(&token, |_, _| {}).unwrap();
        assert_eq!(session.credential(), token);

        gate.flush_audits().await;

        let audits = mock.audits();
        assert_eq!(audits.len(), 1);
        assert_eq!(audits[0].email, "asha@org.edu");
        assert_eq!(audits[0].display_name, "Asha Rao");
        assert_eq!(audits[0].subject_id, "1098");
    }

    #[tokio::test]
    async fn test_flush_waits_for_every_admission() {
        let mock = Arc::new(MockGateway::new());
        let gate = IdentityGate::new("@org.edu").with_audit(mock.clone());

        gate.admit(&member(), |_, _| {}).unwrap();
        gate.admit(&member(), |_, _| {}).unwrap();
        gate.flush_audits().await;
        assert_eq!(mock.audits().len(), 2);

        // nothing left to wait on
        gate.flush_audits().await;
    }
}
