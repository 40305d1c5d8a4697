//! Configuration for the grievance portal
//!
//! CLI arguments and environment variable handling using clap. The binary
//! loads `.env` first, so every setting can come from the environment.

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::auth::DEFAULT_ALLOWED_DOMAIN;
use crate::forms::public::DEFAULT_SCHEDULER_URL;
use crate::gateway::AmbiguousFailurePolicy;
use crate::types::{PortalError, Result};

/// Grievance portal - anonymous feedback and identified grievances
#[derive(Parser, Debug, Clone)]
#[command(name = "grievance-portal")]
#[command(about = "Submit anonymous feedback or identified grievances to the club ledger")]
pub struct Args {
    /// Ledger script endpoint receiving form posts
    #[arg(long, env = "SCRIPT_URL")]
    pub script_url: Option<String>,

    /// Third-party login client identifier (required with --require-login)
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub client_id: Option<String>,

    /// Require an admitted login before any submission
    #[arg(long, env = "REQUIRE_LOGIN", default_value = "false")]
    pub require_login: bool,

    /// Email suffix admitted by the identity gate
    #[arg(long, env = "ALLOWED_EMAIL_DOMAIN", default_value = DEFAULT_ALLOWED_DOMAIN)]
    pub allowed_email_domain: String,

    /// Booking page for the meeting scheduler
    #[arg(long, env = "SCHEDULER_URL", default_value = DEFAULT_SCHEDULER_URL)]
    pub scheduler_url: String,

    /// What to do when a post fails ambiguously
    #[arg(long, env = "AMBIGUOUS_FAILURE_POLICY", value_enum, default_value_t = AmbiguousFailurePolicy::TreatAsSuccess)]
    pub ambiguous_failure: AmbiguousFailurePolicy,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Submit anonymous feedback
    Anonymous {
        /// General, "Event Issue", "Team Conflict" or Suggestion
        #[arg(long)]
        category: String,
        #[arg(long)]
        message: String,
        /// Login assertion, when login is required
        #[arg(long, env = "PORTAL_CREDENTIAL")]
        credential: Option<String>,
    },

    /// Submit an identified grievance
    Grievance {
        #[command(flatten)]
        identity: IdentityArgs,
        #[arg(long)]
        text: String,
        #[arg(long, env = "PORTAL_CREDENTIAL")]
        credential: Option<String>,
    },

    /// Validate identity and print the meeting booking link
    Book {
        #[command(flatten)]
        identity: IdentityArgs,
        #[arg(long, env = "PORTAL_CREDENTIAL")]
        credential: Option<String>,
    },

    /// Check a login assertion against the identity gate
    Verify {
        #[arg(long, env = "PORTAL_CREDENTIAL")]
        credential: String,
    },
}

/// Identity block for identified commands
#[derive(clap::Args, Debug, Clone)]
pub struct IdentityArgs {
    #[arg(long)]
    pub name: String,
    #[arg(long)]
    pub roll_number: String,
    #[arg(long)]
    pub email: String,
}

impl Args {
    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        self.portal_config()
            .validate()
            .map_err(|e| e.to_string())
    }

    /// Settings consumed by gateway and gate constructors
    pub fn portal_config(&self) -> PortalConfig {
        PortalConfig {
            script_url: self.script_url.clone().filter(|s| !s.trim().is_empty()),
            client_id: self.client_id.clone().filter(|s| !s.trim().is_empty()),
            require_login: self.require_login,
            allowed_email_domain: self.allowed_email_domain.clone(),
            scheduler_url: self.scheduler_url.clone(),
            ambiguous_failure: self.ambiguous_failure,
        }
    }
}

/// Portal settings injected at process start
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortalConfig {
    pub script_url: Option<String>,
    pub client_id: Option<String>,
    pub require_login: bool,
    pub allowed_email_domain: String,
    pub scheduler_url: String,
    pub ambiguous_failure: AmbiguousFailurePolicy,
}

impl Default for PortalConfig {
    fn default() -> Self {
        Self {
            script_url: None,
            client_id: None,
            require_login: false,
            allowed_email_domain: DEFAULT_ALLOWED_DOMAIN.to_string(),
            scheduler_url: DEFAULT_SCHEDULER_URL.to_string(),
            ambiguous_failure: AmbiguousFailurePolicy::default(),
        }
    }
}

impl PortalConfig {
    /// Check settings that do not depend on the action being performed.
    ///
    /// The endpoint itself is checked by `HttpGateway::new`.
    pub fn validate(&self) -> Result<()> {
        if self.require_login && self.client_id.is_none() {
            return Err(PortalError::Config(
                "GOOGLE_CLIENT_ID is required when login is required".into(),
            ));
        }

        if self.require_login && self.allowed_email_domain.trim().is_empty() {
            return Err(PortalError::Config(
                "ALLOWED_EMAIL_DOMAIN must not be empty when login is required".into(),
            ));
        }

        Ok(())
    }
}
