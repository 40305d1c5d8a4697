//! Grievance portal - client for a spreadsheet-backed grievance ledger
//!
//! Two workflows post form-encoded records to one external script endpoint:
//!
//! ## Workflows
//!
//! - **Anonymous**: category + message, no identity attached
//! - **Identified**: name, roll number and email shared by grievance
//!   submission and the meeting-scheduler reveal
//!
//! An optional identity gate restricts the whole portal to one
//! organizational email domain and audits each admitted login.

pub mod auth;
pub mod config;
pub mod forms;
pub mod gateway;
pub mod portal;
pub mod types;
pub mod validation;

pub use config::{Args, PortalConfig};
pub use gateway::{AmbiguousFailurePolicy, HttpGateway, SubmissionGateway};
pub use portal::{Portal, PortalTab};
pub use types::{PortalError, Result};
