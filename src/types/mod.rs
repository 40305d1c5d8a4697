//! Shared types for the portal

pub mod error;

pub use error::{PortalError, Result, ACCESS_RESTRICTED_MESSAGE, GENERIC_FAILURE_MESSAGE};
