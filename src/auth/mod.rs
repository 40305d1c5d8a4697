//! Identity gating for the portal
//!
//! Provides:
//! - Local decoding of the third-party login assertion
//! - Organizational email-domain admission check
//! - Fire-and-forget audit of admitted identities

pub mod gate;

pub use gate::{IdentityClaims, IdentityGate, Session, VerifiedIdentity, DEFAULT_ALLOWED_DOMAIN};
