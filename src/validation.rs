//! Field validation for portal forms
//!
//! Validators are pure and never fail: they return an empty
//! `ValidationErrors` when every checked field passes. Identity checks run
//! unconditionally so that every invalid field is reported at once.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::LazyLock;

use crate::forms::anonymous::{AnonymousRecord, Category};
use crate::forms::public::{GrievanceRecord, IdentityRecord};

/// Minimum trimmed length for free-text fields
pub const MIN_MESSAGE_LEN: usize = 10;

pub const FIELD_CATEGORY: &str = "category";
pub const FIELD_MESSAGE: &str = "message";
pub const FIELD_NAME: &str = "name";
pub const FIELD_ROLL_NUMBER: &str = "rollNumber";
pub const FIELD_EMAIL: &str = "email";
pub const FIELD_GRIEVANCE_TEXT: &str = "grievanceText";

pub const CATEGORY_REQUIRED: &str = "Please select a category.";
pub const MESSAGE_TOO_SHORT: &str = "Message should be at least 10 characters.";
pub const NAME_REQUIRED: &str = "Name is required.";
pub const ROLL_NUMBER_REQUIRED: &str = "Roll number is required.";
pub const EMAIL_REQUIRED: &str = "Email is required.";
pub const EMAIL_INVALID: &str = "Enter a valid email address.";
pub const GRIEVANCE_TOO_SHORT: &str = "Please describe the issue (min 10 characters).";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is a valid regex")
});

/// Field name -> optional message.
///
/// A key mapped to `None` is a field whose error was cleared by an edit.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(BTreeMap<String, Option<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an error for a field
    pub fn insert(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.insert(field.into(), Some(message.into()));
    }

    /// Clear the error for a field, keeping the key
    pub fn clear(&mut self, field: &str) {
        if let Some(slot) = self.0.get_mut(field) {
            *slot = None;
        }
    }

    /// Overlay every key of `other` onto this set
    pub fn merge(&mut self, other: ValidationErrors) {
        self.0.extend(other.0);
    }

    /// Current message for a field, if any
    pub fn get(&self, field: &str) -> Option<&str> {
        self.0.get(field).and_then(|m| m.as_deref())
    }

    /// True when no field carries a message
    pub fn is_valid(&self) -> bool {
        self.0.values().all(Option::is_none)
    }

    /// Number of fields currently carrying a message
    pub fn len(&self) -> usize {
        self.0.values().filter(|m| m.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Names of the fields currently carrying a message
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0
            .iter()
            .filter(|(_, m)| m.is_some())
            .map(|(k, _)| k.as_str())
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (field, message) in self.0.iter() {
            if let Some(message) = message {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{}: {}", field, message)?;
                first = false;
            }
        }
        Ok(())
    }
}

/// Length in UTF-16 code units, matching what the form widget counts
fn trimmed_len(text: &str) -> usize {
    text.trim().encode_utf16().count()
}

/// Check a free-text field against a minimum trimmed length
pub fn validate_message_like(
    text: &str,
    field: &str,
    min_len: usize,
    message: &str,
) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if trimmed_len(text) < min_len {
        errors.insert(field, message);
    }
    errors
}

/// Category is a required selection
pub fn validate_category(category: Option<Category>) -> ValidationErrors {
    let mut errors = ValidationErrors::new();
    if category.is_none() {
        errors.insert(FIELD_CATEGORY, CATEGORY_REQUIRED);
    }
    errors
}

/// Validate the shared identity block (name, roll number, email)
pub fn validate_identity(identity: &IdentityRecord) -> ValidationErrors {
    let mut errors = ValidationErrors::new();

    if identity.name.trim().is_empty() {
        errors.insert(FIELD_NAME, NAME_REQUIRED);
    }
    if identity.roll_number.trim().is_empty() {
        errors.insert(FIELD_ROLL_NUMBER, ROLL_NUMBER_REQUIRED);
    }
    if identity.email.trim().is_empty() {
        errors.insert(FIELD_EMAIL, EMAIL_REQUIRED);
    } else if !is_valid_email(&identity.email) {
        errors.insert(FIELD_EMAIL, EMAIL_INVALID);
    }

    errors
}

/// Basic `local@domain.tld` shape check
pub fn is_valid_email(email: &str) -> bool {
    EMAIL_PATTERN.is_match(email)
}

/// Category and message for the anonymous form
pub fn validate_anonymous(record: &AnonymousRecord) -> ValidationErrors {
    let mut errors = validate_category(record.category);
    errors.merge(validate_message_like(
        &record.message,
        FIELD_MESSAGE,
        MIN_MESSAGE_LEN,
        MESSAGE_TOO_SHORT,
    ));
    errors
}

/// Free-text grievance body
pub fn validate_grievance(record: &GrievanceRecord) -> ValidationErrors {
    validate_message_like(
        &record.grievance_text,
        FIELD_GRIEVANCE_TEXT,
        MIN_MESSAGE_LEN,
        GRIEVANCE_TOO_SHORT,
    )
}
