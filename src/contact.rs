//! Contact form field validation.
//!
//! Each predicate returns the message to show next to the field, or `None`
//! when the value is acceptable. Nothing here sends anything.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContactForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub message: String,
}

/// Field name → message, in field order for stable output.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldErrors(pub BTreeMap<&'static str, &'static str>);

impl FieldErrors {
    pub fn get(&self, field: &str) -> Option<&'static str> {
        self.0.get(field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

pub fn validate_name(value: &str) -> Option<&'static str> {
    let v = value.trim();
    if v.is_empty() {
        Some("Name is required")
    } else if v.chars().count() < 2 {
        Some("Name must be at least 2 characters")
    } else {
        None
    }
}

pub fn validate_email(value: &str) -> Option<&'static str> {
    if value.trim().is_empty() {
        Some("Email is required")
    } else if !looks_like_email(value) {
        Some("Please enter a valid email address")
    } else {
        None
    }
}

pub fn validate_message(value: &str) -> Option<&'static str> {
    let v = value.trim();
    if v.is_empty() {
        Some("Message is required")
    } else if v.chars().count() < 10 {
        Some("Message must be at least 10 characters")
    } else {
        None
    }
}

/// `local@domain.tld`: no whitespace, exactly one `@`, and some dot in the
/// domain with at least one character on each side of it.
fn looks_like_email(value: &str) -> bool {
    if value.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    if local.is_empty() || domain.contains('@') {
        return false;
    }
    domain
        .match_indices('.')
        .any(|(dot, _)| dot > 0 && dot + 1 < domain.len())
}

/// Check every field; all problems are reported at once.
pub fn validate(form: &ContactForm) -> Result<(), FieldErrors> {
    let mut errors = BTreeMap::new();
    let checks: [(&'static str, Option<&'static str>); 3] = [
        ("name", validate_name(&form.name)),
        ("email", validate_email(&form.email)),
        ("message", validate_message(&form.message)),
    ];
    for (field, err) in checks {
        if let Some(msg) = err {
            errors.insert(field, msg);
        }
    }
    if errors.is_empty() {
        Ok(())
    } else {
        Err(FieldErrors(errors))
    }
}
