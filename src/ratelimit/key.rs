//! Store keys for the IP and email windows.

use std::fmt;

use super::email::{normalize_email, DEFAULT_FORM_TYPE};

/// A key into the IP store.
///
/// Each form type gets its own counter for the same identifier; a request
/// without a form type is tracked under the bare identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IpKey {
    /// The caller identifier, usually a client IP
    pub identifier: String,
    /// Optional form type scope
    pub form_type: Option<String>,
}

impl IpKey {
    /// Create a new IP key. An empty form type is treated as absent.
    pub fn new(identifier: &str, form_type: Option<&str>) -> Self {
        Self {
            identifier: identifier.to_string(),
            form_type: form_type
                .filter(|f| !f.is_empty())
                .map(str::to_string),
        }
    }
}

impl fmt::Display for IpKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.form_type {
            Some(form_type) => write!(f, "{}:{}", self.identifier, form_type),
            None => f.write_str(&self.identifier),
        }
    }
}

/// A key into the email store, rendered as `email:{email}:{formType}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EmailKey {
    /// Lowercased, trimmed email address
    pub email: String,
    /// Form type the submission targets
    pub form_type: String,
}

impl EmailKey {
    /// Create a new email key, normalising the address.
    pub fn new(email: &str, form_type: Option<&str>) -> Self {
        Self {
            email: normalize_email(email),
            form_type: form_type
                .filter(|f| !f.is_empty())
                .unwrap_or(DEFAULT_FORM_TYPE)
                .to_string(),
        }
    }
}

impl fmt::Display for EmailKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "email:{}:{}", self.email, self.form_type)
    }
}
