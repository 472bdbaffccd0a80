use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashSet};
use std::hash::Hash;

use crate::error::ApiError;

/// Loose RFC 5322 shape check for email addresses.
pub static EMAIL_RX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)*$",
    )
    .expect("email pattern is valid")
});

/// Collects field-level validation failures, keeping the first message per field.
#[derive(Debug, Default, Clone)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Records `message` under `key` unless the key already has an entry.
    pub fn add_error(&mut self, key: &str, message: impl Into<String>) {
        if !self.errors.contains_key(key) {
            self.errors.insert(key.to_string(), message.into());
        }
    }

    pub fn check(&mut self, ok: bool, key: &str, message: impl Into<String>) {
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }

    /// Turns accumulated failures into a 422 response.
    pub fn finish(self) -> Result<(), ApiError> {
        if self.valid() {
            Ok(())
        } else {
            Err(ApiError::failed_validation(self.errors))
        }
    }
}

pub fn permitted_value<T: PartialEq + ?Sized>(value: &T, permitted: &[&T]) -> bool {
    permitted.iter().any(|p| *p == value)
}

pub fn matches(value: &str, rx: &Regex) -> bool {
    rx.is_match(value)
}

pub fn unique<T: Eq + Hash>(values: &[T]) -> bool {
    let mut seen = HashSet::with_capacity(values.len());
    values.iter().all(|v| seen.insert(v))
}
