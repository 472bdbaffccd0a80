use std::collections::HashMap;

use crate::validator::Validator;

/// Typed accessors over a parsed query string, each falling back to a default.
pub struct QueryString<'a> {
    values: &'a HashMap<String, String>,
}

impl<'a> QueryString<'a> {
    pub fn new(values: &'a HashMap<String, String>) -> Self {
        Self { values }
    }

    pub fn read_string(&self, key: &str, default: &str) -> String {
        match self.values.get(key) {
            Some(s) if !s.is_empty() => s.clone(),
            _ => default.to_string(),
        }
    }

    /// Comma-separated list; an absent or empty value yields `default`.
    pub fn read_csv(&self, key: &str, default: Vec<String>) -> Vec<String> {
        match self.values.get(key) {
            Some(csv) if !csv.is_empty() => csv.split(',').map(|s| s.to_string()).collect(),
            _ => default,
        }
    }

    /// Parses an integer, recording a validation error and returning `default` on failure.
    pub fn read_int(&self, key: &str, default: i64, v: &mut Validator) -> i64 {
        match self.values.get(key) {
            Some(s) if !s.is_empty() => match s.parse::<i64>() {
                Ok(i) => i,
                Err(_) => {
                    v.add_error(key, "must be an integer value");
                    default
                }
            },
            _ => default,
        }
    }
}
