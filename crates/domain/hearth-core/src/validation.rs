use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Last validation failure for one submission: per-field messages plus
/// messages about the form as a whole.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors {
    pub field_errors: BTreeMap<String, Vec<String>>,
    pub form_errors: Vec<String>,
}

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_field(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.field_errors
            .entry(field.into())
            .or_default()
            .push(message.into());
    }

    pub fn add_form(&mut self, message: impl Into<String>) {
        self.form_errors.push(message.into());
    }

    pub fn with_field(mut self, field: impl Into<String>, message: impl Into<String>) -> Self {
        self.add_field(field, message);
        self
    }

    pub fn with_form(mut self, message: impl Into<String>) -> Self {
        self.add_form(message);
        self
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.field_errors
            .get(field)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.form_errors.is_empty() && self.field_errors.values().all(Vec::is_empty)
    }
}
