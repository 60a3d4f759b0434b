//! Field-level validation errors, keyed by the request field they belong to.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

pub const DEFAULT_MAX_LEN: usize = 255;

#[derive(Clone, Eq, PartialEq, Debug, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn single(field: &str, message: impl Into<String>) -> Self {
        let mut errors = Self::new();
        errors.add(field, message);
        errors
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.0
            .entry(field.to_owned())
            .or_default()
            .push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// `Ok(value)` if nothing was recorded, otherwise the collected errors.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }

    /// Human readable summary: the first message plus a count of the rest.
    #[must_use]
    pub fn summary(&self) -> String {
        let mut messages = self.0.values().flatten();
        let Some(first) = messages.next() else {
            return "The given data was invalid.".to_owned();
        };

        match messages.count() {
            0 => first.clone(),
            1 => format!("{first} (and 1 more error)"),
            rest => format!("{first} (and {rest} more errors)"),
        }
    }
}

impl Display for ValidationErrors {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.summary())
    }
}

impl std::error::Error for ValidationErrors {}

/// A request field as the client sent it.
///
/// Non-string JSON is kept rather than failing the whole body, so it can be
/// reported against its field.
#[derive(Clone, Eq, PartialEq, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldInput {
    Text(String),
    Other(Value),
}

impl FieldInput {
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Other(_) => None,
        }
    }
}

impl From<String> for FieldInput {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&str> for FieldInput {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

/// Like [`required`], but first checks that the field holds a string.
pub fn required_string<'a>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&'a FieldInput>,
) -> Option<&'a str> {
    match value {
        Some(FieldInput::Other(_)) => {
            errors.add(field, format!("The {field} field must be a string."));
            None
        }
        value => required(errors, field, value.and_then(FieldInput::as_text)),
    }
}

/// Checks that `value` is present and not blank, recording an error otherwise.
pub fn required<'a>(
    errors: &mut ValidationErrors,
    field: &str,
    value: Option<&'a str>,
) -> Option<&'a str> {
    match value {
        Some(value) if !value.trim().is_empty() => Some(value),
        _ => {
            errors.add(field, format!("The {field} field is required."));
            None
        }
    }
}

/// Checks that `value` has at most `max` characters, recording an error otherwise.
pub fn max_chars(errors: &mut ValidationErrors, field: &str, value: &str, max: usize) -> bool {
    if value.chars().count() <= max {
        true
    } else {
        errors.add(
            field,
            format!("The {field} field must not be greater than {max} characters."),
        );
        false
    }
}

pub fn min_chars(errors: &mut ValidationErrors, field: &str, value: &str, min: usize) -> bool {
    if value.chars().count() >= min {
        true
    } else {
        errors.add(
            field,
            format!("The {field} field must be at least {min} characters."),
        );
        false
    }
}
