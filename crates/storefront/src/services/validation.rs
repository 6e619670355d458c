//! Form validation errors keyed by field name.

use std::collections::BTreeMap;

use serde::Serialize;

/// Validation messages per form field.
///
/// Fields are reported in the order their rules run; each field lists its
/// messages in rule order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Messages for a field (empty when the field is valid).
    #[must_use]
    pub fn get(&self, field: &str) -> &[String] {
        self.0.get(field).map_or(&[], Vec::as_slice)
    }

    /// First message for a field, for inline display under an input.
    #[must_use]
    pub fn first(&self, field: &str) -> Option<&str> {
        self.get(field).first().map(String::as_str)
    }

    #[must_use]
    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    /// `Ok(value)` when no errors were recorded.
    ///
    /// # Errors
    ///
    /// Returns `self` when any field failed.
    pub fn into_result<T>(self, value: T) -> Result<T, Self> {
        if self.is_empty() { Ok(value) } else { Err(self) }
    }
}

/// Check a trimmed, required text field's length in characters.
///
/// Records at most one message: the required message when blank, otherwise
/// the first length rule that fails.
pub fn check_length(
    errors: &mut FieldErrors,
    field: &'static str,
    label: &str,
    value: &str,
    min: usize,
    max: usize,
) {
    let len = value.chars().count();
    if len == 0 {
        errors.add(field, format!("{label} is required"));
    } else if len < min {
        errors.add(field, format!("{label} must be at least {min} characters"));
    } else if len > max {
        errors.add(field, format!("{label} must be at most {max} characters"));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_field_errors_accumulate() {
        let mut errors = FieldErrors::new();
        assert!(errors.is_empty());
        errors.add("email", "Email is required");
        errors.add("email", "Please enter a valid email address");
        assert_eq!(errors.get("email").len(), 2);
        assert_eq!(errors.first("email"), Some("Email is required"));
        assert!(errors.get("name").is_empty());
        assert!(errors.has("email"));
    }

    #[test]
    fn test_check_length() {
        let mut errors = FieldErrors::new();
        check_length(&mut errors, "name", "Full name", "", 2, 100);
        check_length(&mut errors, "city", "City", "X", 2, 100);
        check_length(&mut errors, "line1", "Address", "1 Main St", 2, 100);
        assert_eq!(errors.first("name"), Some("Full name is required"));
        assert_eq!(
            errors.first("city"),
            Some("City must be at least 2 characters")
        );
        assert!(!errors.has("line1"));
    }

    #[test]
    fn test_serializes_as_map() {
        let mut errors = FieldErrors::new();
        errors.add("password", "Password is required");
        let json = serde_json::to_value(&errors).unwrap();
        assert_eq!(json["password"][0], "Password is required");
    }
}
