//! Error types for the domain layer.

use thiserror::Error;

/// Errors that occur during value object construction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Field '{field}' cannot be empty")]
    EmptyField { field: String },

    #[error("Field '{field}' must be between {min} and {max}, got {actual}")]
    OutOfRange {
        field: String,
        min: String,
        max: String,
        actual: String,
    },

    #[error("Field '{field}' has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

impl ValidationError {
    /// Creates an empty field validation error.
    pub fn empty_field(field: impl Into<String>) -> Self {
        ValidationError::EmptyField { field: field.into() }
    }

    /// Creates an out of range validation error.
    pub fn out_of_range(
        field: impl Into<String>,
        min: impl ToString,
        max: impl ToString,
        actual: impl ToString,
    ) -> Self {
        ValidationError::OutOfRange {
            field: field.into(),
            min: min.to_string(),
            max: max.to_string(),
            actual: actual.to_string(),
        }
    }

    /// Creates an invalid format validation error.
    pub fn invalid_format(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ValidationError::InvalidFormat {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_field_displays_correctly() {
        let err = ValidationError::empty_field("desired_outcome");
        assert_eq!(format!("{}", err), "Field 'desired_outcome' cannot be empty");
    }

    #[test]
    fn out_of_range_displays_fractional_bounds() {
        let err = ValidationError::out_of_range("relevance", 0.0, 1.0, 1.5);
        assert_eq!(
            format!("{}", err),
            "Field 'relevance' must be between 0 and 1, got 1.5"
        );
    }

    #[test]
    fn invalid_format_displays_correctly() {
        let err = ValidationError::invalid_format("state_transition", "Closed is terminal");
        assert_eq!(
            format!("{}", err),
            "Field 'state_transition' has invalid format: Closed is terminal"
        );
    }
}
