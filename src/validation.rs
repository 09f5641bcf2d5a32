use crate::errors::ValidationError;

/// A trait that request payloads implement for validation.
pub trait Validate {
    /// Validates the payload and returns the first failure.
    fn validate(&self) -> Result<(), ValidationError>;
}

/// Struct for configuring validations in a fluent style
#[derive(Default)]
pub struct ValidationBuilder<T> {
    field_name: String,
    value: Option<T>,
    errors: Vec<ValidationError>,
}

/// Generic validation implementations
impl<T> ValidationBuilder<T> {
    pub fn new(field_name: &str, value: Option<T>) -> Self {
        Self {
            field_name: field_name.to_string(),
            value,
            errors: Vec::new(),
        }
    }

    pub fn required(mut self) -> Self
    where T: Default + PartialEq {
        if self.value.is_none() || self.value == Some(T::default()) {
            self.errors.push(ValidationError::required(&self.field_name));
        }
        self
    }

    /// Complete validation and return the first error, if any
    pub fn validate(self) -> Result<(), ValidationError> {
        match self.errors.into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// String-specific validations
impl ValidationBuilder<String> {
    /// Whitespace-only values count as missing.
    pub fn not_blank(mut self) -> Self {
        if let Some(value) = &self.value {
            if !value.is_empty() && value.trim().is_empty() {
                self.errors.push(ValidationError::required(&self.field_name));
            }
        }
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_rejects_missing_and_empty() {
        let missing = ValidationBuilder::<String>::new("record_type", None).required().validate();
        assert_eq!(missing, Err(ValidationError::required("record_type")));

        let empty = ValidationBuilder::new("record_type", Some(String::new())).required().validate();
        assert_eq!(empty, Err(ValidationError::required("record_type")));
    }

    #[test]
    fn test_not_blank_rejects_whitespace() {
        let result = ValidationBuilder::new("record_type", Some("   ".to_string()))
            .required()
            .not_blank()
            .validate();
        assert!(result.is_err());
    }

    #[test]
    fn test_valid_value_passes() {
        let result = ValidationBuilder::new("record_type", Some("article".to_string()))
            .required()
            .not_blank()
            .validate();
        assert!(result.is_ok());
    }
}
