use std::fmt;

pub type ValidationResult = Result<(), ValidationError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn not_digits(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(&field, format!("field '{}' must be all digits", field))
    }

    pub fn missing(field: impl Into<String>) -> Self {
        let field = field.into();
        Self::new(&field, format!("field '{}' is required", field))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_digits_mentions_field() {
        let err = ValidationError::not_digits("context_id");
        assert!(err.to_string().contains("context_id"));
        assert!(err.to_string().contains("digits"));
    }
}
