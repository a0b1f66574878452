use common::helper::error_chain_fmt;

/// Checks that a required identity field holds something other than whitespace.
///
/// The value itself is kept untouched: it takes part in the point id derivation.
pub fn require_non_empty(field: &'static str, value: &str) -> Result<String, ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::EmptyField(field));
    }

    Ok(value.to_string())
}

#[derive(thiserror::Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("The field `{0}` is required and cannot be empty")]
    EmptyField(&'static str),
}

impl std::fmt::Debug for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}
