use serde::{Deserialize, Serialize};
use std::fmt;

pub type DataResult<T> = Result<T, DataError>;

/// Everything the data layer can hand back across its public boundary.
/// Callers branch on the variant; nothing in this workspace panics or
/// unwinds across it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DataError {
    /// One or more field-scoped problems; the caller can re-prompt.
    #[error("validation failed: {0}")]
    Validation(ValidationErrors),

    /// The session lacks the named capability. Nothing was performed.
    #[error("not authorized: {capability}")]
    Authorization { capability: String },

    /// Failure at the transaction boundary. The underlying driver
    /// message is preserved for diagnostics; the transaction was
    /// rolled back.
    #[error("storage error: {0}")]
    Storage(String),

    /// A referenced id does not resolve to an existing row.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
}

impl DataError {
    pub fn storage(err: impl fmt::Display) -> Self {
        DataError::Storage(err.to_string())
    }

    pub fn not_found(entity: &'static str, id: i64) -> Self {
        DataError::NotFound { entity, id }
    }
}

/// A single field-scoped validation message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

/// Ordered collection of field errors, in schema declaration order.
/// Guaranteed non-empty when returned from validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    pub fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError {
            field: field.to_string(),
            message: message.into(),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, e) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{}: {}", e.field, e.message)?;
        }
        Ok(())
    }
}

impl From<ValidationErrors> for DataError {
    fn from(errs: ValidationErrors) -> Self {
        DataError::Validation(errs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_errors_display_joins_fields() {
        let mut errs = ValidationErrors::default();
        errs.push("title", "is required");
        errs.push("duration_min", "must be at least 1");
        assert_eq!(
            errs.to_string(),
            "title: is required; duration_min: must be at least 1"
        );
    }

    #[test]
    fn storage_error_preserves_driver_message() {
        let err = DataError::storage("UNIQUE constraint failed: users.id");
        assert_eq!(
            err.to_string(),
            "storage error: UNIQUE constraint failed: users.id"
        );
    }
}
