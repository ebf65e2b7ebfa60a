use thiserror::Error;

/// Errors produced by parameter resolution, generation and matching.
///
/// `Clone` because one regeneration outcome is delivered to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("Invalid parameter `{field}`: {message}")]
    InvalidParameter { field: String, message: String },

    #[error("Generation failed: {0}")]
    GenerationFailure(String),
}

impl SnapshotError {
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        SnapshotError::InvalidParameter {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Offending field name for validation errors
    pub fn field(&self) -> Option<&str> {
        match self {
            SnapshotError::InvalidParameter { field, .. } => Some(field),
            SnapshotError::GenerationFailure(_) => None,
        }
    }
}
