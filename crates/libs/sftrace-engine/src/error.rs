use sftrace_tooling::{ApiError, SoqlError};

/// Failures surfaced by the engine. None of them are retried.
#[derive(Clone, Debug, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum TraceError {
    #[error("User not found: {identity}")]
    UserNotFound { identity: String },

    #[error("Debug level not found: {name}")]
    DebugLevelNotFound { name: String },

    #[error("Invalid duration \"{expression}\" supplied")]
    InvalidDuration { expression: String },

    #[error("Cannot query an undefined value (field {field})")]
    MissingQueryValue { field: String },

    #[error("failed to format {field} timestamp: {message}")]
    Timestamp { field: String, message: String },

    #[error(transparent)]
    Remote(#[from] ApiError),
}

impl From<SoqlError> for TraceError {
    fn from(err: SoqlError) -> Self {
        match err {
            SoqlError::MissingValue { field } => Self::MissingQueryValue { field },
        }
    }
}
