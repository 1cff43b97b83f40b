use serde::{Deserialize, Serialize};

/// Errors returned by remote org operations.
///
/// Every variant is fatal to the caller; nothing in sf-trace retries.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("transport error: {message}")]
    Transport { message: String },

    #[error("http status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("{code}: {message}")]
    Api { code: String, message: String },

    #[error("failed to decode response: {message}")]
    Decode { message: String },

    #[error("expected exactly one {sobject} record, found {found}")]
    UnexpectedRowCount { sobject: String, found: usize },
}

impl ApiError {
    /// Returns `true` when the remote side rejected the session credentials.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Status { status, .. } => *status == 401,
            Self::Api { code, .. } => code == "INVALID_SESSION_ID" || code == "INVALID_AUTH_HEADER",
            _ => false,
        }
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_recognised() {
        assert!(ApiError::Status {
            status: 401,
            message: "unauthorized".into()
        }
        .is_auth_failure());
        assert!(ApiError::Api {
            code: "INVALID_SESSION_ID".into(),
            message: "Session expired or invalid".into()
        }
        .is_auth_failure());
        assert!(!ApiError::Status {
            status: 500,
            message: "boom".into()
        }
        .is_auth_failure());
        assert!(!ApiError::transport("connection refused").is_auth_failure());
    }

    #[test]
    fn row_count_message_names_the_sobject() {
        let err = ApiError::UnexpectedRowCount {
            sobject: "User".into(),
            found: 0,
        };
        assert_eq!(err.to_string(), "expected exactly one User record, found 0");
    }
}
