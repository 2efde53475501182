// The closed failure taxonomy for the API client.
//
// Every way a request can fail is a variant here; nothing is surfaced as a
// bare transport or serde error. Encode/decode/network variants keep their
// source so callers can log the underlying cause.
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Invalid URL")]
    InvalidUrl,

    #[error("Invalid response")]
    InvalidResponse,

    #[error("Encoding failed: {0}")]
    EncodingFailed(#[source] serde_json::Error),

    #[error("Decoding failed: {0}")]
    DecodingFailed(#[source] serde_json::Error),

    #[error("Network error: {0}")]
    Network(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{0}")]
    BadRequest(String),

    #[error("{}", .message.as_deref().unwrap_or("You are not authorized to perform this action"))]
    Unauthorized { message: Option<String> },

    #[error("{}", .message.as_deref().unwrap_or("Access forbidden"))]
    Forbidden { message: Option<String> },

    #[error("{}", .message.as_deref().unwrap_or("Resource not found"))]
    NotFound { message: Option<String> },

    #[error("{}", .message.as_deref().unwrap_or("A conflict occurred"))]
    Conflict { message: Option<String> },

    #[error("Not modified - use cached data")]
    NotModified,

    #[error("Precondition failed - conflict detected (current ETag: {current_etag})")]
    PreconditionFailed { current_etag: String },

    #[error("Validation error: {}", format_validation_errors(.0))]
    ValidationError(HashMap<String, Vec<String>>),

    #[error("{}", .message.as_deref().unwrap_or("Server error occurred"))]
    ServerError { message: Option<String> },

    #[error("Unknown error: {0}")]
    UnknownError(u16),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn is_not_modified(&self) -> bool {
        matches!(self, ApiError::NotModified)
    }
}

fn format_validation_errors(errors: &HashMap<String, Vec<String>>) -> String {
    let mut messages: Vec<&str> = errors
        .values()
        .flatten()
        .map(String::as_str)
        .collect();
    // HashMap iteration order is arbitrary; sort for a stable message.
    messages.sort_unstable();
    messages.join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_messages_for_bare_variants() {
        let err = ApiError::Unauthorized { message: None };
        assert_eq!(
            err.to_string(),
            "You are not authorized to perform this action"
        );
        assert_eq!(
            ApiError::Forbidden { message: None }.to_string(),
            "Access forbidden"
        );
        assert_eq!(
            ApiError::NotFound { message: None }.to_string(),
            "Resource not found"
        );
        assert_eq!(ApiError::UnknownError(418).to_string(), "Unknown error: 418");
    }

    #[test]
    fn server_message_wins_when_present() {
        let err = ApiError::Conflict {
            message: Some("version mismatch".to_string()),
        };
        assert_eq!(err.to_string(), "version mismatch");
    }

    #[test]
    fn precondition_failed_carries_etag() {
        let err = ApiError::PreconditionFailed {
            current_etag: "\"v42\"".to_string(),
        };
        assert!(err.to_string().contains("\"v42\""));
    }

    #[test]
    fn validation_errors_join_all_field_messages() {
        let mut map = HashMap::new();
        map.insert(
            "email".to_string(),
            vec!["is invalid".to_string(), "is taken".to_string()],
        );
        let err = ApiError::ValidationError(map);
        assert_eq!(err.to_string(), "Validation error: is invalid, is taken");
    }

    #[test]
    fn decode_errors_keep_their_source() {
        use std::error::Error;
        let cause = serde_json::from_str::<u32>("not json").unwrap_err();
        let err = ApiError::DecodingFailed(cause);
        assert!(err.source().is_some());
    }
}
