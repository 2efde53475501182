// Wire shapes shared between the client and its callers.
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Success envelope some endpoints wrap their payload in.
///
/// Decoding is attempted against this shape first; when the body is the bare
/// payload instead, `success` is missing and deserialization falls through to
/// the direct shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: Option<T>,
    pub message: Option<String>,
    pub success: bool,
}

/// Error envelope returned by 4xx/5xx endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorResponse {
    pub success: bool,
    pub data: Option<String>,
    pub message: String,
}

/// Legacy error shape still emitted by a few 400 responses.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    pub details: Option<String>,
}

/// 422 envelope: a field -> messages map.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationErrorResponse {
    pub message: String,
    pub errors: HashMap<String, Vec<String>>,
}

/// Outcome of a conditional request.
///
/// `data` is `None` exactly when `not_modified` is set; `etag` is the
/// server's current tag (or the caller-supplied one on a 304 without an
/// `ETag` header). Produced once per request and never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EtagResponse<T> {
    pub data: Option<T>,
    pub etag: String,
    pub not_modified: bool,
}

impl<T> EtagResponse<T> {
    pub fn not_modified(etag: String) -> Self {
        Self {
            data: None,
            etag,
            not_modified: true,
        }
    }

    pub fn loaded(data: T, etag: String) -> Self {
        Self {
            data: Some(data),
            etag,
            not_modified: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Widget {
        id: u32,
    }

    #[test]
    fn envelope_decodes_with_null_fields() {
        let body = r#"{"data":{"id":3},"message":null,"success":true}"#;
        let env: ApiResponse<Widget> = serde_json::from_str(body).unwrap();
        assert!(env.success);
        assert_eq!(env.data, Some(Widget { id: 3 }));
    }

    #[test]
    fn bare_payload_is_not_an_envelope() {
        // No `success` field, so the envelope shape must be rejected.
        let body = r#"{"id":3}"#;
        assert!(serde_json::from_str::<ApiResponse<Widget>>(body).is_err());
        assert_eq!(
            serde_json::from_str::<Widget>(body).unwrap(),
            Widget { id: 3 }
        );
    }

    #[test]
    fn validation_envelope_decodes_field_map() {
        let body = r#"{"message":"Validation failed","errors":{"name":["too short"]}}"#;
        let env: ValidationErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(env.errors["name"], vec!["too short".to_string()]);
    }
}
