//! JSON envelope shared by every endpoint and the HTTP error mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use doc_hub_core::error::DocsError;
use serde::{de::DeserializeOwned, Serialize};

#[derive(Debug, Serialize)]
pub struct ErrorPayload {
    pub code: u16,
    pub text: String,
}

/// Serialized as `{"error":..}`, `{"response":..}` or `{"data":..}`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Envelope<T> {
    Error(ErrorPayload),
    Response(T),
    Data(T),
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// An error reported to the client with a fixed status and a generic text.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    text: String,
}

impl ApiError {
    pub fn new(status: StatusCode, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    pub fn bad_request(text: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, text)
    }

    pub fn unauthorized(text: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, text)
    }

    pub fn internal(text: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, text)
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Client errors become 400. Everything else, not-found included,
    /// becomes 500 with `context` as the text.
    pub fn from_docs(err: &DocsError, context: &str) -> Self {
        let text = match err {
            DocsError::InvalidId(_) => "invalid document id",
            DocsError::MissingFile => "failed to get file",
            _ => context,
        };
        if err.is_client_error() {
            Self::bad_request(text)
        } else {
            Self::internal(text)
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Envelope::<()>::Error(ErrorPayload {
            code: self.status.as_u16(),
            text: self.text,
        });
        (self.status, body).into_response()
    }
}

/// Decode a JSON request body, reporting failures inside the envelope.
pub fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|_| ApiError::bad_request("failed to decode request"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn envelope_variants_serialize_as_single_key() {
        let v = serde_json::to_value(Envelope::Response(json!({"login": "alice123"}))).unwrap();
        assert_eq!(v, json!({"response": {"login": "alice123"}}));
        let v = serde_json::to_value(Envelope::Data(vec![1, 2])).unwrap();
        assert_eq!(v, json!({"data": [1, 2]}));
        let v = serde_json::to_value(Envelope::<()>::Error(ErrorPayload {
            code: 400,
            text: "bad".into(),
        }))
        .unwrap();
        assert_eq!(v, json!({"error": {"code": 400, "text": "bad"}}));
    }

    #[test]
    fn not_found_is_indistinguishable_from_store_failure() {
        let nf = ApiError::from_docs(&DocsError::NotFound, "failed to get document");
        let store = ApiError::from_docs(
            &DocsError::Query(doc_hub_core::error::RepoError::Unavailable("down".into())),
            "failed to get document",
        );
        assert_eq!(nf.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(nf.status(), store.status());
        assert_eq!(nf.text, store.text);
    }

    #[test]
    fn input_errors_are_bad_requests() {
        let err = ApiError::from_docs(&DocsError::InvalidId("x".into()), "ignored");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.text, "invalid document id");
        let err = ApiError::from_docs(&DocsError::MissingFile, "ignored");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
        assert_eq!(err.text, "failed to get file");
    }

    #[test]
    fn compensation_failure_is_internal() {
        let err = ApiError::from_docs(
            &DocsError::Compensation {
                key: "abc.txt".into(),
                persist: doc_hub_core::error::RepoError::Unavailable("down".into()),
                cleanup: doc_hub_core::error::BlobError::Unavailable("down".into()),
            },
            "failed to save document",
        );
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.text, "failed to save document");
    }
}
