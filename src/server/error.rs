//! HTTP mapping of the error taxonomy.

use crate::error::KvissError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

impl IntoResponse for KvissError {
    fn into_response(self) -> Response {
        if let KvissError::DependencyViolation { message, resources } = &self {
            return (
                StatusCode::CONFLICT,
                Json(json!({
                    "error": "dependency_violation",
                    "message": message,
                    "dependent_resources": resources,
                })),
            )
                .into_response();
        }

        let (status, error_code) = match &self {
            KvissError::Validation(_) | KvissError::InvalidUrl(_) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR")
            }
            KvissError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            KvissError::Duplicate(_) => (StatusCode::CONFLICT, "DUPLICATE"),
            KvissError::LlmUnavailable(_) => (StatusCode::SERVICE_UNAVAILABLE, "LLM_UNAVAILABLE"),
            KvissError::ProviderUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "PROVIDER_UNAVAILABLE")
            }
            KvissError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "TIMEOUT"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        if status.is_server_error() {
            error!("Request failed: {}", self);
        }

        (
            status,
            Json(json!({
                "error_code": error_code,
                "message": self.to_string(),
            })),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DependentResource;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (KvissError::Validation("bad".into()), StatusCode::BAD_REQUEST),
            (KvissError::InvalidUrl("bad".into()), StatusCode::BAD_REQUEST),
            (KvissError::NotFound("gone".into()), StatusCode::NOT_FOUND),
            (KvissError::Duplicate("again".into()), StatusCode::CONFLICT),
            (
                KvissError::LlmUnavailable("down".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                KvissError::TranscriptionFailed("x".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }

    #[tokio::test]
    async fn test_dependency_violation_body() {
        let err = KvissError::DependencyViolation {
            message: "Video has dependents".into(),
            resources: vec![DependentResource::new("transcription", 3)],
        };

        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["error"], "dependency_violation");
        assert_eq!(body["dependent_resources"][0]["type"], "transcription");
        assert_eq!(body["dependent_resources"][0]["id"], 3);
    }
}
