use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use trekora_core::EngineError;

/// HTTP wrapper around the engine's error taxonomy. The body always
/// carries the human-readable message plus the machine-readable kind;
/// internal failures hide their message and are logged instead.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub EngineError);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let (status, message) = match &self.0 {
            EngineError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            EngineError::Rule(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg.clone()),
            EngineError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            EngineError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            EngineError::Invariant(_) | EngineError::Storage(_) => {
                tracing::error!("Internal Server Error: {}", self.0);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
        };

        let body = Json(json!({
            "error": message,
            "kind": kind,
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_violations_map_to_422() {
        let response =
            ApiError(EngineError::Rule("No credits remaining".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[test]
    fn test_internal_errors_hide_details() {
        let response =
            ApiError(EngineError::Storage("connection reset".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn test_conflicts_map_to_409() {
        let response = ApiError(EngineError::Conflict("retry".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }
}
