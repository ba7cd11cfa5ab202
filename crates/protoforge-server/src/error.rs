use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use protoforge_gen::{GenError, LlmError};

pub type ApiResult<T> = Result<ApiResponse<T>, ApiError>;

/// Any failure surfaced to an API client, rendered as
/// `{success: false, error: {message, code}}`.
#[derive(Debug, thiserror::Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "VALIDATION_ERROR", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
    }
}

impl From<protoforge_core::Error> for ApiError {
    fn from(e: protoforge_core::Error) -> Self {
        use protoforge_core::Error;
        match e {
            Error::InvalidName(_) | Error::InvalidPath(_) => ApiError::validation(e.to_string()),
            Error::NotFound(_) => ApiError::not_found(e.to_string()),
            other => {
                tracing::error!(error = %other, "internal error");
                ApiError::internal(other.to_string())
            }
        }
    }
}

impl From<LlmError> for ApiError {
    fn from(e: LlmError) -> Self {
        match e {
            LlmError::Timeout(_) => {
                ApiError::new(StatusCode::GATEWAY_TIMEOUT, "LLM_TIMEOUT", e.to_string())
            }
            other => {
                tracing::warn!(error = %other, "llm call failed");
                ApiError::new(StatusCode::BAD_GATEWAY, "LLM_ERROR", other.to_string())
            }
        }
    }
}

impl From<GenError> for ApiError {
    fn from(e: GenError) -> Self {
        match e {
            GenError::Llm(e) => e.into(),
            GenError::Core(e) => e.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    message: &'a str,
    code: &'a str,
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: ErrorBody<'a>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorEnvelope {
            success: false,
            error: ErrorBody {
                message: &self.message,
                code: self.code,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

/// Success envelope: `{success: true, data}`.
pub struct ApiResponse<T>(pub T);

#[derive(Serialize)]
struct Envelope<T> {
    success: bool,
    data: T,
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        Json(Envelope {
            success: true,
            data: self.0,
        })
        .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn maps_error_sources_to_statuses() {
        let cases: Vec<(ApiError, StatusCode, &str)> = vec![
            (
                protoforge_core::Error::InvalidName("!!".into()).into(),
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
            ),
            (
                protoforge_core::Error::NotFound("shop/db.json".into()).into(),
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
            ),
            (
                LlmError::Timeout(Duration::from_secs(60)).into(),
                StatusCode::GATEWAY_TIMEOUT,
                "LLM_TIMEOUT",
            ),
            (
                GenError::Llm(LlmError::EmptyResponse).into(),
                StatusCode::BAD_GATEWAY,
                "LLM_ERROR",
            ),
            (
                protoforge_core::Error::Settings("bad".into()).into(),
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
            ),
        ];
        for (err, status, code) in cases {
            assert_eq!(err.status, status);
            assert_eq!(err.code, code);
        }
    }
}
