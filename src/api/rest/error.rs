use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::analyst::error::AnalystError;

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Configuration(String),
    Upstream(String),
    Internal(anyhow::Error),
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Configuration(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Configuration error: {}", msg),
            ),
            ApiError::Upstream(msg) => (
                StatusCode::BAD_GATEWAY,
                format!("Inference service error: {}", msg),
            ),
            ApiError::Internal(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Internal error: {}", e),
            ),
        };
        (status, Json(ErrorResponse { message })).into_response()
    }
}

impl From<AnalystError> for ApiError {
    fn from(e: AnalystError) -> Self {
        match e {
            AnalystError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            AnalystError::Configuration(msg) => ApiError::Configuration(msg),
            AnalystError::Upstream(msg) => ApiError::Upstream(msg),
            other => ApiError::Internal(anyhow::Error::new(other)),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(e: anyhow::Error) -> Self {
        ApiError::Internal(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn analyst_errors_map_to_status_codes() {
        let cases = [
            (
                AnalystError::InvalidRequest("questions.txt is required".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                AnalystError::Configuration("no url".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
            (
                AnalystError::Upstream("429".into()),
                StatusCode::BAD_GATEWAY,
            ),
            (
                AnalystError::Execution("spawn failed".into()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            let response = ApiError::from(err).into_response();
            assert_eq!(response.status(), status);
        }
    }
}
