use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("unauthorized")]
    Unauthorized,
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream service failure: {0}")]
    Upstream(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }

    pub fn upstream<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Upstream(err.to_string())
    }

    /// Message safe to show an end user. Upstream and internal details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ApiError::InvalidCredentials => "Invalid username or password".to_string(),
            ApiError::Unauthorized => "Please log in to continue".to_string(),
            ApiError::BadRequest(msg) | ApiError::NotFound(msg) => msg.clone(),
            ApiError::Upstream(_) => {
                "A backing service is unavailable right now. Please try again shortly.".to_string()
            }
            ApiError::Internal(_) => "Something went wrong while handling your request.".to_string(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidCredentials | ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match &self {
            ApiError::Upstream(detail) => tracing::warn!("Upstream failure: {}", detail),
            ApiError::Internal(detail) => tracing::error!("Internal error: {}", detail),
            _ => {}
        }

        let body = Json(json!({ "error": self.public_message() }));
        (self.status(), body).into_response()
    }
}
