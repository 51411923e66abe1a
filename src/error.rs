use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::utils::escape_html;

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: String,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: "Success".to_string(),
        }
    }

    pub fn error(message: String) -> Self {
        Self {
            success: false,
            data: None,
            message,
        }
    }
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("Invalid or expired token")]
    InvalidToken,
    #[error("Unauthorized access")]
    Unauthorized,
    #[error("Too many requests. Please wait a moment.")]
    RateLimited,
    #[error("{0}")]
    BadRequest(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ServiceResult<T> = Result<T, ServiceError>;

impl ServiceError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidToken => StatusCode::UNAUTHORIZED,
            ServiceError::Unauthorized => StatusCode::FORBIDDEN,
            ServiceError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            ServiceError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn public_message(&self) -> String {
        match self {
            ServiceError::Internal(e) => {
                tracing::error!("Internal error: {:#}", e);
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ServiceError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<()>::error(self.public_message());
        (status, Json(body)).into_response()
    }
}

/// Renders a failure as a bare terminal HTML page with nothing of the requested document.
pub struct ErrorPage(pub ServiceError);

impl From<ServiceError> for ErrorPage {
    fn from(error: ServiceError) -> Self {
        Self(error)
    }
}

impl IntoResponse for ErrorPage {
    fn into_response(self) -> Response {
        let status = self.0.status();
        let message = escape_html(&self.0.public_message());
        let page = format!(
            "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><title>Error</title></head>\
             <body><div class=\"error\"><h1>{}</h1><p>{}</p></div></body></html>",
            status.as_u16(),
            message
        );
        (status, Html(page)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(ServiceError::NotFound("Order".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ServiceError::InvalidToken.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ServiceError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(ServiceError::NotFound("Order".into()).to_string(), "Order not found");
    }
}
