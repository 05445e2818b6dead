use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde::{Deserialize, Serialize};
use smartbi_core::SmartBiError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] SmartBiError),

    /// Request body is well-formed JSON but fails field validation.
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    InvalidRequest(String),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub detail: String,
}

impl ApiError {
    fn error_type(&self) -> &'static str {
        match self {
            ApiError::Core(e) => e.kind(),
            ApiError::Validation(_) => "validation_error",
            ApiError::InvalidRequest(_) => "invalid_request",
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Core(e) => match e {
                SmartBiError::UploadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
                SmartBiError::ModelNotConfigured => StatusCode::SERVICE_UNAVAILABLE,
                e if e.is_validation() => StatusCode::BAD_REQUEST,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("{}", self);
        } else {
            tracing::warn!("{}", self);
        }

        HttpResponse::build(status).json(ErrorResponse {
            error: self.error_type().to_string(),
            detail: self.to_string(),
        })
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
