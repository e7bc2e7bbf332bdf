use actix_web::{error, http::StatusCode, HttpResponse};
use derive_more::{Display, Error};
use log::error;
use serde::Serialize;
use std::fmt;
use utoipa::ToSchema;

/// The four error kinds a request can end in.
///
/// The message is what the client sees. `Internal` only ever carries a
/// generic per-operation message; build it with [`ApiError::internal`].
#[derive(Debug, Display, Error)]
pub enum ApiError {
    #[display("{_0}")]
    Validation(#[error(not(source))] String),

    #[display("{_0}")]
    Unauthorized(#[error(not(source))] String),

    #[display("{_0}")]
    NotFound(#[error(not(source))] String),

    #[display("{_0}")]
    Internal(#[error(not(source))] String),
}

impl ApiError {
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    /// Logs `err` and hides it behind `message`.
    pub fn internal(message: &str, err: impl fmt::Display) -> Self {
        error!("{message}: {err}");
        ApiError::Internal(message.to_string())
    }
}

/// JSON body of every error response.
#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub message: String,
}

impl error::ResponseError for ApiError {
    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        HttpResponse::build(status).json(ErrorBody {
            status_code: status.as_u16(),
            message: self.to_string(),
        })
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}
