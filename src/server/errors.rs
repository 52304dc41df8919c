use axum::http::StatusCode;
use thiserror::Error;

use crate::domain::ErrorKind;
use crate::pin::PinError;
use crate::token::TokenError;

/// Failures of the REST endpoints. Session protocol errors never get here,
/// they travel inside `session_error` envelopes.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("missing or malformed bearer token")]
    MissingToken,
    #[error("admin role required")]
    Forbidden,
    #[error(transparent)]
    Pin(#[from] PinError),
    #[error(transparent)]
    Token(#[from] TokenError),
}

impl AppError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            AppError::BadRequest(_) => ErrorKind::BadRequest,
            AppError::MissingToken => ErrorKind::Unauthorized,
            AppError::Forbidden => ErrorKind::Forbidden,
            AppError::Pin(e) => e.kind(),
            AppError::Token(e) => e.kind(),
        }
    }

    pub fn status(&self) -> StatusCode {
        match self.kind() {
            ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Forbidden => StatusCode::FORBIDDEN,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unexpected => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for AppError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
