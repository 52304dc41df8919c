use thiserror::Error;

use crate::domain::{ErrorKind, StoreError};
use crate::token::TokenError;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PinError {
    #[error("pin not found")]
    NotFound,

    #[error("pin expired")]
    Expired,

    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("at least one audience is required")]
    NoAudiences,

    #[error("unknown audience in {0:?}")]
    UnknownAudience(Vec<String>),

    #[error("no free pin after {0} attempts")]
    Exhausted(usize),

    #[error("pin delivery failed: {0}")]
    Delivery(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Token(#[from] TokenError),
}

impl PinError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PinError::NotFound => ErrorKind::NotFound,
            PinError::Expired | PinError::InvalidSignature(_) => ErrorKind::Unauthorized,
            PinError::InvalidRequest(_) | PinError::NoAudiences | PinError::UnknownAudience(_) => {
                ErrorKind::BadRequest
            }
            PinError::Store(StoreError::AccountNotFound(_)) => ErrorKind::NotFound,
            PinError::Store(StoreError::Invalid(_)) => ErrorKind::BadRequest,
            PinError::Token(e) => e.kind(),
            PinError::Exhausted(_) | PinError::Delivery(_) | PinError::Store(_) => {
                ErrorKind::Unexpected
            }
        }
    }
}
