use thiserror::Error;

/// Errors raised by the account store
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Account {0} not found")]
    AccountNotFound(String),

    #[error("{0}")]
    Invalid(String),

    #[error("Storage backend failure: {0}")]
    Backend(String),
}

/// Transport-independent classification of a failure, mapped onto HTTP statuses at the edge
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    Unexpected,
}
