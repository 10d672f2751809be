use thiserror::Error;

use crate::database::StoreError;

/// Failure taxonomy shared by every service
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// A multi-document mutation failed and was rolled back
    #[error("Transaction failed: {source}")]
    TransactionFailure {
        #[source]
        source: StoreError,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ServiceError {
    pub fn not_found(what: impl Into<String>) -> Self {
        ServiceError::NotFound(what.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ServiceError::Forbidden(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    pub fn transaction(source: StoreError) -> Self {
        ServiceError::TransactionFailure { source }
    }
}

pub type ServiceResult<T> = Result<T, ServiceError>;
