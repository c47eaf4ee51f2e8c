use thiserror::Error;

use shared_database::directory::DirectoryError;
use shared_models::error::AppError;

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("{0}")]
    Duplicate(String),

    #[error("Validator setup failed: {0}")]
    Pattern(#[from] regex::Error),

    #[error(transparent)]
    Directory(DirectoryError),
}

impl From<DirectoryError> for AccountError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::Duplicate(msg) => AccountError::Duplicate(msg),
            other => AccountError::Directory(other),
        }
    }
}

impl From<AccountError> for AppError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(msg) => AppError::ValidationError(msg),
            AccountError::Forbidden(msg) => AppError::Forbidden(msg),
            AccountError::NotFound(what) => AppError::NotFound(format!("{} not found", what)),
            AccountError::Duplicate(msg) => AppError::Conflict(msg),
            AccountError::Pattern(e) => AppError::Internal(e.to_string()),
            AccountError::Directory(e) => e.into(),
        }
    }
}
