use thiserror::Error;

use crate::clients::AdLibraryError;

/// Errors surfaced by the search and page-ads services.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Upstream(AdLibraryError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<AdLibraryError> for ServiceError {
    fn from(err: AdLibraryError) -> Self {
        match err {
            AdLibraryError::InvalidArgument(_) => Self::Validation(err.to_string()),
            other => Self::Upstream(other),
        }
    }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        Self::Storage(format!("{err:#}"))
    }
}
