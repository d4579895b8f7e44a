//! Error types for the lease container and property sources

use crate::backend::BackendError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ContainerError {
    #[error("Lease container has been stopped")]
    AlreadyStopped,

    #[error("Lease container must be started from within a Tokio runtime")]
    NoRuntime,

    #[error("Invalid lease configuration: {0}")]
    InvalidConfig(#[from] tenure_core::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl ContainerError {
    /// Backend error behind this failure, if any
    pub fn backend_error(&self) -> Option<&BackendError> {
        match self {
            ContainerError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum PropertySourceError {
    #[error("Secret not found at {path}")]
    NotFound { path: String },

    #[error("Secret at {path} is unavailable: {message}")]
    Unavailable { path: String, message: String },

    #[error(transparent)]
    Container(#[from] ContainerError),
}
