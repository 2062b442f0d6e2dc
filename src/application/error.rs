//! Application-level errors (wraps domain errors)

use thiserror::Error;

use crate::domain::DomainError;

/// Application errors wrap domain errors and add manifest and config context.
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("{0}")]
    Domain(#[from] DomainError),

    #[error("manifest: resource '{resource}': {message}")]
    Manifest { resource: String, message: String },

    #[error("manifest parse error: {message}")]
    ManifestParse { message: String },

    #[error("config error: {message}")]
    Config { message: String },

    #[error("operation failed: {context}")]
    OperationFailed {
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl ApplicationError {
    pub(crate) fn manifest(resource: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Manifest {
            resource: resource.into(),
            message: message.into(),
        }
    }

    /// True if the error is a dependency cycle in the final build graph.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Domain(DomainError::CycleDetected { .. }))
    }
}

/// Result type for application layer operations.
pub type ApplicationResult<T> = Result<T, ApplicationError>;
