use thiserror::Error;

/// Errors from repository operations (used by trait definitions in parley-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Caller-facing error taxonomy for generation and conversation management.
///
/// Every variant carries a human-readable message suitable for display.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChatError {
    /// Missing or invalid caller identity, or an invalid provider credential.
    #[error("{0}")]
    Unauthenticated(String),

    /// The caller does not own the referenced conversation.
    #[error("{0}")]
    PermissionDenied(String),

    #[error("{0}")]
    InvalidArgument(String),

    /// Incomplete provider configuration, or quota/billing exhaustion.
    #[error("{0}")]
    FailedPrecondition(String),

    /// Provider rate limiting.
    #[error("{0}")]
    ResourceExhausted(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Internal(String),
}

impl ChatError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ChatError::Unauthenticated(_) => "UNAUTHENTICATED",
            ChatError::PermissionDenied(_) => "PERMISSION_DENIED",
            ChatError::InvalidArgument(_) => "INVALID_ARGUMENT",
            ChatError::FailedPrecondition(_) => "FAILED_PRECONDITION",
            ChatError::ResourceExhausted(_) => "RESOURCE_EXHAUSTED",
            ChatError::NotFound(_) => "NOT_FOUND",
            ChatError::Internal(_) => "INTERNAL",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ChatError::Unauthenticated(m)
            | ChatError::PermissionDenied(m)
            | ChatError::InvalidArgument(m)
            | ChatError::FailedPrecondition(m)
            | ChatError::ResourceExhausted(m)
            | ChatError::NotFound(m)
            | ChatError::Internal(m) => m,
        }
    }
}
