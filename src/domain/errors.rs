use thiserror::Error;

/// Failures of preference and retention operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Input the preference rules reject: user id length, category and site
    /// names, site URL schemes, icon hosts.
    #[error("invalid input: {0}")]
    Validation(String),
    /// Unknown user, category or site.
    #[error("{0}")]
    NotFound(String),
    /// A category or site name already taken in its scope, or a user id
    /// registered concurrently.
    #[error("already exists: {0}")]
    Conflict(String),
    /// Missing or wrong admin password.
    #[error("admin access denied: {0}")]
    Unauthorized(String),
    /// The preferences store could not read or persist documents.
    #[error("preferences store failure: {0}")]
    Storage(String),
}

impl DomainError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage(message.into())
    }
}
