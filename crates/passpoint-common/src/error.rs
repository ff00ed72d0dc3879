//! Error types for Passpoint profile management
//!
//! `PasspointError` is what the manager hands back to callers of the
//! profile operations. `CollaboratorError` is what the external systems
//! (credential store, trust verifier, persisted store) report to the core.

use thiserror::Error;

/// Common result type for profile operations
pub type Result<T> = std::result::Result<T, PasspointError>;

/// Profile management error
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PasspointError {
    /// Malformed or incomplete profile configuration
    #[error("invalid profile: {0}")]
    Validation(String),

    /// CA certificate failed trust verification
    #[error("CA certificate verification failed: {0}")]
    Trust(String),

    /// Caller is not allowed to replace or remove the profile
    #[error("caller is not authorized to modify profile {fqdn}")]
    Ownership { fqdn: String },

    /// Certificates or keys could not be installed
    #[error("credential installation failed: {0}")]
    Install(String),

    /// No profile for the given home domain
    #[error("profile not found: {0}")]
    NotFound(String),

    /// Persisted store rejected a write
    #[error("store error: {0}")]
    Store(String),
}

impl PasspointError {
    /// Shorthand for a validation failure
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Error reported by an external collaborator
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator rejected request: {0}")]
    Rejected(String),
}

impl From<CollaboratorError> for PasspointError {
    fn from(e: CollaboratorError) -> Self {
        Self::Store(e.to_string())
    }
}
