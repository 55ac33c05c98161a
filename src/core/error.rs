//! Authorization error types

use thiserror::Error;

/// Errors that can occur while compiling or evaluating index permissions
#[derive(Error, Debug)]
pub enum AuthzError {
    /// Automaton construction exceeded the determinization limit
    #[error("Automaton too complex: more than {states} states required")]
    TooComplex { states: usize },

    /// Client-facing rejection of a requested index pattern
    #[error("the provided index pattern [{pattern}] is too complex to be evaluated")]
    PatternTooComplex { pattern: String },

    /// Malformed name pattern
    #[error("Invalid pattern [{pattern}]: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Privilege name that is neither a known privilege nor an action pattern
    #[error("Unknown index privilege: {0}")]
    UnknownPrivilege(String),

    /// Failures-only privileges combined with data privileges in one set
    #[error("Cannot combine failures-only privileges with data privileges: {0}")]
    MixedSelectorPrivileges(String),

    /// Unknown `::selector` suffix
    #[error("Invalid index component selector: {0}")]
    InvalidSelector(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl AuthzError {
    /// Create an invalid pattern error
    pub fn invalid_pattern(pattern: impl Into<String>, reason: impl Into<String>) -> Self {
        AuthzError::InvalidPattern {
            pattern: pattern.into(),
            reason: reason.into(),
        }
    }

    /// Whether this error comes from the automaton state limit
    pub fn is_too_complex(&self) -> bool {
        matches!(
            self,
            AuthzError::TooComplex { .. } | AuthzError::PatternTooComplex { .. }
        )
    }
}

/// Result type alias for authorization operations
pub type AuthzResult<T> = Result<T, AuthzError>;
