//! Domain error types
//!
//! This module defines error types for domain validation: malformed remote
//! paths, local paths that fall outside the sync root, and invalid policy
//! values.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid local path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Invalid remote path format
    #[error("Invalid remote path: {0}")]
    InvalidRemotePath(String),

    /// Path is not within the configured sync root
    #[error("Path not within sync root: {0}")]
    PathNotInSyncRoot(String),

    /// Generic validation failure
    #[error("Validation failed: {0}")]
    ValidationFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DomainError::InvalidPath("relative/path".to_string());
        assert_eq!(err.to_string(), "Invalid path: relative/path");

        let err = DomainError::InvalidRemotePath("no-slash".to_string());
        assert_eq!(err.to_string(), "Invalid remote path: no-slash");

        let err = DomainError::PathNotInSyncRoot("/etc/passwd".to_string());
        assert_eq!(err.to_string(), "Path not within sync root: /etc/passwd");
    }

    #[test]
    fn test_error_equality() {
        let err1 = DomainError::InvalidPath("/path".to_string());
        let err2 = DomainError::InvalidPath("/path".to_string());
        let err3 = DomainError::InvalidPath("/other".to_string());

        assert_eq!(err1, err2);
        assert_ne!(err1, err3);
    }
}
