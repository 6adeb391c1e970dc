//! Drupebox Dropbox - Dropbox API v2 client
//!
//! Provides async client for:
//! - OAuth2 authentication (no-redirect Authorization Code with PKCE, offline
//!   refresh tokens)
//! - Listing, change feeds and cursors (`files/list_folder*`)
//! - Uploads, downloads, deletes and folder creation
//!
//! ## Modules
//!
//! - [`auth`] - OAuth2 PKCE flow and access-token refresh
//! - [`client`] - HTTP client for the RPC and content endpoints
//! - [`files`] - Wire types and file operations
//! - [`provider`] - [`IRemoteStorage`](drupebox_core::ports::IRemoteStorage) implementation

pub mod auth;
pub mod client;
pub mod files;
pub mod provider;

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur when communicating with the Dropbox API
#[derive(Debug, Error)]
pub enum DropboxError {
    /// Access token missing, invalid or expired
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The path does not exist (`path_lookup/not_found` and friends)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any other endpoint-specific API error (HTTP 409), with its summary
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Rate limit exceeded; retry after the specified duration
    #[error("Too many requests, retry after {retry_after:?}")]
    TooManyRequests {
        /// Duration to wait before retrying
        retry_after: Duration,
    },

    /// A server-side error occurred (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// A network-level error occurred
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The API response could not be parsed or was malformed
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl DropboxError {
    /// Whether retrying the same request later may succeed
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::TooManyRequests { .. } | Self::ServerError(_) | Self::Network(_)
        )
    }
}
