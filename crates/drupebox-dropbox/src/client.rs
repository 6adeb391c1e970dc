//! Dropbox API v2 HTTP client
//!
//! Dropbox splits its API across two hosts: RPC endpoints take and return
//! JSON bodies, content endpoints carry file bytes in the body and the JSON
//! arguments in the `Dropbox-API-Arg` header. [`DropboxClient`] builds
//! authenticated requests for both and turns error statuses into
//! [`DropboxError`]s.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use drupebox_dropbox::client::DropboxClient;
//! use drupebox_dropbox::files;
//! use drupebox_core::domain::paths::RemotePath;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = DropboxClient::new("access-token-here");
//! let entries = files::list_folder(&client, &RemotePath::root(), true).await?;
//! println!("{} entries", entries.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::DropboxError;

/// Base URL for RPC-style endpoints
const RPC_BASE_URL: &str = "https://api.dropboxapi.com/2";

/// Base URL for content upload/download endpoints
const CONTENT_BASE_URL: &str = "https://content.dropboxapi.com/2";

/// Request header carrying the JSON arguments of a content endpoint
pub const API_ARG_HEADER: &str = "Dropbox-API-Arg";

/// Response header carrying the JSON result of a download
pub const API_RESULT_HEADER: &str = "Dropbox-API-Result";

/// Default retry-after duration when the header is missing
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// Maximum number of retries for 429 responses
const MAX_RETRIES: u32 = 3;

/// Error body of a 409 response
#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    /// Human-readable tag path, e.g. `path_lookup/not_found/..`
    error_summary: Option<String>,
}

// ============================================================================
// DropboxClient
// ============================================================================

/// HTTP client for Dropbox API v2 calls
pub struct DropboxClient {
    /// The underlying HTTP client
    client: Client,
    /// Base URL for RPC endpoints
    rpc_base: String,
    /// Base URL for content endpoints
    content_base: String,
    /// Current OAuth2 access token
    access_token: String,
}

impl DropboxClient {
    /// Creates a new DropboxClient with the given access token
    pub fn new(access_token: impl Into<String>) -> Self {
        Self::with_base_urls(access_token, RPC_BASE_URL, CONTENT_BASE_URL)
    }

    /// Creates a new DropboxClient with custom base URLs (useful for testing)
    ///
    /// # Arguments
    /// * `access_token` - A valid OAuth2 access token
    /// * `rpc_base` - Base URL for RPC endpoints
    /// * `content_base` - Base URL for content endpoints
    pub fn with_base_urls(
        access_token: impl Into<String>,
        rpc_base: impl Into<String>,
        content_base: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            rpc_base: rpc_base.into(),
            content_base: content_base.into(),
            access_token: access_token.into(),
        }
    }

    /// Updates the access token (e.g., after a token refresh)
    pub fn set_access_token(&mut self, token: impl Into<String>) {
        self.access_token = token.into();
        debug!("Updated DropboxClient access token");
    }

    /// Returns a reference to the current access token
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn rpc_base(&self) -> &str {
        &self.rpc_base
    }

    pub fn content_base(&self) -> &str {
        &self.content_base
    }

    /// Authenticated POST to an RPC endpoint, e.g. `files/list_folder`
    pub fn rpc_request(&self, endpoint: &str) -> RequestBuilder {
        let url = format!("{}/{}", self.rpc_base, endpoint);
        self.client.post(url).bearer_auth(&self.access_token)
    }

    /// Authenticated POST to a content endpoint with `arg` in the header
    pub fn content_request<A>(&self, endpoint: &str, arg: &A) -> Result<RequestBuilder, DropboxError>
    where
        A: Serialize + ?Sized,
    {
        let url = format!("{}/{}", self.content_base, endpoint);
        Ok(self
            .client
            .post(url)
            .bearer_auth(&self.access_token)
            .header(API_ARG_HEADER, encode_api_arg(arg)?))
    }

    /// Calls an RPC endpoint and decodes its JSON result
    pub async fn rpc<A, R>(&self, endpoint: &str, args: &A) -> Result<R, DropboxError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(endpoint, "RPC request");
        let response = self
            .send_with_retry(endpoint, || Ok(self.rpc_request(endpoint).json(args)))
            .await?;
        response
            .json::<R>()
            .await
            .map_err(|e| DropboxError::InvalidResponse(format!("{endpoint}: {e}")))
    }

    /// Calls a content-upload endpoint with `data` as the body
    pub async fn upload<A, R>(&self, endpoint: &str, arg: &A, data: &[u8]) -> Result<R, DropboxError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(endpoint, bytes = data.len(), "Upload request");
        let response = self
            .send_with_retry(endpoint, || {
                Ok(self
                    .content_request(endpoint, arg)?
                    .header(CONTENT_TYPE, "application/octet-stream")
                    .body(data.to_vec()))
            })
            .await?;
        response
            .json::<R>()
            .await
            .map_err(|e| DropboxError::InvalidResponse(format!("{endpoint}: {e}")))
    }

    /// Calls a content-download endpoint
    ///
    /// Returns the result decoded from the `Dropbox-API-Result` header and
    /// the response, whose body is the file content.
    pub async fn download<A, R>(&self, endpoint: &str, arg: &A) -> Result<(R, Response), DropboxError>
    where
        A: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        debug!(endpoint, "Download request");
        let response = self
            .send_with_retry(endpoint, || self.content_request(endpoint, arg))
            .await?;

        let header = response
            .headers()
            .get(API_RESULT_HEADER)
            .ok_or_else(|| {
                DropboxError::InvalidResponse(format!("{endpoint}: missing {API_RESULT_HEADER}"))
            })?
            .to_str()
            .map_err(|e| DropboxError::InvalidResponse(format!("{endpoint}: {e}")))?;
        let result = serde_json::from_str::<R>(header)
            .map_err(|e| DropboxError::InvalidResponse(format!("{endpoint}: {e}")))?;

        Ok((result, response))
    }

    /// Sends a request, backing off and retrying on HTTP 429
    async fn send_with_retry<F>(&self, endpoint: &str, build: F) -> Result<Response, DropboxError>
    where
        F: Fn() -> Result<RequestBuilder, DropboxError>,
    {
        let mut attempt = 0;
        loop {
            let response = build()?.send().await?;
            match check_status(response).await {
                Err(DropboxError::TooManyRequests { retry_after }) if attempt < MAX_RETRIES => {
                    info!(
                        endpoint,
                        attempt,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Received 429, backing off"
                    );
                    tokio::time::sleep(retry_after).await;
                    attempt += 1;
                }
                Err(DropboxError::TooManyRequests { retry_after }) => {
                    warn!(endpoint, attempts = attempt + 1, "429 retry limit exhausted");
                    return Err(DropboxError::TooManyRequests { retry_after });
                }
                other => return other,
            }
        }
    }
}

// ============================================================================
// Status mapping
// ============================================================================

/// Maps a non-success response to a [`DropboxError`]
pub(crate) async fn check_status(response: Response) -> Result<Response, DropboxError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let retry_after = response
        .headers()
        .get("Retry-After")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs);
    let body = response.text().await.unwrap_or_default();

    Err(match status {
        StatusCode::UNAUTHORIZED => DropboxError::Unauthorized(error_summary(&body)),
        StatusCode::CONFLICT => {
            let summary = error_summary(&body);
            if summary.contains("not_found") {
                DropboxError::NotFound(summary)
            } else {
                DropboxError::Conflict(summary)
            }
        }
        StatusCode::TOO_MANY_REQUESTS => DropboxError::TooManyRequests {
            retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER),
        },
        s if s.is_server_error() => DropboxError::ServerError(format!("HTTP {s}: {body}")),
        s => DropboxError::InvalidResponse(format!("HTTP {s}: {body}")),
    })
}

/// `error_summary` of an API error body, or the raw body
fn error_summary(body: &str) -> String {
    serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error_summary)
        .unwrap_or_else(|| body.to_string())
}

// ============================================================================
// Dropbox-API-Arg encoding
// ============================================================================

/// JSON-encodes `arg` for an HTTP header
///
/// Header values must be ASCII, so DEL and every non-ASCII character are
/// written as `\uXXXX` escapes (UTF-16 surrogate pairs above the BMP).
pub fn encode_api_arg<A>(arg: &A) -> Result<String, DropboxError>
where
    A: Serialize + ?Sized,
{
    let json = serde_json::to_string(arg)
        .map_err(|e| DropboxError::InvalidResponse(format!("Failed to encode API argument: {e}")))?;

    let mut out = String::with_capacity(json.len());
    for c in json.chars() {
        if c.is_ascii() && c != '\u{7f}' {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{unit:04x}"));
            }
        }
    }
    Ok(out)
}
