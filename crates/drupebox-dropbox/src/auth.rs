//! OAuth2 PKCE authentication for the Dropbox API
//!
//! Dropbox desktop apps use the "no redirect" variant of the Authorization
//! Code flow with PKCE (RFC 7636): the user opens the authorization URL,
//! approves the app and pastes the code shown by Dropbox back into the
//! terminal. Requesting `token_access_type=offline` makes the exchange
//! return a long-lived refresh token, which is all the configuration
//! needs to keep.
//!
//! ## Components
//!
//! - [`DropboxTokens`] - Access token, refresh token and expiry
//! - [`DropboxAuth`] - Authorization URL generation, code exchange and refresh

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use oauth2::basic::{BasicClient, BasicTokenResponse};
use oauth2::{
    AuthUrl, AuthorizationCode, ClientId, CsrfToken, EndpointNotSet, EndpointSet,
    PkceCodeChallenge, PkceCodeVerifier, RefreshToken, TokenResponse, TokenUrl,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Dropbox OAuth2 authorization endpoint
const AUTH_URL: &str = "https://www.dropbox.com/oauth2/authorize";

/// Dropbox OAuth2 token endpoint
const TOKEN_URL: &str = "https://api.dropboxapi.com/oauth2/token";

/// Lifetime assumed when the token response carries no `expires_in`
const DEFAULT_LIFETIME_SECS: i64 = 4 * 60 * 60;

// ============================================================================
// DropboxTokens
// ============================================================================

/// OAuth tokens received from Dropbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DropboxTokens {
    /// Short-lived bearer token for API requests
    pub access_token: String,
    /// Long-lived token for obtaining new access tokens
    pub refresh_token: Option<String>,
    /// When the access token expires
    pub expires_at: DateTime<Utc>,
}

impl DropboxTokens {
    /// Returns true if the access token has expired
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }

    /// Returns true if the access token will expire within `duration`
    pub fn expires_within(&self, duration: Duration) -> bool {
        Utc::now() + duration >= self.expires_at
    }

    fn from_response(response: &BasicTokenResponse, previous_refresh: Option<&str>) -> Self {
        let expires_at = response
            .expires_in()
            .map(|d| Utc::now() + Duration::seconds(d.as_secs() as i64))
            .unwrap_or_else(|| Utc::now() + Duration::seconds(DEFAULT_LIFETIME_SECS));

        Self {
            access_token: response.access_token().secret().to_string(),
            refresh_token: response
                .refresh_token()
                .map(|t| t.secret().to_string())
                .or_else(|| previous_refresh.map(str::to_string)),
            expires_at,
        }
    }
}

// ============================================================================
// DropboxAuth
// ============================================================================

/// A pending authorization: the URL to show the user and the verifier the
/// code exchange needs
pub struct AuthorizationRequest {
    /// URL the user opens to approve the app
    pub url: String,
    /// PKCE verifier matching the challenge embedded in `url`
    pub verifier: PkceCodeVerifier,
}

/// OAuth2 PKCE flow against the Dropbox endpoints
pub struct DropboxAuth {
    client: BasicClient<EndpointSet, EndpointNotSet, EndpointNotSet, EndpointNotSet, EndpointSet>,
    http_client: reqwest::Client,
}

impl DropboxAuth {
    /// Creates the flow for the given app key
    pub fn new(app_key: impl Into<String>) -> Result<Self> {
        Self::with_endpoints(app_key, AUTH_URL, TOKEN_URL)
    }

    /// Creates the flow with custom endpoints (useful for testing)
    pub fn with_endpoints(
        app_key: impl Into<String>,
        auth_url: &str,
        token_url: &str,
    ) -> Result<Self> {
        let client = BasicClient::new(ClientId::new(app_key.into()))
            .set_auth_uri(AuthUrl::new(auth_url.to_string()).context("Invalid authorization URL")?)
            .set_token_uri(TokenUrl::new(token_url.to_string()).context("Invalid token URL")?);

        Ok(Self {
            client,
            http_client: reqwest::Client::new(),
        })
    }

    /// Generates an authorization URL with a PKCE challenge
    ///
    /// No redirect URI is registered: Dropbox displays the code to the user
    /// instead. The URL asks for an offline (refresh) token.
    pub fn authorize_url(&self) -> AuthorizationRequest {
        let (challenge, verifier) = PkceCodeChallenge::new_random_sha256();

        let (url, _csrf) = self
            .client
            .authorize_url(CsrfToken::new_random)
            .add_extra_param("token_access_type", "offline")
            .set_pkce_challenge(challenge)
            .url();

        debug!("Generated authorization URL");
        AuthorizationRequest {
            url: url.to_string(),
            verifier,
        }
    }

    /// Exchanges the code pasted by the user for tokens
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: PkceCodeVerifier,
    ) -> Result<DropboxTokens> {
        info!("Exchanging authorization code for tokens");

        let response = self
            .client
            .exchange_code(AuthorizationCode::new(code.trim().to_string()))
            .set_pkce_verifier(verifier)
            .request_async(&self.http_client)
            .await
            .context("Failed to exchange authorization code")?;

        let tokens = DropboxTokens::from_response(&response, None);
        if tokens.refresh_token.is_none() {
            anyhow::bail!("Dropbox did not return a refresh token");
        }

        info!("Successfully obtained OAuth tokens");
        Ok(tokens)
    }

    /// Obtains a fresh access token from a refresh token
    ///
    /// Dropbox does not rotate refresh tokens, so the given one is carried
    /// into the result when the response has none.
    pub async fn refresh(&self, refresh_token: &str) -> Result<DropboxTokens> {
        info!("Refreshing access token");

        let response = self
            .client
            .exchange_refresh_token(&RefreshToken::new(refresh_token.to_string()))
            .request_async(&self.http_client)
            .await
            .context("Failed to refresh access token")?;

        Ok(DropboxTokens::from_response(&response, Some(refresh_token)))
    }
}

// ============================================================================
// Tests
// ============================================================================
