//! Integration tests for the OAuth2 token endpoint

use drupebox_dropbox::auth::DropboxAuth;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const AUTH_URL: &str = "https://www.dropbox.com/oauth2/authorize";

async fn setup_auth_mock() -> (MockServer, DropboxAuth) {
    let server = MockServer::start().await;
    let token_url = format!("{}/oauth2/token", server.uri());
    let auth = DropboxAuth::with_endpoints("test-app-key", AUTH_URL, &token_url).unwrap();
    (server, auth)
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token() {
    let (server, auth) = setup_auth_mock().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=long-lived"))
        .and(body_string_contains("client_id=test-app-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "sl.fresh",
            "token_type": "bearer",
            "expires_in": 14400
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = auth.refresh("long-lived").await.expect("Refresh failed");

    assert_eq!(tokens.access_token, "sl.fresh");
    assert_eq!(tokens.refresh_token.as_deref(), Some("long-lived"));
    assert!(!tokens.is_expired());
}

#[tokio::test]
async fn test_exchange_code_sends_verifier() {
    let (server, auth) = setup_auth_mock().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=pasted-code"))
        .and(body_string_contains("code_verifier="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "sl.first",
            "token_type": "bearer",
            "expires_in": 14400,
            "refresh_token": "offline-token",
            "scope": "files.content.read files.content.write",
            "uid": "12345",
            "account_id": "dbid:abc"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let request = auth.authorize_url();
    let tokens = auth
        .exchange_code("  pasted-code\n", request.verifier)
        .await
        .expect("Exchange failed");

    assert_eq!(tokens.access_token, "sl.first");
    assert_eq!(tokens.refresh_token.as_deref(), Some("offline-token"));
}

#[tokio::test]
async fn test_rejected_refresh_token_fails() {
    let (server, auth) = setup_auth_mock().await;

    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "refresh token is invalid or revoked"
        })))
        .mount(&server)
        .await;

    let err = auth.refresh("revoked").await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to refresh access token"));
}
