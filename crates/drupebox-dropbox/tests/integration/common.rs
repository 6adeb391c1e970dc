//! Shared test helpers for Dropbox API integration tests
//!
//! Both the RPC and the content base URL of the client point at the same
//! mock server, so endpoint paths are `/files/...` on a single host.

use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

use drupebox_core::domain::paths::RemotePath;
use drupebox_dropbox::client::{DropboxClient, API_ARG_HEADER};

/// Starts a mock server and returns a client pointed at it
pub async fn setup_dropbox_mock() -> (MockServer, DropboxClient) {
    let server = MockServer::start().await;
    let client = DropboxClient::with_base_urls("test-access-token", server.uri(), server.uri());
    (server, client)
}

pub fn remote(p: &str) -> RemotePath {
    RemotePath::new(p.to_string()).unwrap()
}

/// File metadata as Dropbox returns it in listings
pub fn file_json(display: &str, client_modified: &str, size: u64) -> serde_json::Value {
    let name = display.rsplit('/').next().unwrap_or_default();
    serde_json::json!({
        ".tag": "file",
        "name": name,
        "id": format!("id:{name}"),
        "path_lower": display.to_lowercase(),
        "path_display": display,
        "client_modified": client_modified,
        "server_modified": client_modified,
        "rev": "015f0e0fd3b8a6a000000012345",
        "size": size
    })
}

pub fn folder_json(display: &str) -> serde_json::Value {
    let name = display.rsplit('/').next().unwrap_or_default();
    serde_json::json!({
        ".tag": "folder",
        "name": name,
        "id": format!("id:{name}"),
        "path_lower": display.to_lowercase(),
        "path_display": display
    })
}

#[allow(dead_code)]
pub fn deleted_json(display: &str) -> serde_json::Value {
    let name = display.rsplit('/').next().unwrap_or_default();
    serde_json::json!({
        ".tag": "deleted",
        "name": name,
        "path_lower": display.to_lowercase(),
        "path_display": display
    })
}

/// Mounts an endpoint answering 200 with `body`
pub async fn mount_ok(server: &MockServer, endpoint: &str, body: serde_json::Value) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .mount(server)
        .await;
}

/// Mounts an endpoint answering 409 with the given `error_summary`
#[allow(dead_code)]
pub async fn mount_api_error(server: &MockServer, endpoint: &str, summary: &str) {
    Mock::given(method("POST"))
        .and(path(endpoint))
        .respond_with(ResponseTemplate::new(409).set_body_json(serde_json::json!({
            "error_summary": summary,
            "error": {".tag": "path"}
        })))
        .mount(server)
        .await;
}

/// Matches requests whose `Dropbox-API-Arg` header equals `expected`
///
/// The JSON contains commas, which the stock header matcher treats as value
/// separators, so the raw header is compared instead.
pub fn api_arg(expected: &'static str) -> impl Fn(&Request) -> bool + Send + Sync {
    move |request: &Request| {
        request
            .headers
            .get(API_ARG_HEADER)
            .and_then(|v| v.to_str().ok())
            == Some(expected)
    }
}
