//! Integration tests for listings, cursors, change feeds and error mapping

use chrono::{TimeZone, Utc};
use drupebox_core::domain::entry::{Cursor, RemoteChange, RemoteEntry};
use drupebox_core::domain::paths::RemotePath;
use drupebox_core::ports::IRemoteStorage;
use drupebox_dropbox::provider::DropboxStorage;
use drupebox_dropbox::{files, DropboxError};
use wiremock::matchers::{body_json, body_partial_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, deleted_json, file_json, folder_json, remote};

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_folder_follows_continuation_pages() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .and(header("authorization", "Bearer test-access-token"))
        .and(body_partial_json(serde_json::json!({"path": "", "recursive": true})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [folder_json("/Docs"), file_json("/Docs/a.txt", "2024-01-02T03:04:05Z", 3)],
            "cursor": "page-1",
            "has_more": true
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder/continue"))
        .and(body_json(serde_json::json!({"cursor": "page-1"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [file_json("/Notes.md", "2024-01-02T03:04:06Z", 10)],
            "cursor": "page-2",
            "has_more": false
        })))
        .expect(1)
        .mount(&server)
        .await;

    let entries = files::list_folder(&client, &RemotePath::root(), true)
        .await
        .expect("Listing failed");

    assert_eq!(entries.len(), 3);
    let paths: Vec<String> = entries
        .iter()
        .map(|m| m.remote_path().unwrap().to_string())
        .collect();
    assert_eq!(paths, vec!["/Docs", "/Docs/a.txt", "/Notes.md"]);
}

#[tokio::test]
async fn test_storage_converts_entries() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_ok(
        &server,
        "/files/list_folder",
        serde_json::json!({
            "entries": [folder_json("/Photos"), file_json("/Photos/Cat.JPG", "2023-06-01T12:00:00Z", 2048)],
            "cursor": "c",
            "has_more": false
        }),
    )
    .await;

    let storage = DropboxStorage::new(client);
    let entries = storage
        .list_folder(&RemotePath::root(), true)
        .await
        .expect("Listing failed");

    assert_eq!(
        entries,
        vec![
            RemoteEntry::folder(remote("/Photos")),
            RemoteEntry::file(
                remote("/Photos/Cat.JPG"),
                Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap(),
                2048
            ),
        ]
    );
}

// ============================================================================
// Cursors and change feeds
// ============================================================================

#[tokio::test]
async fn test_latest_cursor() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder/get_latest_cursor"))
        .and(body_partial_json(serde_json::json!({"path": "", "recursive": true})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::json!({"cursor": "AAE-cursor"})),
        )
        .mount(&server)
        .await;

    let storage = DropboxStorage::new(client);
    let cursor = storage
        .latest_cursor(&RemotePath::root(), true)
        .await
        .expect("Cursor request failed");

    assert_eq!(cursor, Cursor::new("AAE-cursor"));
}

#[tokio::test]
async fn test_list_changes_reports_deletions_and_upserts() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder/continue"))
        .and(body_json(serde_json::json!({"cursor": "since-last-run"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "entries": [deleted_json("/Old/report.pdf"), file_json("/new.txt", "2024-03-01T00:00:00Z", 1)],
            "cursor": "next",
            "has_more": false
        })))
        .mount(&server)
        .await;

    let storage = DropboxStorage::new(client);
    let changes = storage
        .list_changes(&Cursor::new("since-last-run"))
        .await
        .expect("Change feed failed");

    assert_eq!(changes.len(), 2);
    assert_eq!(changes[0], RemoteChange::Deleted(remote("/Old/report.pdf")));
    assert!(matches!(&changes[1], RemoteChange::Upserted(e) if e.path == remote("/new.txt")));
}

#[tokio::test]
async fn test_list_changes_with_empty_cursor_makes_no_request() {
    let (server, client) = common::setup_dropbox_mock().await;

    let storage = DropboxStorage::new(client);
    let changes = storage.list_changes(&Cursor::empty()).await.unwrap();

    assert!(changes.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

// ============================================================================
// Error mapping
// ============================================================================

#[tokio::test]
async fn test_unauthorized_maps_to_error() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error_summary": "expired_access_token/",
            "error": {".tag": "expired_access_token"}
        })))
        .mount(&server)
        .await;

    let err = files::list_folder(&client, &RemotePath::root(), false)
        .await
        .unwrap_err();

    match err.downcast_ref::<DropboxError>() {
        Some(DropboxError::Unauthorized(summary)) => {
            assert_eq!(summary, "expired_access_token/")
        }
        other => panic!("Expected Unauthorized, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_folder_maps_to_not_found() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_api_error(&server, "/files/list_folder", "path/not_found/..").await;

    let err = files::list_folder(&client, &remote("/gone"), false)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DropboxError>(),
        Some(DropboxError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_rate_limit_is_retried() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder/get_latest_cursor"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    common::mount_ok(
        &server,
        "/files/list_folder/get_latest_cursor",
        serde_json::json!({"cursor": "after-backoff"}),
    )
    .await;

    let cursor = files::get_latest_cursor(&client, &RemotePath::root(), true)
        .await
        .expect("Retry should succeed");

    assert_eq!(cursor, "after-backoff");
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_rate_limit_gives_up_after_retries() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder/get_latest_cursor"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "0"))
        .mount(&server)
        .await;

    let err = files::get_latest_cursor(&client, &RemotePath::root(), true)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DropboxError>(),
        Some(DropboxError::TooManyRequests { .. })
    ));
    assert_eq!(server.received_requests().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_server_error_is_transient() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/list_folder"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let err = files::list_folder(&client, &RemotePath::root(), true)
        .await
        .unwrap_err();

    let dropbox = err.downcast_ref::<DropboxError>().expect("DropboxError");
    assert!(matches!(dropbox, DropboxError::ServerError(_)));
    assert!(dropbox.is_transient());
}
