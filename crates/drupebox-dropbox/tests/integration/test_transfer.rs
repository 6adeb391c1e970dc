//! Integration tests for uploads, downloads, deletes and folder creation

use chrono::{TimeZone, Utc};
use drupebox_core::domain::entry::DeleteOutcome;
use drupebox_core::ports::IRemoteStorage;
use drupebox_dropbox::client::API_RESULT_HEADER;
use drupebox_dropbox::provider::DropboxStorage;
use drupebox_dropbox::{files, DropboxError};
use wiremock::matchers::{body_bytes, body_json, header, method, path};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{self, api_arg, file_json, folder_json, remote};

// ============================================================================
// Upload tests
// ============================================================================

#[tokio::test]
async fn test_upload_sends_content_and_arguments() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/upload"))
        .and(header("content-type", "application/octet-stream"))
        .and(api_arg(
            r#"{"path":"/Docs/a.txt","mode":"overwrite","autorename":false,"mute":true}"#,
        ))
        .and(body_bytes(b"hello".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(
            "/Docs/a.txt",
            "2024-05-06T07:08:09Z",
            5,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let storage = DropboxStorage::new(client);
    let entry = storage
        .upload(b"hello", &remote("/Docs/a.txt"), true)
        .await
        .expect("Upload failed");

    assert_eq!(entry.path, remote("/Docs/a.txt"));
    assert_eq!(
        entry.modified(),
        Some(Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap())
    );
}

#[tokio::test]
async fn test_upload_escapes_non_ascii_path_in_header() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/upload"))
        .and(api_arg(
            r#"{"path":"/caf\u00e9.txt","mode":"add","autorename":false,"mute":true}"#,
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(file_json(
            "/caf\u{e9}.txt",
            "2024-05-06T07:08:09Z",
            0,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let metadata = files::upload(&client, b"", &remote("/caf\u{e9}.txt"), false)
        .await
        .expect("Upload failed");

    assert_eq!(metadata.name, "caf\u{e9}.txt");
}

#[tokio::test]
async fn test_upload_conflict_is_an_error() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_api_error(&server, "/files/upload", "path/conflict/file/..").await;

    let err = files::upload(&client, b"x", &remote("/taken.txt"), false)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DropboxError>(),
        Some(DropboxError::Conflict(_))
    ));
    assert!(format!("{err:#}").contains("Failed to upload /taken.txt"));
}

// ============================================================================
// Download tests
// ============================================================================

#[tokio::test]
async fn test_download_writes_file_and_returns_metadata() {
    let (server, client) = common::setup_dropbox_mock().await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("Report.pdf");

    let content: Vec<u8> = (0..100_000).map(|i| (i % 251) as u8).collect();
    let result = file_json("/Work/Report.pdf", "2022-02-02T02:02:02Z", content.len() as u64);

    Mock::given(method("POST"))
        .and(path("/files/download"))
        .and(api_arg(r#"{"path":"/Work/Report.pdf"}"#))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header(API_RESULT_HEADER, result.to_string().as_str())
                .set_body_bytes(content.clone()),
        )
        .mount(&server)
        .await;

    let storage = DropboxStorage::new(client);
    let entry = storage
        .download_to_file(&remote("/Work/Report.pdf"), &destination)
        .await
        .expect("Download failed");

    assert_eq!(std::fs::read(&destination).unwrap(), content);
    assert_eq!(
        entry.modified(),
        Some(Utc.with_ymd_and_hms(2022, 2, 2, 2, 2, 2).unwrap())
    );

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(leftovers.len(), 1, "No partial file should remain");
}

#[tokio::test]
async fn test_download_of_missing_file_creates_nothing() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_api_error(&server, "/files/download", "path/not_found/...").await;
    let dir = tempfile::tempdir().unwrap();
    let destination = dir.path().join("gone.txt");

    let err = files::download_to_file(&client, &remote("/gone.txt"), &destination)
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DropboxError>(),
        Some(DropboxError::NotFound(_))
    ));
    assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
}

#[tokio::test]
async fn test_download_without_result_header_is_invalid() {
    let (server, client) = common::setup_dropbox_mock().await;
    Mock::given(method("POST"))
        .and(path("/files/download"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"data".to_vec()))
        .mount(&server)
        .await;
    let dir = tempfile::tempdir().unwrap();

    let err = files::download_to_file(&client, &remote("/a"), &dir.path().join("a"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.downcast_ref::<DropboxError>(),
        Some(DropboxError::InvalidResponse(_))
    ));
}

// ============================================================================
// Delete and folder tests
// ============================================================================

#[tokio::test]
async fn test_delete_existing_path() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/delete_v2"))
        .and(body_json(serde_json::json!({"path": "/Old"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"metadata": folder_json("/Old")})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = DropboxStorage::new(client);
    let outcome = storage.delete(&remote("/Old")).await.expect("Delete failed");
    assert_eq!(outcome, DeleteOutcome::Deleted);
}

#[tokio::test]
async fn test_delete_missing_path_is_not_an_error() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_api_error(&server, "/files/delete_v2", "path_lookup/not_found/..").await;

    let outcome = files::delete(&client, &remote("/never-there"))
        .await
        .expect("NotFound should not fail");
    assert_eq!(outcome, DeleteOutcome::NotFound);
}

#[tokio::test]
async fn test_delete_other_api_error_fails() {
    let (server, client) = common::setup_dropbox_mock().await;
    common::mount_api_error(&server, "/files/delete_v2", "too_many_write_operations/..").await;

    let err = files::delete(&client, &remote("/busy")).await.unwrap_err();
    assert!(format!("{err:#}").contains("Failed to delete /busy"));
}

#[tokio::test]
async fn test_create_folder() {
    let (server, client) = common::setup_dropbox_mock().await;

    Mock::given(method("POST"))
        .and(path("/files/create_folder_v2"))
        .and(body_json(serde_json::json!({"path": "/New Folder", "autorename": false})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"metadata": folder_json("/New Folder")})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let storage = DropboxStorage::new(client);
    storage
        .create_folder(&remote("/New Folder"))
        .await
        .expect("Folder creation failed");
}
