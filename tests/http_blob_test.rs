//! Integration tests for the HTTP blob store against a mock object endpoint

use ferry::adapters::blob::{BlobStore, HttpBlobStore};
use ferry::config::{secret_string, HttpBlobConfig};
use ferry::domain::{BlobError, BlobKey, ErrorKind, FerryError};
use mockito::Server;

fn store(endpoint: String, token: Option<&str>) -> HttpBlobStore {
    HttpBlobStore::new(&HttpBlobConfig {
        endpoint,
        token: token.map(|t| secret_string(t.to_string())),
        timeout_seconds: 5,
    })
    .unwrap()
}

fn key(key: &str) -> BlobKey {
    BlobKey::new(key).unwrap()
}

#[tokio::test]
async fn test_get_sends_bearer_token() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/incoming/dumps/users.csv")
        .match_header("authorization", "Bearer tok-123")
        .with_status(200)
        .with_body("id,name\n1,Ada\n")
        .create_async()
        .await;

    let body = store(server.url(), Some("tok-123"))
        .get("incoming", &key("dumps/users.csv"))
        .await
        .unwrap();

    assert_eq!(body, b"id,name\n1,Ada\n");
    mock.assert_async().await;
}

#[tokio::test]
async fn test_reserved_characters_in_keys_are_percent_encoded() {
    let mut server = Server::new_async().await;
    let truncated = server
        .mock("GET", "/incoming/data")
        .with_status(200)
        .with_body("wrong object")
        .expect(0)
        .create_async()
        .await;
    let encoded = server
        .mock("GET", "/incoming/data%231.csv")
        .with_status(200)
        .with_body("id\n1\n")
        .create_async()
        .await;

    let body = store(server.url(), None)
        .get("incoming", &key("data#1.csv"))
        .await
        .unwrap();

    assert_eq!(body, b"id\n1\n");
    encoded.assert_async().await;
    truncated.assert_async().await;
}

#[tokio::test]
async fn test_put_encodes_spaces_and_query_characters() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/snapshots/q%3F%20report.json")
        .with_status(201)
        .create_async()
        .await;

    store(server.url(), None)
        .put("snapshots", &key("q? report.json"), b"[]".to_vec(), "application/json")
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_get_missing_object_is_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/incoming/absent.csv")
        .with_status(404)
        .create_async()
        .await;

    let err = store(server.url(), None)
        .get("incoming", &key("absent.csv"))
        .await
        .unwrap_err();

    assert!(matches!(err, FerryError::Blob(BlobError::NotFound(_))));
    assert_eq!(err.kind(), ErrorKind::Access);
}

#[tokio::test]
async fn test_get_forbidden_is_access_denied() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/incoming/users.csv")
        .with_status(403)
        .create_async()
        .await;

    let err = store(server.url(), Some("wrong"))
        .get("incoming", &key("users.csv"))
        .await
        .unwrap_err();

    assert!(matches!(err, FerryError::Blob(BlobError::AccessDenied(_))));
}

#[tokio::test]
async fn test_put_sends_body_and_content_type() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("PUT", "/exports/source-users-local-2024-01-02-03:04:05.json")
        .match_header("content-type", "application/json")
        .match_header("authorization", "Bearer tok-123")
        .match_body("[]")
        .with_status(201)
        .create_async()
        .await;

    store(server.url(), Some("tok-123"))
        .put(
            "exports",
            &key("source-users-local-2024-01-02-03:04:05.json"),
            b"[]".to_vec(),
            "application/json",
        )
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_put_server_error_is_blob_write() {
    let mut server = Server::new_async().await;
    server
        .mock("PUT", "/exports/users.json")
        .with_status(500)
        .with_body("disk full")
        .create_async()
        .await;

    let err = store(server.url(), None)
        .put("exports", &key("users.json"), b"[]".to_vec(), "application/json")
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::BlobWrite);
    assert!(err.to_string().contains("disk full"));
}

#[tokio::test]
async fn test_invalid_container_is_rejected_before_request() {
    let server = Server::new_async().await;

    let err = store(server.url(), None)
        .get("../etc", &key("passwd"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Access);
}
