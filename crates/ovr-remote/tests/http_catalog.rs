use ovr_core::{ArtifactCatalog, SyncError, VersionId};
use ovr_remote::{HttpCatalog, HttpConfig};
use tokio::io::AsyncReadExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn catalog(server: &MockServer) -> HttpCatalog {
    HttpCatalog::new(
        reqwest::Client::new(),
        &HttpConfig {
            manifest_url: format!("{}/version.txt", server.uri()),
            artifact_url: format!("{}/builds/{{version}}.zip", server.uri()),
        },
    )
}

#[tokio::test]
async fn manifest_resolves_to_versioned_artifact() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.txt"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string("Major=1\nMinor=2\nRevision=3\nPatch=4\n"),
        )
        .mount(&server)
        .await;

    let descriptor = catalog(&server)
        .list_latest()
        .await
        .expect("manifest should be fetched")
        .expect("a build should be published");

    assert_eq!(descriptor.version, Some(VersionId::new(1, 2, 3, 4)));
    assert_eq!(descriptor.key, format!("{}/builds/1.2.3.4.zip", server.uri()));
}

#[tokio::test]
async fn missing_manifest_means_no_builds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.txt"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let latest = catalog(&server)
        .list_latest()
        .await
        .expect("404 is not an error");
    assert!(latest.is_none());
}

#[tokio::test]
async fn server_error_is_remote_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.txt"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = catalog(&server).list_latest().await;
    assert!(matches!(result, Err(SyncError::RemoteUnavailable { .. })));
}

#[tokio::test]
async fn malformed_manifest_yields_unversioned_descriptor() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("Major=1\nMinor=2\n"))
        .mount(&server)
        .await;

    let descriptor = catalog(&server)
        .list_latest()
        .await
        .expect("manifest should be fetched")
        .expect("descriptor should be returned");

    assert_eq!(descriptor.version, None);
    assert_eq!(descriptor.key, format!("{}/version.txt", server.uri()));
}

#[tokio::test]
async fn all_zero_manifest_is_a_real_version() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/version.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "\u{feff}Major=0\r\nMinor=0\r\nRevision=0\r\nPatch=0\r\n",
        ))
        .mount(&server)
        .await;

    let descriptor = catalog(&server)
        .list_latest()
        .await
        .expect("manifest should be fetched")
        .expect("descriptor should be returned");

    assert_eq!(descriptor.version, Some(VersionId::ZERO));
    assert_eq!(descriptor.key, format!("{}/builds/0.0.0.0.zip", server.uri()));
}

#[tokio::test]
async fn open_stream_returns_body_and_length() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/builds/1.2.3.4.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-archive-bytes".to_vec()))
        .mount(&server)
        .await;

    let mut stream = catalog(&server)
        .open_stream(&format!("{}/builds/1.2.3.4.zip", server.uri()))
        .await
        .expect("artifact should open");

    let mut body = Vec::new();
    stream
        .reader
        .read_to_end(&mut body)
        .await
        .expect("body should be readable");
    assert_eq!(body, b"PK-archive-bytes");
    assert_eq!(stream.content_length, 16);
}

#[tokio::test]
async fn vanished_artifact_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/builds/9.9.9.9.zip"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = catalog(&server)
        .open_stream(&format!("{}/builds/9.9.9.9.zip", server.uri()))
        .await;
    assert!(matches!(result, Err(SyncError::ArtifactNotFound { .. })));
}
