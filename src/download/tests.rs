use super::*;
use std::time::Duration;
use tempfile::tempdir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
const MINIMAL_CYCLONEDX: &str =
    r#"{"bomFormat": "CycloneDX", "specVersion": "1.4", "components": []}"#;
const MINIMAL_CYCLONEDX_SHA256: &str =
    "ae269ceca2b1dffe7b158351fea7666c191dc1beb4057e3e949f6f7d50655c2b";

fn downloader() -> HttpDownloader {
    HttpDownloader::new(&DownloadConfig::default()).unwrap()
}

#[tokio::test]
async fn test_download_writes_file_and_returns_digest() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/releases/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
        .mount(&mock_server)
        .await;

    let dir = tempdir().unwrap();
    let url = format!("{}/releases/hello.txt", mock_server.uri());
    let downloaded = downloader().download(&url, dir.path()).await.unwrap();

    assert_eq!(downloaded.path, dir.path().join("hello.txt"));
    assert_eq!(downloaded.sha256, HELLO_SHA256);
    assert_eq!(downloaded.size, 11);
    assert_eq!(std::fs::read(&downloaded.path).unwrap(), b"hello world");
    assert_eq!(sha256_file(&downloaded.path).await.unwrap(), HELLO_SHA256);
}

#[tokio::test]
async fn test_download_digest_is_reproducible() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sbom.json"))
        .respond_with(ResponseTemplate::new(200).set_body_string(MINIMAL_CYCLONEDX))
        .mount(&mock_server)
        .await;

    let url = format!("{}/sbom.json", mock_server.uri());
    for _ in 0..2 {
        let dir = tempdir().unwrap();
        let downloaded = downloader().download(&url, dir.path()).await.unwrap();
        assert_eq!(downloaded.sha256, MINIMAL_CYCLONEDX_SHA256);
        assert_eq!(downloaded.sha256.len(), 64);
        assert!(
            downloaded
                .sha256
                .chars()
                .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
        );
    }
}

#[tokio::test]
async fn test_download_follows_redirects() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/latest/hello.txt"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", format!("{}/v2/hello.txt", mock_server.uri())),
        )
        .mount(&mock_server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v2/hello.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello world".to_vec()))
        .mount(&mock_server)
        .await;

    let dir = tempdir().unwrap();
    let url = format!("{}/latest/hello.txt", mock_server.uri());
    let downloaded = downloader().download(&url, dir.path()).await.unwrap();

    // Name comes from the requested URL, contents from the redirect target
    assert_eq!(downloaded.path, dir.path().join("hello.txt"));
    assert_eq!(downloaded.sha256, HELLO_SHA256);
}

#[tokio::test]
async fn test_download_rejects_disallowed_status_without_creating_file() {
    for status in [404u16, 403, 500, 503] {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.zip"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .mount(&mock_server)
            .await;

        let dir = tempdir().unwrap();
        let url = format!("{}/missing.zip", mock_server.uri());
        let result = downloader().download(&url, dir.path()).await;

        match result {
            Err(Error::Download(DownloadError::UnexpectedStatus { status: got, .. })) => {
                assert_eq!(got, status);
            }
            other => panic!("expected UnexpectedStatus for {}, got {:?}", status, other),
        }
        assert!(!dir.path().join("missing.zip").exists());
    }
}

#[tokio::test]
async fn test_download_connection_error() {
    let dir = tempdir().unwrap();
    // Port 9 (discard) on localhost is not served in test environments
    let result = downloader()
        .download("http://127.0.0.1:9/artifact.zip", dir.path())
        .await;

    assert!(matches!(result, Err(Error::Network(_))), "got {:?}", result);
    assert!(!dir.path().join("artifact.zip").exists());
}

#[tokio::test]
async fn test_download_size_limit_removes_partial_file() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/big.bin"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
        .mount(&mock_server)
        .await;

    let config = DownloadConfig {
        max_size_bytes: Some(1024),
        ..Default::default()
    };
    let dir = tempdir().unwrap();
    let url = format!("{}/big.bin", mock_server.uri());
    let result = HttpDownloader::new(&config)
        .unwrap()
        .download(&url, dir.path())
        .await;

    assert!(matches!(
        result,
        Err(Error::Download(DownloadError::TooLarge { limit: 1024, .. }))
    ));
    assert!(!dir.path().join("big.bin").exists());
}

#[tokio::test]
async fn test_download_deadline() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow.json"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(MINIMAL_CYCLONEDX)
                .set_delay(Duration::from_secs(5)),
        )
        .mount(&mock_server)
        .await;

    let config = DownloadConfig {
        timeout: Duration::from_millis(200),
        ..Default::default()
    };
    let dir = tempdir().unwrap();
    let url = format!("{}/slow.json", mock_server.uri());
    let result = HttpDownloader::new(&config)
        .unwrap()
        .download(&url, dir.path())
        .await;

    match result {
        Err(e) => assert!(e.is_timeout(), "expected timeout, got {:?}", e),
        Ok(d) => panic!("expected timeout, got {:?}", d),
    }
    assert!(!dir.path().join("slow.json").exists());
}

#[test]
fn test_artifact_file_name_uses_last_segment() {
    assert_eq!(
        artifact_file_name("https://github.com/ecosyste-ms/digest/archive/refs/heads/main.zip")
            .unwrap(),
        "main.zip"
    );
    assert_eq!(
        artifact_file_name("https://example.com/sboms/app.cdx.json?token=abc#frag").unwrap(),
        "app.cdx.json"
    );
    assert_eq!(
        artifact_file_name("https://example.com/files/my%20sbom.spdx").unwrap(),
        "my sbom.spdx"
    );
}

#[test]
fn test_artifact_file_name_fallbacks_and_rejections() {
    assert_eq!(artifact_file_name("https://example.com").unwrap(), "artifact");
    assert_eq!(artifact_file_name("https://example.com/dir/").unwrap(), "artifact");

    assert!(matches!(
        artifact_file_name("https://example.com/a%2F..%2Fetc%2Fpasswd"),
        Err(Error::Download(DownloadError::InvalidFileName { .. }))
    ));
    assert!(matches!(
        artifact_file_name("not a url"),
        Err(Error::InvalidUrl(_))
    ));
}
