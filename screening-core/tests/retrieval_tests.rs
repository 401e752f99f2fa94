//! Sanctions list download against a local HTTP server

use screening_core::config::RetrievalConfig;
use screening_core::{HttpListSource, ListSource, RetrievalError};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LIST: &str = "fileGenerationDate;Entity_LogicalId;Entity_SubjectType;NameAlias_WholeName\n\
                    2024-05-02;101;P;Ivan Petrović\n";

fn source(server: &MockServer, dir: &std::path::Path) -> HttpListSource {
    HttpListSource::new(RetrievalConfig {
        url: format!("{}/fsf/list.csv", server.uri()),
        timeout_seconds: 5,
        download_dir: Some(dir.to_path_buf()),
    })
    .unwrap()
}

#[tokio::test]
async fn test_download_writes_csv_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fsf/list.csv"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LIST))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let list = source(&server, dir.path()).fetch().await.unwrap();

    assert_eq!(list.path.parent(), Some(dir.path()));
    assert_eq!(list.path.extension().and_then(|e| e.to_str()), Some("csv"));
    assert_eq!(list.bytes, LIST.len() as u64);
    assert_eq!(std::fs::read_to_string(&list.path).unwrap(), LIST);
}

#[tokio::test]
async fn test_non_200_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let result = source(&server, dir.path()).fetch().await;

    assert!(matches!(result, Err(RetrievalError::Status { status: 404 })));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let result = source(&server, dir.path()).fetch().await;

    // one attempt only
    assert!(matches!(result, Err(RetrievalError::Status { status: 503 })));
}

#[tokio::test]
async fn test_empty_body_is_a_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let result = source(&server, dir.path()).fetch().await;

    assert!(matches!(result, Err(RetrievalError::EmptyBody)));
}

#[tokio::test]
async fn test_transport_error() {
    let dir = tempfile::tempdir().unwrap();
    let source = HttpListSource::new(RetrievalConfig {
        url: "http://127.0.0.1:1/list.csv".to_string(),
        timeout_seconds: 5,
        download_dir: Some(dir.path().to_path_buf()),
    })
    .unwrap();

    assert!(matches!(source.fetch().await, Err(RetrievalError::Http(_))));
}
