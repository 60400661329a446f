//! HttpFetcher behavior against a local mock server.

use std::time::Duration;

use librecrawl::{FetchClient, HttpFetcher};

#[tokio::test]
async fn fetch_returns_body_status_and_headers() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/page")
        .with_status(200)
        .with_header("content-type", "text/html; charset=utf-8")
        .with_body("<html><body>hello</body></html>")
        .create_async()
        .await;

    let fetcher = HttpFetcher::new("LibreCrawl/1.0 test").unwrap();
    let response = fetcher
        .fetch(format!("{}/page", server.url()), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status, 200);
    assert!(response.body.contains("hello"));
    assert_eq!(
        response.headers.get("content-type").map(String::as_str),
        Some("text/html; charset=utf-8")
    );
    mock.assert_async().await;
}

#[tokio::test]
async fn non_success_status_is_not_an_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/missing")
        .with_status(404)
        .with_body("not found")
        .create_async()
        .await;

    let fetcher = HttpFetcher::new("LibreCrawl/1.0 test").unwrap();
    let response = fetcher
        .fetch(format!("{}/missing", server.url()), Duration::from_secs(5))
        .await
        .unwrap();

    assert_eq!(response.status, 404);
    assert_eq!(response.body, "not found");
}

#[tokio::test]
async fn unreachable_host_surfaces_a_request_error() {
    let fetcher = HttpFetcher::new("LibreCrawl/1.0 test").unwrap();
    let result = fetcher
        .fetch(
            // Reserved TEST-NET-1 address; nothing listens there.
            "http://192.0.2.1:9/".to_string(),
            Duration::from_millis(500),
        )
        .await;
    assert!(result.is_err());
}
