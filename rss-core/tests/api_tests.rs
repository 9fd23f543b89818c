use std::time::Duration;

use reqwest::Client;
use rss_core::{FeedApiClient, FeedApiError, RequestCoordinator};
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn sample_response() -> serde_json::Value {
    json!({
        "feeds": [{
            "title": "Example Blog",
            "link": "https://example.com",
            "feedUrl": "https://example.com/feed",
            "articles": [
                {
                    "title": "Hello",
                    "link": "https://example.com/hello",
                    "pubDate": "2025-01-02T10:00:00Z",
                    "summary": "First post"
                },
                { "title": "Undated", "link": "https://example.com/undated", "summary": "" }
            ]
        }],
        "errors": [{ "url": "https://broken.example/rss", "message": "404 Not Found" }]
    })
}

#[tokio::test]
async fn posts_urls_and_decodes_feeds_and_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/parse"))
        .and(body_json(json!({
            "urls": ["https://example.com/feed", "https://broken.example/rss"]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(sample_response()))
        .expect(1)
        .mount(&server)
        .await;

    let api = FeedApiClient::new(Client::new(), format!("{}/", server.uri()));
    let response = api
        .parse_feeds(
            &[
                "https://example.com/feed".to_owned(),
                "https://broken.example/rss".to_owned(),
            ],
            None,
        )
        .await
        .unwrap();

    assert_eq!(response.feeds.len(), 1);
    let feed = &response.feeds[0];
    assert_eq!(feed.feed_url, "https://example.com/feed");
    assert_eq!(feed.articles[0].pub_date.as_deref(), Some("2025-01-02T10:00:00Z"));
    assert_eq!(feed.articles[1].pub_date, None);
    assert_eq!(response.errors[0].message, "404 Not Found");
}

#[tokio::test]
async fn non_success_status_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/parse"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;

    let api = FeedApiClient::new(Client::new(), server.uri());
    let err = api
        .parse_feeds(&["https://example.com/feed".to_owned()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedApiError::Status(502)), "got {err:?}");
}

#[tokio::test]
async fn malformed_body_is_a_decode_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/parse"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let api = FeedApiClient::new(Client::new(), server.uri());
    let err = api
        .parse_feeds(&["https://example.com/feed".to_owned()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedApiError::Decode(_)), "got {err:?}");
}

#[tokio::test]
async fn slow_api_times_out() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/parse"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_response())
                .set_delay(Duration::from_millis(800)),
        )
        .mount(&server)
        .await;

    let api = FeedApiClient::new(Client::new(), server.uri()).with_timeout(Duration::from_millis(100));
    let err = api
        .parse_feeds(&["https://example.com/feed".to_owned()], None)
        .await
        .unwrap_err();
    assert!(matches!(err, FeedApiError::Timeout(t) if t == Duration::from_millis(100)));
    assert!(!err.is_aborted());
}

#[tokio::test]
async fn superseded_request_is_aborted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/parse"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(sample_response())
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;

    let api = FeedApiClient::new(Client::new(), server.uri());
    let coordinator = RequestCoordinator::new();
    let token = coordinator.begin();

    let first = tokio::spawn({
        let api = api.clone();
        async move {
            api.parse_feeds(&["https://example.com/feed".to_owned()], Some(&token))
                .await
        }
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    let newer = coordinator.begin();

    let err = first.await.unwrap().unwrap_err();
    assert!(err.is_aborted(), "got {err:?}");
    assert!(newer.is_current());
}
