//! Retrying fetcher and relay cache behaviour against mock servers

use crate::{create_relay_settings, create_test_settings, relay_failure, relay_solution};
use catalog_indexer::crawler::{build_http_client, ResponseCache, RetryingFetcher};
use futures::future::join_all;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn create_fetcher(settings: &catalog_indexer::IndexerSettings) -> RetryingFetcher {
    RetryingFetcher::new(
        build_http_client("catalog-indexer-tests").unwrap(),
        settings,
        Arc::new(ResponseCache::new()),
    )
}

#[tokio::test]
async fn test_failing_fetch_makes_exactly_k_attempts() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(500))
        .expect(4)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("test", &server.uri(), output.path());
    settings.max_attempts = 4;
    settings.backoff_unit = Duration::from_millis(50);
    let fetcher = create_fetcher(&settings);

    let start = Instant::now();
    let body = fetcher.fetch_url(&format!("{}/list", server.uri())).await;
    let elapsed = start.elapsed();

    assert!(body.is_none());
    assert_eq!(fetcher.attempts(), 4);
    assert_eq!(fetcher.failures(), 1);
    // 50 + 100 + 200 ms between four attempts; a fourth sleep would add 400 ms
    assert!(elapsed >= Duration::from_millis(350), "elapsed {:?}", elapsed);
    assert!(elapsed < Duration::from_millis(700), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_single_attempt_never_sleeps() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("test", &server.uri(), output.path());
    settings.max_attempts = 1;
    settings.backoff_unit = Duration::from_secs(30);
    let fetcher = create_fetcher(&settings);

    let start = Instant::now();
    assert!(fetcher.fetch_url(&server.uri()).await.is_none());
    assert!(start.elapsed() < Duration::from_secs(5));
}

#[tokio::test]
async fn test_recovers_after_transient_failures() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/list"))
        .respond_with(ResponseTemplate::new(200).set_body_string("page body"))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let settings = create_test_settings("test", &server.uri(), output.path());
    let fetcher = create_fetcher(&settings);

    let body = fetcher.fetch_url(&format!("{}/list", server.uri())).await;

    assert_eq!(body.as_deref(), Some("page body"));
    assert_eq!(fetcher.attempts(), 3);
    assert_eq!(fetcher.failures(), 0);
}

#[tokio::test]
async fn test_plain_fetches_are_not_cached() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("fresh"))
        .expect(2)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let settings = create_test_settings("test", &server.uri(), output.path());
    let fetcher = create_fetcher(&settings);

    let url = format!("{}/page", server.uri());
    assert!(fetcher.fetch_url(&url).await.is_some());
    assert!(fetcher.fetch_url(&url).await.is_some());
    assert!(fetcher.cache().is_empty());
}

#[tokio::test]
async fn test_relay_fetch_is_rendered_once_per_url() {
    let relay = MockServer::start().await;
    let target = "https://catalog.example/popular/1";
    Mock::given(method("POST"))
        .and(path("/v1"))
        .and(body_partial_json(json!({
            "cmd": "request.get",
            "url": target,
            "maxTimeout": 60000
        })))
        .respond_with(relay_solution("<html>rendered</html>").set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&relay)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("test", "https://catalog.example/popular/", output.path());
    settings.relay = Some(create_relay_settings(&format!("{}/v1", relay.uri())));
    let fetcher = create_fetcher(&settings);

    let (first, second) = tokio::join!(fetcher.fetch_url(target), fetcher.fetch_url(target));
    let third = fetcher.fetch_url(&format!("{}#reviews", target)).await;

    assert_eq!(first.as_deref(), Some("<html>rendered</html>"));
    assert_eq!(second.as_deref(), Some("<html>rendered</html>"));
    assert_eq!(third.as_deref(), Some("<html>rendered</html>"));
    assert_eq!(fetcher.cache().len(), 1);
    assert_eq!(fetcher.attempts(), 1);
}

#[tokio::test]
async fn test_relay_error_status_is_retried_and_not_cached() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1"))
        .respond_with(relay_failure("Error solving the challenge"))
        .expect(3)
        .mount(&relay)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("test", "https://catalog.example/popular/", output.path());
    settings.relay = Some(create_relay_settings(&format!("{}/v1", relay.uri())));
    let fetcher = create_fetcher(&settings);

    let body = fetcher.fetch_url("https://catalog.example/popular/1").await;

    assert!(body.is_none());
    assert!(fetcher.cache().is_empty());
    assert_eq!(fetcher.failures(), 1);
}

#[tokio::test]
async fn test_relay_malformed_body_is_retried() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&relay)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1"))
        .respond_with(relay_solution("<html>ok</html>"))
        .expect(1)
        .mount(&relay)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("test", "https://catalog.example/popular/", output.path());
    settings.relay = Some(create_relay_settings(&format!("{}/v1", relay.uri())));
    let fetcher = create_fetcher(&settings);

    let body = fetcher.fetch_url("https://catalog.example/popular/1").await;
    assert_eq!(body.as_deref(), Some("<html>ok</html>"));
}

#[tokio::test]
async fn test_relay_fetches_are_bounded_by_relay_limit() {
    let relay = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1"))
        .respond_with(relay_solution("<html>rendered</html>").set_delay(Duration::from_millis(200)))
        .expect(6)
        .mount(&relay)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("test", "https://catalog.example/popular/", output.path());
    settings.concurrency_limit = 100;
    let mut relay_settings = create_relay_settings(&format!("{}/v1", relay.uri()));
    relay_settings.concurrency_limit = 2;
    settings.relay = Some(relay_settings);
    let fetcher = create_fetcher(&settings);

    let urls: Vec<String> = (1..=6)
        .map(|page| format!("https://catalog.example/popular/{}", page))
        .collect();

    let start = Instant::now();
    let bodies = join_all(urls.iter().map(|url| fetcher.fetch_url(url))).await;
    let elapsed = start.elapsed();

    assert!(bodies.iter().all(Option::is_some));
    assert_eq!(fetcher.attempts(), 6);
    // Six 200 ms calls two at a time take at least three rounds
    assert!(elapsed >= Duration::from_millis(600), "elapsed {:?}", elapsed);
}

#[tokio::test]
async fn test_gate_slot_is_released_during_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/bad"))
        .respond_with(ResponseTemplate::new(500))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/good"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("test", &server.uri(), output.path());
    settings.concurrency_limit = 1;
    settings.max_attempts = 2;
    settings.backoff_unit = Duration::from_secs(2);
    let fetcher = create_fetcher(&settings);

    let bad_url = format!("{}/bad", server.uri());
    let good_url = format!("{}/good", server.uri());
    let start = Instant::now();

    let (bad, (good, good_done)) = tokio::join!(fetcher.fetch_url(&bad_url), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        let body = fetcher.fetch_url(&good_url).await;
        (body, start.elapsed())
    });

    assert!(bad.is_none());
    assert_eq!(good.as_deref(), Some("ok"));
    assert!(good_done < Duration::from_secs(1), "good fetch took {:?}", good_done);
    assert!(start.elapsed() >= Duration::from_secs(2));
}
