//! Complete indexer runs against mock catalogs and a mock relay

use crate::{create_relay_settings, create_test_settings, relay_failure, relay_solution};
use catalog_indexer::config::parse_config;
use catalog_indexer::crawler::{run_all, run_indexer, Coordinator};
use catalog_indexer::indexers::LeetxIndexer;
use catalog_indexer::{IndexerError, IndexerRegistry};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LEETX_BASE: &str = "https://leetx.example/popular-movies/";

fn yts_page(movie_count: u64, ids: &[u64]) -> Value {
    let movies: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "title": format!("Movie {id}"), "language": "日本語"}))
        .collect();
    json!({"status": "ok", "data": {"movie_count": movie_count, "limit": 2, "movies": movies}})
}

async fn mount_yts_page(server: &MockServer, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/v2/list_movies.json"))
        .and(query_param("limit", "2"))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

fn leetx_listing(entries: &[(&str, &str)], last_page: u32) -> String {
    let items: String = entries
        .iter()
        .map(|(id, name)| {
            format!(
                r#"<li>
                  <div class="modal-header"><h3><a href="/movie/{id}/{name}/">{name}</a></h3></div>
                  <div class="modal-body"><p>About {name}</p></div>
                  <div class="category"><span>Drama</span></div>
                  <span class="rating"><i style="width: 70%"></i></span>
                </li>"#
            )
        })
        .collect();
    let pages: String = (1..=last_page)
        .map(|page| format!(r#"<li><a href="/popular-movies/{page}/">{page}</a></li>"#))
        .collect();

    format!(
        r#"<html><body><main><div><ul>{items}</ul></div>
        <div class="pagination"><ul>{pages}</ul></div></main></body></html>"#
    )
}

fn leetx_detail(title: &str, seeds: u32) -> String {
    format!(
        r#"<html><body>
        <div class="torrent-detail-info"><h3><a href="/">{title}</a></h3><p>Story of {title}</p></div>
        <div class="torrent-category"><span>Drama</span></div>
        <table class="table-list"><tbody><tr>
          <td class="coll-1 name"><a href="/sub/42/0/"></a><a href="/torrent/1/{title}/">{title} 1080p</a></td>
          <td class="coll-2 seeds">{seeds}</td>
          <td class="coll-3 leeches">3</td>
          <td class="coll-date">Jan. 1st '24</td>
          <td class="coll-4 size">1.4 GB<span class="seeds">{seeds}</span></td>
          <td class="coll-5 uploader"><a href="/user/u/">uploader</a></td>
        </tr></tbody></table></body></html>"#
    )
}

async fn mount_relay_page(relay: &MockServer, url: &str, response: ResponseTemplate, times: u64) {
    Mock::given(method("POST"))
        .and(path("/v1"))
        .and(body_partial_json(json!({"cmd": "request.get", "url": url})))
        .respond_with(response)
        .expect(times)
        .mount(relay)
        .await;
}

#[tokio::test]
async fn test_yts_run_writes_json_lines() {
    let server = MockServer::start().await;
    mount_yts_page(&server, 1, yts_page(5, &[1, 2])).await;
    mount_yts_page(&server, 2, yts_page(5, &[3, 4])).await;
    mount_yts_page(&server, 3, yts_page(5, &[5])).await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings(
        "yts",
        &format!("{}/api/v2/list_movies.json", server.uri()),
        output.path(),
    );
    settings.page_limit = 2;

    let summary = run_indexer(&IndexerRegistry::builtin(), settings).await.unwrap();

    assert_eq!(summary.indexer, "yts");
    assert_eq!(summary.pages_discovered, 3);
    assert_eq!(summary.pages_processed, 3);
    assert_eq!(summary.items_extracted, 5);
    assert_eq!(summary.records_written, 5);
    assert_eq!(summary.batches, 0);
    assert_eq!(summary.fetch_attempts, 3);
    assert_eq!(summary.output_path, output.path().join("yts.jsonl"));

    let contents = fs::read_to_string(&summary.output_path).unwrap();
    assert_eq!(summary.output_bytes, contents.len() as u64);
    assert!(contents.contains("日本語"));

    let mut ids: Vec<u64> = contents
        .lines()
        .map(|line| serde_json::from_str::<Value>(line).unwrap()["id"].as_u64().unwrap())
        .collect();
    ids.sort_unstable();
    assert_eq!(ids, vec![1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_unfetchable_listing_page_is_skipped() {
    let server = MockServer::start().await;
    mount_yts_page(&server, 1, yts_page(4, &[1, 2])).await;
    Mock::given(method("GET"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings(
        "yts",
        &format!("{}/api/v2/list_movies.json", server.uri()),
        output.path(),
    );
    settings.page_limit = 2;

    let summary = run_indexer(&IndexerRegistry::builtin(), settings).await.unwrap();

    assert_eq!(summary.pages_discovered, 2);
    assert_eq!(summary.pages_processed, 1);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.fetch_failures, 1);
}

#[tokio::test]
async fn test_unfetchable_first_page_aborts_without_output() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;

    let output = TempDir::new().unwrap();
    let settings = create_test_settings(
        "yts",
        &format!("{}/api/v2/list_movies.json", server.uri()),
        output.path(),
    );

    let result = run_indexer(&IndexerRegistry::builtin(), settings).await;

    assert!(matches!(
        result,
        Err(IndexerError::FirstPageUnavailable { attempts: 3, .. })
    ));
    assert!(!output.path().join("yts.jsonl").exists());
    assert_eq!(fs::read_dir(output.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn test_relay_probe_failure_aborts_before_fetching() {
    let relay = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&relay)
        .await;
    Mock::given(method("POST"))
        .respond_with(relay_solution("<html></html>"))
        .expect(0)
        .mount(&relay)
        .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("1337x", LEETX_BASE, output.path());
    settings.relay = Some(create_relay_settings(&format!("{}/v1", relay.uri())));

    let result = run_indexer(&IndexerRegistry::builtin(), settings).await;

    assert!(matches!(result, Err(IndexerError::RelayUnavailable { .. })));
    assert!(!output.path().join("one_three_three_seven_x.json").exists());
}

#[tokio::test]
async fn test_relay_run_writes_json_array() {
    let relay = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1"))
        .respond_with(ResponseTemplate::new(405))
        .expect(1)
        .mount(&relay)
        .await;

    let first = leetx_listing(&[("1", "Alpha"), ("2", "Bravo")], 2);
    let second = leetx_listing(&[("3", "Charlie")], 2);
    mount_relay_page(&relay, &format!("{LEETX_BASE}1"), relay_solution(&first), 1).await;
    mount_relay_page(&relay, &format!("{LEETX_BASE}2"), relay_solution(&second), 1).await;
    mount_relay_page(
        &relay,
        "https://leetx.example/movie/1/Alpha/",
        relay_solution(&leetx_detail("Alpha", 40)),
        1,
    )
    .await;
    mount_relay_page(
        &relay,
        "https://leetx.example/movie/2/Bravo/",
        relay_failure("Cloudflare challenge timed out"),
        3,
    )
    .await;
    mount_relay_page(
        &relay,
        "https://leetx.example/movie/3/Charlie/",
        relay_solution(&leetx_detail("Charlie", 12)),
        1,
    )
    .await;

    let output = TempDir::new().unwrap();
    let mut settings = create_test_settings("1337x", LEETX_BASE, output.path());
    settings.batch_size = 2;
    settings.relay = Some(create_relay_settings(&format!("{}/v1", relay.uri())));

    let indexer = Arc::new(LeetxIndexer::new(&settings).unwrap());
    let coordinator = Coordinator::new(settings, indexer).unwrap();
    let summary = coordinator.run().await.unwrap();

    assert_eq!(summary.pages_discovered, 2);
    assert_eq!(summary.pages_processed, 2);
    assert_eq!(summary.items_extracted, 3);
    assert_eq!(summary.batches, 2);
    assert_eq!(summary.records_written, 2);
    assert_eq!(summary.fetch_failures, 1);

    let contents = fs::read_to_string(output.path().join("one_three_three_seven_x.json")).unwrap();
    assert!(contents.starts_with("[\n    {"));

    let records: Vec<Value> = serde_json::from_str(&contents).unwrap();
    let titles: Vec<&str> = records.iter().map(|r| r["title"].as_str().unwrap()).collect();
    assert_eq!(titles, vec!["Alpha", "Charlie"]);
    assert_eq!(records[0]["movie_page"], "https://leetx.example/movie/1/Alpha/");
    assert_eq!(records[0]["torrents"][0]["seeds"], 40);
    assert_eq!(records[1]["torrents"][0]["size"], "1.4 GB");
}

#[tokio::test]
async fn test_run_all_skips_unknown_and_continues_after_failure() {
    let server = MockServer::start().await;
    mount_yts_page(&server, 1, yts_page(1, &[7])).await;

    let output = TempDir::new().unwrap();
    let toml = format!(
        r#"
[output]
dir = "{output}"

[fetch]
max-retries = 2
concurrency-limit = 2
backoff-unit-ms = 5

[[indexer]]
name = "eztv"
base-url = "https://eztv.example/"

[[indexer]]
name = "1337x"
base-url = "{uri}/missing/"

[[indexer]]
name = "yts"
base-url = "{uri}/api/v2/list_movies.json"

[indexer.settings]
page-limit = 2
"#,
        output = output.path().display(),
        uri = server.uri()
    );
    let config = parse_config(&toml).unwrap();

    let report = run_all(&config, &IndexerRegistry::builtin(), &[]).await;

    assert_eq!(report.skipped, vec!["eztv".to_string()]);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, "1337x");
    assert!(!report.is_success());
    assert_eq!(report.summaries.len(), 1);
    assert_eq!(report.summaries[0].records_written, 1);
    assert!(output.path().join("yts.jsonl").exists());
}

#[tokio::test]
async fn test_run_all_only_filter() {
    let output = TempDir::new().unwrap();
    let toml = format!(
        r#"
[output]
dir = "{}"

[fetch]
max-retries = 1
concurrency-limit = 1

[[indexer]]
name = "yts"
base-url = "http://127.0.0.1:9/api/v2/list_movies.json"
"#,
        output.path().display()
    );
    let config = parse_config(&toml).unwrap();

    let report = run_all(&config, &IndexerRegistry::builtin(), &["1337x".to_string()]).await;

    assert!(report.summaries.is_empty());
    assert!(report.failures.is_empty());
    assert!(report.is_success());
}
