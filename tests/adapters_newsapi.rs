// tests/adapters_newsapi.rs
mod common;

use chrono::{TimeZone, Utc};
use common::client;
use crypto_news_ingest::ingest::paging::{Pacing, StopReason};
use crypto_news_ingest::ingest::providers::{NewsApiAdapter, NewsApiSettings};
use crypto_news_ingest::{FetchLimits, SourceAdapter, TimeWindow};
use httpmock::{Method::GET, MockServer};
use serde_json::json;
use std::time::Duration;

const PATH: &str = "/v2/everything";

fn ms(y: i32, m: u32, d: u32) -> i64 {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0)
        .single()
        .unwrap()
        .timestamp_millis()
}

fn article(url: &str, published_at: &str) -> serde_json::Value {
    json!({
        "source": {"id": null, "name": "Reuters"},
        "title": "Bitcoin ETF inflows rise",
        "description": "desc",
        "url": url,
        "publishedAt": published_at
    })
}

fn adapter(server: &MockServer, key: Option<&str>, max_chunks: u32) -> NewsApiAdapter {
    NewsApiAdapter::new(
        client(),
        &server.base_url(),
        key.map(str::to_string),
        NewsApiSettings {
            chunk: Duration::from_secs(24 * 3600),
            max_chunks,
            ..NewsApiSettings::default()
        },
        Pacing::none(),
    )
}

#[tokio::test]
async fn walks_the_window_in_day_slices_and_skips_failed_slice() {
    let server = MockServer::start();
    let window = TimeWindow::new(ms(2024, 5, 7), ms(2024, 5, 10));

    let newest = server.mock(|when, then| {
        when.method(GET)
            .path(PATH)
            .header("X-Api-Key", "k")
            .query_param("from", "2024-05-09T00:00:00Z")
            .query_param("to", "2024-05-10T00:00:00Z");
        then.status(200).json_body(json!({
            "status": "ok",
            "articles": [article("https://n.test/9", "2024-05-09T12:00:00Z")]
        }));
    });
    let broken = server.mock(|when, then| {
        when.method(GET)
            .path(PATH)
            .query_param("from", "2024-05-08T00:00:00Z");
        then.status(500);
    });
    let oldest = server.mock(|when, then| {
        when.method(GET)
            .path(PATH)
            .query_param("from", "2024-05-07T00:00:00Z")
            .query_param("to", "2024-05-08T00:00:00Z");
        then.status(200).json_body(json!({
            "status": "ok",
            "articles": [
                article("https://n.test/7", "2024-05-07T08:00:00Z"),
                {"title": "no url or date"}
            ]
        }));
    });

    let h = adapter(&server, Some("k"), 30)
        .fetch(&window, &FetchLimits::default())
        .await
        .unwrap();

    let urls: Vec<&str> = h.records.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(urls, vec!["https://n.test/9", "https://n.test/7"]);
    assert_eq!(h.records[0].source, "Reuters");
    assert_eq!(h.soft_failures.len(), 1);
    assert_eq!(h.stop, Some(StopReason::WindowExhausted));
    newest.assert_hits(1);
    broken.assert_hits(1);
    oldest.assert_hits(1);
}

#[tokio::test]
async fn chunk_budget_bounds_requests() {
    let server = MockServer::start();
    let window = TimeWindow::new(ms(2024, 5, 1), ms(2024, 5, 10));
    let mock = server.mock(|when, then| {
        when.method(GET).path(PATH);
        then.status(200).json_body(json!({"status": "ok", "articles": []}));
    });

    let h = adapter(&server, Some("k"), 2)
        .fetch(&window, &FetchLimits::default())
        .await
        .unwrap();
    assert!(h.records.is_empty());
    assert_eq!(h.stop, Some(StopReason::MaxChunks));
    mock.assert_hits(2);
}

#[tokio::test]
async fn error_status_in_body_counts_as_failed_slice() {
    let server = MockServer::start();
    let window = TimeWindow::new(ms(2024, 5, 9), ms(2024, 5, 10));
    server.mock(|when, then| {
        when.method(GET).path(PATH);
        then.status(200)
            .json_body(json!({"status": "error", "code": "rateLimited", "message": "slow down"}));
    });

    let h = adapter(&server, Some("k"), 30)
        .fetch(&window, &FetchLimits::default())
        .await
        .unwrap();
    assert!(h.records.is_empty());
    assert_eq!(h.soft_failures.len(), 1);
    assert_eq!(h.soft_failures[0].kind(), "parse");
}

#[tokio::test]
async fn missing_key_is_a_configuration_error() {
    let server = MockServer::start();
    let window = TimeWindow::new(ms(2024, 5, 9), ms(2024, 5, 10));
    let err = adapter(&server, None, 30)
        .fetch(&window, &FetchLimits::default())
        .await
        .unwrap_err();
    assert!(err.is_configuration());
    assert!(err.to_string().contains("NEWSAPI_API_KEY"));
}
