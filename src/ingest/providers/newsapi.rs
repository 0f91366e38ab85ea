// src/ingest/providers/newsapi.rs
//! NewsAPI `/v2/everything`. The free tier has no usable paging, so the
//! window is sliced into fixed-size date ranges, newest first, one request
//! per slice. A failed slice is logged and skipped.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

use crate::ingest::error::SourceError;
use crate::ingest::http::get_json;
use crate::ingest::normalize_text;
use crate::ingest::paging::{scan_page, Pacing, PageGuard, StopReason};
use crate::ingest::types::{FetchLimits, Harvest, NewsRecord, SourceAdapter, TimeWindow};

pub const NAME: &str = "NewsAPI";
pub const DEFAULT_BASE_URL: &str = "https://newsapi.org";
pub const API_KEY_ENV: &str = "NEWSAPI_API_KEY";
pub const DEFAULT_QUERY: &str = "crypto OR bitcoin OR ethereum OR blockchain";

#[derive(Debug, Deserialize)]
struct Envelope {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Article {
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    url: String,
    published_at: String,
    #[serde(default)]
    source: Option<ArticleSource>,
}

#[derive(Debug, Deserialize)]
struct ArticleSource {
    name: Option<String>,
}

impl Article {
    fn into_record(self) -> Option<NewsRecord> {
        let ts = DateTime::parse_from_rfc3339(&self.published_at)
            .ok()?
            .timestamp_millis();
        let source = self
            .source
            .and_then(|s| s.name)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NAME.to_string());
        Some(
            NewsRecord::new(
                ts,
                normalize_text(self.title.as_deref().unwrap_or_default()),
                source,
                self.url.trim(),
            )?
            .with_body(normalize_text(self.description.as_deref().unwrap_or_default())),
        )
    }
}

#[derive(Debug, Clone)]
pub struct NewsApiSettings {
    pub query: String,
    pub chunk: Duration,
    pub max_chunks: u32,
    pub page_size: u32,
}

impl Default for NewsApiSettings {
    fn default() -> Self {
        Self {
            query: DEFAULT_QUERY.to_string(),
            chunk: Duration::from_secs(24 * 3600),
            max_chunks: 30,
            page_size: 100,
        }
    }
}

pub struct NewsApiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    settings: NewsApiSettings,
    pacing: Pacing,
}

fn iso(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl NewsApiAdapter {
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        api_key: Option<String>,
        settings: NewsApiSettings,
        pacing: Pacing,
    ) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            settings,
            pacing,
        }
    }

    async fn fetch_range(
        &self,
        key: &str,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Vec<NewsRecord>, SourceError> {
        let page_size = self.settings.page_size.to_string();
        let (from, to) = (iso(from_ms), iso(to_ms));
        let req = self
            .client
            .get(format!("{}/v2/everything", self.base_url))
            .query(&[
                ("q", self.settings.query.as_str()),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("language", "en"),
                ("sortBy", "publishedAt"),
                ("pageSize", page_size.as_str()),
            ])
            .header("X-Api-Key", key);

        let env: Envelope = get_json(req).await?;
        if env.status != "ok" {
            return Err(SourceError::Parse(format!(
                "status {}: {}",
                env.status,
                env.message.unwrap_or_default()
            )));
        }
        let mut out = Vec::with_capacity(env.articles.len());
        let mut skipped = 0usize;
        for item in env.articles {
            match serde_json::from_value::<Article>(item).ok().and_then(Article::into_record) {
                Some(rec) => out.push(rec),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            counter!("ingest_provider_errors_total", "kind" => "parse").increment(skipped as u64);
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for NewsApiAdapter {
    async fn fetch(
        &self,
        window: &TimeWindow,
        limits: &FetchLimits,
    ) -> Result<Harvest, SourceError> {
        let Some(key) = self.api_key.as_deref() else {
            return Err(SourceError::configuration(
                NAME,
                format!("{API_KEY_ENV} is not set"),
            ));
        };
        let chunk_ms = i64::try_from(self.settings.chunk.as_millis()).unwrap_or(i64::MAX);
        if chunk_ms <= 0 {
            return Err(SourceError::configuration(NAME, "chunk size must be positive"));
        }

        let t0 = std::time::Instant::now();
        // a chunk is this adapter's page
        let mut guard = PageGuard::new(&FetchLimits {
            max_pages: self.settings.max_chunks,
            max_articles: limits.max_articles,
        });
        let mut harvest = Harvest::default();
        let mut current_end = window.end_ms;

        let stop = loop {
            if current_end <= window.start_ms {
                break StopReason::WindowExhausted;
            }
            match guard.before_request() {
                Some(StopReason::MaxPages) => break StopReason::MaxChunks,
                Some(stop) => break stop,
                None => {}
            }
            if guard.pages() > 0 {
                self.pacing.wait(guard.pages()).await;
            }

            let chunk_start = current_end.saturating_sub(chunk_ms).max(window.start_ms);
            let page = match self.fetch_range(key, chunk_start, current_end).await {
                Ok(p) => p,
                Err(e) => {
                    tracing::warn!(
                        target: "ingest",
                        source = NAME,
                        from = %iso(chunk_start),
                        to = %iso(current_end),
                        error = %e,
                        "date range failed; skipping"
                    );
                    harvest.soft_failures.push(e);
                    Vec::new()
                }
            };

            // empty slices are normal here; only the article budget ends the loop early
            let (kept, stop) = guard.admit(scan_page(page, window));
            harvest.records.extend(kept);
            if stop == Some(StopReason::MaxArticles) {
                break StopReason::MaxArticles;
            }
            current_end = chunk_start;
        };

        histogram!("ingest_fetch_ms", "source" => NAME).record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total", "source" => NAME).increment(harvest.records.len() as u64);
        tracing::info!(target: "ingest", source = NAME, chunks = guard.pages(), records = harvest.records.len(), failed = harvest.soft_failures.len(), stop = ?stop, "source done");
        Ok(harvest.with_stop(stop))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
