// src/ingest/providers/cryptopanic.rs
//! CryptoPanic posts API. Pages are chained through the opaque `next` URL
//! the API returns; an auth token is mandatory.

use async_trait::async_trait;
use chrono::DateTime;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::error::SourceError;
use crate::ingest::http::get_json;
use crate::ingest::normalize_text;
use crate::ingest::paging::{scan_page, Pacing, PageGuard, StopReason};
use crate::ingest::types::{FetchLimits, Harvest, NewsRecord, SourceAdapter, TimeWindow};

pub const NAME: &str = "CryptoPanic";
pub const DEFAULT_BASE_URL: &str = "https://cryptopanic.com";
pub const API_KEY_ENV: &str = "CRYPTOPANIC_API_KEY";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    next: Option<String>,
    #[serde(default)]
    results: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct Post {
    title: String,
    published_at: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    original_url: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    source: Option<PostSource>,
    /// v2 name of the tagged coins list; v1 used `currencies`.
    #[serde(default, alias = "currencies")]
    instruments: Option<Vec<Instrument>>,
}

#[derive(Debug, Deserialize)]
struct PostSource {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    domain: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Instrument {
    code: String,
}

impl Post {
    fn into_record(self) -> Option<NewsRecord> {
        let ts = DateTime::parse_from_rfc3339(&self.published_at)
            .ok()?
            .timestamp_millis();
        let source = self
            .source
            .and_then(|s| s.title.or(s.domain))
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NAME.to_string());
        let url = self.original_url.or(self.url).unwrap_or_default();
        let codes: Vec<String> = self
            .instruments
            .unwrap_or_default()
            .into_iter()
            .map(|i| i.code)
            .collect();

        Some(
            NewsRecord::new(ts, normalize_text(&self.title), source, url.trim())?
                .with_body(normalize_text(self.description.as_deref().unwrap_or_default()))
                .with_symbols(codes),
        )
    }
}

pub struct CryptoPanicAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    pacing: Pacing,
}

impl CryptoPanicAdapter {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>, pacing: Pacing) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            pacing,
        }
    }

    async fn fetch_page(
        &self,
        token: &str,
        cursor: Option<&str>,
    ) -> Result<(Vec<NewsRecord>, Option<String>), SourceError> {
        let req = match cursor {
            // `next` already carries every query parameter, token included
            Some(next) => self.client.get(next),
            None => self
                .client
                .get(format!("{}/api/developer/v2/posts/", self.base_url))
                .query(&[
                    ("auth_token", token),
                    ("public", "true"),
                    ("kind", "news"),
                ]),
        };

        let env: Envelope = get_json(req).await?;
        let mut out = Vec::with_capacity(env.results.len());
        let mut skipped = 0usize;
        for item in env.results {
            match serde_json::from_value::<Post>(item).ok().and_then(Post::into_record) {
                Some(rec) => out.push(rec),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(target: "ingest", source = NAME, skipped, "skipped malformed posts");
            counter!("ingest_provider_errors_total", "kind" => "parse").increment(skipped as u64);
        }
        let next = env.next.filter(|n| !n.trim().is_empty());
        Ok((out, next))
    }
}

#[async_trait]
impl SourceAdapter for CryptoPanicAdapter {
    async fn fetch(
        &self,
        window: &TimeWindow,
        limits: &FetchLimits,
    ) -> Result<Harvest, SourceError> {
        let Some(token) = self.api_key.as_deref() else {
            return Err(SourceError::configuration(
                NAME,
                format!("{API_KEY_ENV} is not set"),
            ));
        };

        let t0 = std::time::Instant::now();
        let mut guard = PageGuard::new(limits);
        let mut harvest = Harvest::default();
        let mut cursor: Option<String> = None;

        let stop = loop {
            if let Some(stop) = guard.before_request() {
                break stop;
            }
            if guard.pages() > 0 {
                self.pacing.wait(guard.pages()).await;
            }

            let (page, next) = match self.fetch_page(token, cursor.as_deref()).await {
                Ok(p) => p,
                Err(e) if guard.pages() == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(target: "ingest", source = NAME, error = %e, "page request failed; stopping");
                    harvest.soft_failures.push(e);
                    break StopReason::RequestFailed;
                }
            };

            let (kept, stop) = guard.admit(scan_page(page, window));
            harvest.records.extend(kept);
            if let Some(stop) = stop {
                break stop;
            }
            match next {
                Some(n) => cursor = Some(n),
                None => break StopReason::NoCursor,
            }
        };

        histogram!("ingest_fetch_ms", "source" => NAME).record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total", "source" => NAME).increment(harvest.records.len() as u64);
        tracing::info!(target: "ingest", source = NAME, pages = guard.pages(), records = harvest.records.len(), stop = ?stop, "source done");
        Ok(harvest.with_stop(stop))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
