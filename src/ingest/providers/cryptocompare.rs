// src/ingest/providers/cryptocompare.rs
//! CryptoCompare news: most-recent-first pages, next page requested with
//! `lTs` ("published before this unix second").

use async_trait::async_trait;
use metrics::{counter, histogram};
use serde::Deserialize;
use serde_json::Value;

use crate::ingest::error::SourceError;
use crate::ingest::http::get_json;
use crate::ingest::normalize_text;
use crate::ingest::paging::{scan_page, Pacing, PageGuard, StopReason};
use crate::ingest::types::{FetchLimits, Harvest, NewsRecord, SourceAdapter, TimeWindow};

pub const NAME: &str = "CryptoCompare";
pub const DEFAULT_BASE_URL: &str = "https://min-api.cryptocompare.com";

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "Data", default)]
    data: Value,
    #[serde(rename = "Message", default)]
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Article {
    published_on: i64,
    title: String,
    url: String,
    #[serde(default)]
    body: Option<String>,
    #[serde(default)]
    source: Option<String>,
    #[serde(default)]
    source_info: Option<SourceInfo>,
    /// Pipe separated, e.g. "BTC|Mining|Regulation".
    #[serde(default)]
    categories: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceInfo {
    name: Option<String>,
}

impl Article {
    fn into_record(self) -> Option<NewsRecord> {
        let source = self
            .source_info
            .and_then(|s| s.name)
            .or(self.source)
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| NAME.to_string());
        let hints: Vec<String> = self
            .categories
            .as_deref()
            .unwrap_or_default()
            .split('|')
            .map(str::to_string)
            .collect();
        let rec = NewsRecord::new(
            self.published_on.checked_mul(1000)?,
            normalize_text(&self.title),
            source,
            self.url.trim(),
        )?
        .with_body(normalize_text(self.body.as_deref().unwrap_or_default()))
        .with_symbols(hints);
        Some(rec)
    }
}

pub struct CryptoCompareAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    lang: String,
    pacing: Pacing,
}

impl CryptoCompareAdapter {
    pub fn new(client: reqwest::Client, base_url: &str, api_key: Option<String>, pacing: Pacing) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            lang: "EN".to_string(),
            pacing,
        }
    }

    /// One page; `before_secs` maps to `lTs`. Unparseable articles are skipped.
    async fn fetch_page(&self, before_secs: Option<i64>) -> Result<Vec<NewsRecord>, SourceError> {
        let mut req = self
            .client
            .get(format!("{}/data/v2/news/", self.base_url))
            .query(&[("lang", self.lang.as_str())]);
        if let Some(ts) = before_secs {
            req = req.query(&[("lTs", ts)]);
        }
        if let Some(key) = &self.api_key {
            req = req.query(&[("api_key", key.as_str())]);
        }

        let env: Envelope = get_json(req).await?;
        let Value::Array(items) = env.data else {
            return Err(SourceError::Parse(format!(
                "no article list in response: {}",
                env.message.unwrap_or_default()
            )));
        };

        let mut out = Vec::with_capacity(items.len());
        let mut skipped = 0usize;
        for item in items {
            match serde_json::from_value::<Article>(item).ok().and_then(Article::into_record) {
                Some(rec) => out.push(rec),
                None => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::debug!(target: "ingest", source = NAME, skipped, "skipped malformed articles");
            counter!("ingest_provider_errors_total", "kind" => "parse").increment(skipped as u64);
        }
        Ok(out)
    }
}

#[async_trait]
impl SourceAdapter for CryptoCompareAdapter {
    async fn fetch(
        &self,
        window: &TimeWindow,
        limits: &FetchLimits,
    ) -> Result<Harvest, SourceError> {
        let t0 = std::time::Instant::now();
        let mut guard = PageGuard::new(limits);
        let mut harvest = Harvest::default();
        let mut last_seen_secs: Option<i64> = None;

        let stop = loop {
            if let Some(stop) = guard.before_request() {
                break stop;
            }
            if guard.pages() > 0 {
                self.pacing.wait(guard.pages()).await;
            }

            let page = match self.fetch_page(last_seen_secs).await {
                Ok(p) => p,
                Err(e) if guard.pages() == 0 => return Err(e),
                Err(e) => {
                    tracing::warn!(target: "ingest", source = NAME, error = %e, "page request failed; stopping");
                    harvest.soft_failures.push(e);
                    break StopReason::RequestFailed;
                }
            };

            // A source that ignores `lTs` would hand the same page back forever.
            let fresh: Vec<NewsRecord> = page
                .into_iter()
                .filter(|r| last_seen_secs.map_or(true, |ls| r.timestamp() <= ls * 1000))
                .collect();

            let scan = scan_page(fresh, window);
            let oldest = scan.oldest_ms;
            let (kept, stop) = guard.admit(scan);
            harvest.records.extend(kept);
            if let Some(stop) = stop {
                break stop;
            }
            match oldest {
                Some(ms) => last_seen_secs = Some(ms.div_euclid(1000) - 1),
                None => break StopReason::EmptyPage,
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn article_maps_source_info_and_categories() {
        let a: Article = serde_json::from_value(serde_json::json!({
            "published_on": 1_700_000_000,
            "title": " Zcash &amp; friends ",
            "url": "https://cc.test/a",
            "body": "<p>body</p>",
            "source": "cointelegraph",
            "source_info": {"name": "CoinTelegraph"},
            "categories": "ZEC|Technology"
        }))
        .unwrap();
        let rec = a.into_record().unwrap();
        assert_eq!(rec.source, "CoinTelegraph");
        assert_eq!(rec.title, "Zcash & friends");
        assert_eq!(rec.body, "body");
        assert_eq!(rec.timestamp(), 1_700_000_000_000);
        assert!(rec.symbols.contains("ZEC"));
    }

    #[test]
    fn zero_published_on_is_dropped() {
        let a: Article = serde_json::from_value(serde_json::json!({
            "published_on": 0, "title": "t", "url": "u"
        }))
        .unwrap();
        assert!(a.into_record().is_none());
    }
}
