// src/ingest/types.rs
use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use std::collections::BTreeSet;

use crate::detect::Relevance;
use crate::features::Tag;
use crate::ingest::error::SourceError;
use crate::ingest::paging::StopReason;

/// One normalized news item. `timestamp` and `datetime` are set together at
/// construction and are read-only afterwards.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewsRecord {
    timestamp: i64, // unix millis
    datetime: String,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub body: String,
    pub source: String, // e.g., "CoinDesk", "Cointelegraph"
    pub url: String,
    pub symbols: BTreeSet<String>,
    pub relevance: Option<Relevance>,
    pub source_weight: f32,
    pub sentiment_score: f64,
    pub tags: BTreeSet<Tag>,
}

impl NewsRecord {
    /// `None` for the "unknown time" sentinel (`<= 0`) or out-of-range times.
    pub fn new(
        timestamp_ms: i64,
        title: impl Into<String>,
        source: impl Into<String>,
        url: impl Into<String>,
    ) -> Option<Self> {
        if timestamp_ms <= 0 {
            return None;
        }
        let dt = DateTime::<Utc>::from_timestamp_millis(timestamp_ms)?;
        Some(Self {
            timestamp: timestamp_ms,
            datetime: dt.to_rfc3339_opts(SecondsFormat::Millis, true),
            title: title.into(),
            body: String::new(),
            source: source.into(),
            url: url.into(),
            symbols: BTreeSet::new(),
            relevance: None,
            source_weight: 0.0,
            sentiment_score: 0.0,
            tags: BTreeSet::new(),
        })
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Symbols the source itself tagged; checked against the dictionary on enrichment.
    pub fn with_symbols<I, S>(mut self, symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.symbols = symbols
            .into_iter()
            .map(|s| s.as_ref().trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty())
            .collect();
        self
    }

    pub fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub fn datetime(&self) -> &str {
        &self.datetime
    }
}

/// `[start_ms, end_ms]`; `start_ms` is the cutoff.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start_ms: i64,
    pub end_ms: i64,
}

impl TimeWindow {
    pub fn new(start_ms: i64, end_ms: i64) -> Self {
        Self { start_ms, end_ms }
    }

    /// `now - days .. now`.
    pub fn lookback(now: DateTime<Utc>, days: u32) -> Self {
        let start = now - Duration::days(i64::from(days));
        Self {
            start_ms: start.timestamp_millis(),
            end_ms: now.timestamp_millis(),
        }
    }

    pub fn cutoff_ms(&self) -> i64 {
        self.start_ms
    }

    pub fn contains(&self, ts_ms: i64) -> bool {
        ts_ms >= self.start_ms && ts_ms <= self.end_ms
    }
}

/// Bounds shared by all adapters for one run.
#[derive(Debug, Clone, Copy)]
pub struct FetchLimits {
    pub max_pages: u32,
    pub max_articles: usize,
}

impl Default for FetchLimits {
    fn default() -> Self {
        Self {
            max_pages: 50,
            max_articles: 1000,
        }
    }
}

/// What one adapter produced. Soft failures are recorded here while the
/// records collected before them are kept.
#[derive(Debug, Default)]
pub struct Harvest {
    pub records: Vec<NewsRecord>,
    pub soft_failures: Vec<SourceError>,
    pub stop: Option<StopReason>,
}

impl Harvest {
    pub fn with_stop(mut self, stop: StopReason) -> Self {
        self.stop = Some(stop);
        self
    }
}

#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Collect records inside `window`. `Err` means the source contributed
    /// nothing this run (missing credential, first request failed).
    async fn fetch(&self, window: &TimeWindow, limits: &FetchLimits)
        -> Result<Harvest, SourceError>;
    fn name(&self) -> &'static str;
}
