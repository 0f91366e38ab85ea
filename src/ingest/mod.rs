// src/ingest/mod.rs
pub mod config;
pub mod error;
pub mod gateway;
pub mod http;
pub mod paging;
pub mod providers;
pub mod types;

use crate::detect::{Relevance, SymbolDetector};
use crate::features::{extract_tags, sentiment_score, SourceWeights};
use crate::ingest::error::SourceError;
use crate::ingest::gateway::{PersistenceError, PersistenceGateway};
use crate::ingest::paging::StopReason;
use crate::ingest::types::{FetchLimits, NewsRecord, SourceAdapter, TimeWindow};
use crate::symbols::AliasDictionary;
use futures::FutureExt;
use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use thiserror::Error;

/// Upper bound on title/body length after normalization.
pub const MAX_TEXT_CHARS: usize = 2_000;

/// One-time metrics registration (so series show up once a recorder is installed).
fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("ingest_events_total", "Records produced by source adapters.");
        describe_counter!("ingest_dedup_total", "Records removed as URL duplicates.");
        describe_counter!(
            "ingest_unmatched_total",
            "Records dropped because no tracked ticker was mentioned."
        );
        describe_counter!("ingest_kept_total", "Enriched records handed to persistence.");
        describe_counter!(
            "ingest_provider_errors_total",
            "Source failures by kind (configuration, transport, status, parse)."
        );
        describe_histogram!("ingest_fetch_ms", "Per-source fetch time in milliseconds.");
        describe_gauge!(
            "ingest_pipeline_last_run_ts",
            "Unix ts when the ingest pipeline last ran."
        );
    });
}

/// Normalize text: decode entities, strip tags, fold quotes and whitespace.
pub fn normalize_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: OnceCell<regex::Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| regex::Regex::new(r"(?is)</?[^>]+>").expect("tag regex"));
    out = re_tags.replace_all(&out, " ").to_string();

    out = out
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");

    static RE_WS: OnceCell<regex::Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| regex::Regex::new(r"\s+").expect("ws regex"));
    out = re_ws.replace_all(&out, " ").trim().to_string();

    if out.chars().count() > MAX_TEXT_CHARS {
        out = out.chars().take(MAX_TEXT_CHARS).collect();
    }
    out
}

/// Drops records whose non-empty `url` was already seen; the first one wins.
/// Records without a URL are always kept.
pub fn dedupe(records: Vec<NewsRecord>) -> Vec<NewsRecord> {
    let mut seen: HashSet<String> = HashSet::with_capacity(records.len());
    records
        .into_iter()
        .filter(|r| r.url.is_empty() || seen.insert(r.url.clone()))
        .collect()
}

/// Fills symbols/relevance/features on each record. Records without any
/// tracked ticker are dropped; returns the survivors and the drop count.
pub fn enrich(
    records: Vec<NewsRecord>,
    dict: &AliasDictionary,
    weights: &SourceWeights,
) -> (Vec<NewsRecord>, usize) {
    let detector = SymbolDetector::new(dict);
    let mut out = Vec::with_capacity(records.len());
    let mut unmatched = 0usize;

    for mut rec in records {
        // source-provided hints survive only when tracked; detection adds the rest
        rec.symbols.retain(|s| dict.contains(s));
        rec.symbols
            .extend(detector.detect(&format!("{} {}", rec.title, rec.body)));
        if rec.symbols.is_empty() {
            unmatched += 1;
            continue;
        }
        if rec.relevance.is_none() {
            let in_title = detector.detect(&rec.title);
            rec.relevance = Some(if in_title.iter().any(|s| rec.symbols.contains(s)) {
                Relevance::Direct
            } else {
                Relevance::Related
            });
        }
        rec.source_weight = weights.weight_for(&rec.source);
        rec.sentiment_score = sentiment_score(&rec.title);
        rec.tags = extract_tags(&rec.title);
        out.push(rec);
    }

    (out, unmatched)
}

/// How one source did during a run.
#[derive(Debug, Clone, Serialize)]
pub struct SourceReport {
    pub name: &'static str,
    pub records: usize,
    pub soft_failures: usize,
    pub stop: Option<StopReason>,
    /// Set when the source contributed nothing (`configuration`, `transport`, `panic`, ...).
    pub error_kind: Option<&'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Init,
    Fetching,
    Merged,
    Deduped,
    Enriched,
    Persisted,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub stage: RunStage,
    /// Every stage entered so far, `Fetching` once per source.
    pub stages: Vec<RunStage>,
    pub sources: Vec<SourceReport>,
    pub merged: usize,
    pub duplicates: usize,
    pub unmatched: usize,
    pub records: Vec<NewsRecord>,
}

impl RunReport {
    fn new() -> Self {
        Self {
            stage: RunStage::Init,
            stages: vec![RunStage::Init],
            sources: Vec::new(),
            merged: 0,
            duplicates: 0,
            unmatched: 0,
            records: Vec::new(),
        }
    }

    fn advance(&mut self, stage: RunStage) {
        tracing::debug!(target: "ingest", from = ?self.stage, to = ?stage, "run stage");
        self.stage = stage;
        self.stages.push(stage);
    }

    pub fn contributing_sources(&self) -> usize {
        self.sources.iter().filter(|s| s.records > 0).count()
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    /// Records were fetched and enriched but not durably stored.
    #[error("enriched records were not persisted: {source}")]
    NotPersisted {
        report: Box<RunReport>,
        source: PersistenceError,
    },
}

pub struct Aggregator {
    adapters: Vec<Box<dyn SourceAdapter>>,
    limits: FetchLimits,
    weights: SourceWeights,
}

impl Aggregator {
    /// Adapters listed first win URL ties, so put higher-trust sources first.
    pub fn new(adapters: Vec<Box<dyn SourceAdapter>>, limits: FetchLimits) -> Self {
        Self {
            adapters,
            limits,
            weights: SourceWeights::default_seed(),
        }
    }

    pub fn with_source_weights(mut self, weights: SourceWeights) -> Self {
        self.weights = weights;
        self
    }

    pub fn adapter_names(&self) -> Vec<&'static str> {
        self.adapters.iter().map(|a| a.name()).collect()
    }

    /// Fetch from every adapter concurrently, merge in adapter order, dedupe, enrich.
    pub async fn collect(&self, window: &TimeWindow, dict: &AliasDictionary) -> RunReport {
        ensure_metrics_described();
        let mut report = RunReport::new();
        for _ in &self.adapters {
            report.advance(RunStage::Fetching);
        }

        let limits = &self.limits;
        let fetches = self.adapters.iter().map(|adapter| async move {
            let res = AssertUnwindSafe(adapter.fetch(window, limits))
                .catch_unwind()
                .await;
            (adapter.name(), res)
        });
        let results = futures::future::join_all(fetches).await;

        let mut merged: Vec<NewsRecord> = Vec::new();
        for (name, res) in results {
            let source = match res {
                Ok(Ok(harvest)) => {
                    for e in &harvest.soft_failures {
                        counter!("ingest_provider_errors_total", "kind" => e.kind()).increment(1);
                    }
                    let rep = SourceReport {
                        name,
                        records: harvest.records.len(),
                        soft_failures: harvest.soft_failures.len(),
                        stop: harvest.stop,
                        error_kind: None,
                    };
                    merged.extend(harvest.records);
                    rep
                }
                Ok(Err(e)) => {
                    log_source_error(name, &e);
                    counter!("ingest_provider_errors_total", "kind" => e.kind()).increment(1);
                    SourceReport {
                        name,
                        records: 0,
                        soft_failures: 0,
                        stop: None,
                        error_kind: Some(e.kind()),
                    }
                }
                Err(_) => {
                    tracing::error!(target: "ingest", source = name, "source adapter panicked; treating as empty");
                    counter!("ingest_provider_errors_total", "kind" => "panic").increment(1);
                    SourceReport {
                        name,
                        records: 0,
                        soft_failures: 0,
                        stop: None,
                        error_kind: Some("panic"),
                    }
                }
            };
            report.sources.push(source);
        }

        let merged_len = merged.len();
        report.merged = merged_len;
        report.advance(RunStage::Merged);

        let deduped = dedupe(merged);
        let duplicates = merged_len - deduped.len();
        report.duplicates = duplicates;
        report.advance(RunStage::Deduped);

        let (records, unmatched) = enrich(deduped, dict, &self.weights);
        report.unmatched = unmatched;
        report.records = records;
        report.advance(RunStage::Enriched);

        counter!("ingest_dedup_total").increment(duplicates as u64);
        counter!("ingest_unmatched_total").increment(unmatched as u64);
        counter!("ingest_kept_total").increment(report.records.len() as u64);
        gauge!("ingest_pipeline_last_run_ts").set(chrono::Utc::now().timestamp() as f64);

        tracing::info!(
            target: "ingest",
            merged = merged_len,
            duplicates,
            unmatched,
            kept = report.records.len(),
            "ingest run enriched"
        );

        report
    }

    /// `collect` followed by one `save`. Persistence failures are not retried.
    pub async fn run(
        &self,
        window: &TimeWindow,
        dict: &AliasDictionary,
        gateway: &dyn PersistenceGateway,
    ) -> Result<RunReport, RunError> {
        let mut report = self.collect(window, dict).await;
        match gateway.save(&report.records).await {
            Ok(()) => {
                report.advance(RunStage::Persisted);
                tracing::info!(target: "ingest", stored = report.records.len(), "ingest run persisted");
                Ok(report)
            }
            Err(source) => {
                tracing::error!(target: "ingest", error = %source, records = report.records.len(), "persistence failed");
                Err(RunError::NotPersisted {
                    report: Box::new(report),
                    source,
                })
            }
        }
    }
}

fn log_source_error(name: &'static str, e: &SourceError) {
    if e.is_configuration() {
        tracing::warn!(target: "ingest", source = name, kind = "configuration", error = %e, "source skipped for this run");
    } else {
        tracing::warn!(target: "ingest", source = name, kind = e.kind(), error = %e, "source failed; contributing zero records");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::Tag;
    use crate::symbols::SymbolEntry;

    fn rec(ts: i64, title: &str, url: &str) -> NewsRecord {
        NewsRecord::new(ts, title, "CoinDesk", url).unwrap()
    }

    fn dict() -> AliasDictionary {
        AliasDictionary::from_entries(&[
            SymbolEntry::new("BTC"),
            SymbolEntry::with_aliases("ZEC", &["zcash"]),
        ])
    }

    #[test]
    fn normalize_text_strips_html_and_folds_ws() {
        let s = "  <p>Hello,&nbsp;&nbsp;<b>world</b></p> &ldquo;ok&rdquo;  ";
        assert_eq!(normalize_text(s), r#"Hello, world "ok""#);
    }

    #[test]
    fn normalize_text_caps_length() {
        let s = "x".repeat(5_000);
        assert_eq!(normalize_text(&s).chars().count(), MAX_TEXT_CHARS);
    }

    #[test]
    fn dedupe_keeps_first_and_empty_urls() {
        let out = dedupe(vec![
            rec(3, "a", "https://x.test/1"),
            rec(2, "b", ""),
            rec(1, "c", "https://x.test/1"),
            rec(4, "d", ""),
        ]);
        let titles: Vec<&str> = out.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b", "d"]);
    }

    #[test]
    fn dedupe_is_a_fixed_point() {
        let once = dedupe(vec![
            rec(1, "a", "u1"),
            rec(2, "b", "u2"),
            rec(3, "c", "u1"),
        ]);
        let twice = dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn enrich_fills_features_and_drops_unmatched() {
        let weights = SourceWeights::default_seed();
        let (out, unmatched) = enrich(
            vec![
                rec(1, "Zcash announces major upgrade", "u1"),
                rec(2, "Stocks close higher", "u2"),
                rec(3, "Weekly wrap", "u3").with_body("bitcoin miners sold"),
            ],
            &dict(),
            &weights,
        );
        assert_eq!(unmatched, 1);
        assert_eq!(out.len(), 2);

        let z = &out[0];
        assert_eq!(z.symbols.iter().collect::<Vec<_>>(), vec!["ZEC"]);
        assert_eq!(z.relevance, Some(Relevance::Direct));
        assert!(z.tags.contains(&Tag::Upgrade));
        assert!(z.sentiment_score > 0.0);
        assert!((z.source_weight - 0.90).abs() < 1e-6);

        assert_eq!(out[1].relevance, Some(Relevance::Related));
    }

    #[test]
    fn untracked_hints_are_discarded() {
        let weights = SourceWeights::default_seed();
        let (out, _) = enrich(
            vec![
                rec(1, "Market update", "u1").with_symbols(["BTC", "FOO"]),
                rec(2, "Another update", "u2").with_symbols(["FOO"]),
            ],
            &dict(),
            &weights,
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].symbols.iter().collect::<Vec<_>>(), vec!["BTC"]);
        assert_eq!(out[0].relevance, Some(Relevance::Related));
    }

    #[test]
    fn hints_are_merged_with_detected_tickers() {
        let weights = SourceWeights::default_seed();
        let d = AliasDictionary::from_entries(&[SymbolEntry::new("BTC"), SymbolEntry::new("ETH")]);
        let (out, _) = enrich(
            vec![
                rec(1, "Ethereum rallies", "u1").with_symbols(["BTC"]),
                rec(2, "Weekly wrap", "u2").with_symbols(["BTC"]),
            ],
            &d,
            &weights,
        );
        assert_eq!(out[0].symbols.iter().collect::<Vec<_>>(), vec!["BTC", "ETH"]);
        assert_eq!(out[0].relevance, Some(Relevance::Direct));

        // the hinted ticker is not named in the title
        assert_eq!(out[1].symbols.iter().collect::<Vec<_>>(), vec!["BTC"]);
        assert_eq!(out[1].relevance, Some(Relevance::Related));
    }
}
