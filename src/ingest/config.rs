// src/ingest/config.rs
//! Run configuration.
//!
//! Resolution order for the file:
//! 1) `$INGEST_CONFIG_PATH`
//! 2) `config/ingest.toml`
//! 3) `config/ingest.json`
//! 4) built-in defaults
//!
//! Credentials never live in the file; they come from the environment
//! (`CRYPTOCOMPARE_API_KEY`, `CRYPTOPANIC_API_KEY`, `NEWSAPI_API_KEY`).

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ingest::http::{build_client, DEFAULT_TIMEOUT};
use crate::ingest::paging::Pacing;
use crate::ingest::providers::{
    cryptocompare, cryptopanic, newsapi, rss, CryptoCompareAdapter, CryptoPanicAdapter,
    FeedSource, NewsApiAdapter, NewsApiSettings, RssAdapter,
};
use crate::ingest::types::{FetchLimits, SourceAdapter};

pub const ENV_PATH: &str = "INGEST_CONFIG_PATH";
pub const CRYPTOCOMPARE_KEY_ENV: &str = "CRYPTOCOMPARE_API_KEY";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    pub lookback_days: u32,
    pub max_articles: usize,
    pub max_pages: u32,
    pub http_timeout_secs: u64,
    /// JSON symbol registry; the built-in minimum set is used without it.
    pub symbols_path: Option<PathBuf>,
    pub source_weights_path: Option<PathBuf>,
    pub output_path: PathBuf,
    pub cryptocompare: CryptoCompareSection,
    pub cryptopanic: CryptoPanicSection,
    pub newsapi: NewsApiSection,
    pub rss: RssSection,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            lookback_days: 90,
            max_articles: 1000,
            max_pages: 50,
            http_timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            symbols_path: None,
            source_weights_path: None,
            output_path: PathBuf::from("data/news.jsonl"),
            cryptocompare: CryptoCompareSection::default(),
            cryptopanic: CryptoPanicSection::default(),
            newsapi: NewsApiSection::default(),
            rss: RssSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CryptoCompareSection {
    pub enabled: bool,
    pub base_url: String,
    pub page_delay_ms: u64,
    pub long_pause_every: u32,
    pub long_pause_ms: u64,
}

impl Default for CryptoCompareSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: cryptocompare::DEFAULT_BASE_URL.to_string(),
            page_delay_ms: 250,
            long_pause_every: 10,
            long_pause_ms: 2_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CryptoPanicSection {
    pub enabled: bool,
    pub base_url: String,
    pub page_delay_ms: u64,
}

impl Default for CryptoPanicSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: cryptopanic::DEFAULT_BASE_URL.to_string(),
            page_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NewsApiSection {
    pub enabled: bool,
    pub base_url: String,
    pub query: String,
    pub chunk_hours: u64,
    pub max_chunks: u32,
    pub page_delay_ms: u64,
}

impl Default for NewsApiSection {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: newsapi::DEFAULT_BASE_URL.to_string(),
            query: newsapi::DEFAULT_QUERY.to_string(),
            chunk_hours: 24,
            max_chunks: 30,
            page_delay_ms: 500,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RssSection {
    pub enabled: bool,
    pub items_per_feed: usize,
    pub feed_delay_ms: u64,
    pub feeds: Vec<FeedSource>,
}

impl Default for RssSection {
    fn default() -> Self {
        Self {
            enabled: true,
            items_per_feed: 50,
            feed_delay_ms: 200,
            feeds: rss::default_feeds(),
        }
    }
}

fn delay(ms: u64) -> Pacing {
    Pacing {
        delay: Duration::from_millis(ms),
        long_pause_every: 0,
        long_pause: Duration::ZERO,
    }
}

fn env_key(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl IngestConfig {
    pub fn limits(&self) -> FetchLimits {
        FetchLimits {
            max_pages: self.max_pages,
            max_articles: self.max_articles,
        }
    }

    /// Enabled adapters in dedup priority order: publisher feeds first,
    /// then the aggregator APIs.
    pub fn build_adapters(&self) -> Result<Vec<Box<dyn SourceAdapter>>> {
        let client = build_client(Duration::from_secs(self.http_timeout_secs.max(1)))
            .context("building http client")?;
        let mut out: Vec<Box<dyn SourceAdapter>> = Vec::new();

        if self.rss.enabled {
            out.push(Box::new(RssAdapter::new(
                client.clone(),
                self.rss.feeds.clone(),
                self.rss.items_per_feed,
                delay(self.rss.feed_delay_ms),
            )));
        }
        if self.cryptocompare.enabled {
            let c = &self.cryptocompare;
            out.push(Box::new(CryptoCompareAdapter::new(
                client.clone(),
                &c.base_url,
                env_key(CRYPTOCOMPARE_KEY_ENV),
                Pacing {
                    delay: Duration::from_millis(c.page_delay_ms),
                    long_pause_every: c.long_pause_every,
                    long_pause: Duration::from_millis(c.long_pause_ms),
                },
            )));
        }
        if self.cryptopanic.enabled {
            out.push(Box::new(CryptoPanicAdapter::new(
                client.clone(),
                &self.cryptopanic.base_url,
                env_key(cryptopanic::API_KEY_ENV),
                delay(self.cryptopanic.page_delay_ms),
            )));
        }
        if self.newsapi.enabled {
            let n = &self.newsapi;
            out.push(Box::new(NewsApiAdapter::new(
                client,
                &n.base_url,
                env_key(newsapi::API_KEY_ENV),
                NewsApiSettings {
                    query: n.query.clone(),
                    chunk: Duration::from_secs(n.chunk_hours.max(1) * 3600),
                    max_chunks: n.max_chunks,
                    ..NewsApiSettings::default()
                },
                delay(n.page_delay_ms),
            )));
        }
        Ok(out)
    }
}

/// Load config from an explicit path. TOML or JSON, picked by extension.
pub fn load_config_from(path: &Path) -> Result<IngestConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("reading ingest config from {}", path.display()))?;
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or_default()
        .to_ascii_lowercase();
    parse_config(&content, &ext)
}

pub fn load_config_default() -> Result<IngestConfig> {
    if let Ok(p) = std::env::var(ENV_PATH) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return load_config_from(&pb);
        }
        return Err(anyhow!("{ENV_PATH} points to non-existent path"));
    }
    for candidate in ["config/ingest.toml", "config/ingest.json"] {
        let p = PathBuf::from(candidate);
        if p.exists() {
            return load_config_from(&p);
        }
    }
    Ok(IngestConfig::default())
}

fn parse_config(s: &str, hint_ext: &str) -> Result<IngestConfig> {
    if hint_ext == "json" {
        return serde_json::from_str(s).context("parsing ingest config json");
    }
    toml::from_str(s).context("parsing ingest config toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn toml_overrides_merge_with_defaults() {
        let cfg = parse_config(
            r#"
lookback_days = 30

[cryptopanic]
enabled = false

[rss]
items_per_feed = 5
feeds = [{ name = "CoinDesk", url = "https://feed.test/rss" }]
"#,
            "toml",
        )
        .unwrap();
        assert_eq!(cfg.lookback_days, 30);
        assert_eq!(cfg.max_articles, 1000);
        assert!(!cfg.cryptopanic.enabled);
        assert_eq!(cfg.rss.feeds.len(), 1);
        assert_eq!(cfg.newsapi.chunk_hours, 24);
    }

    #[test]
    fn json_is_accepted() {
        let cfg = parse_config(r#"{"max_pages": 3, "newsapi": {"enabled": false}}"#, "json").unwrap();
        assert_eq!(cfg.max_pages, 3);
        assert!(!cfg.newsapi.enabled);
        assert_eq!(cfg.limits().max_pages, 3);
    }

    #[test]
    fn disabled_sources_are_not_built() {
        let mut cfg = IngestConfig::default();
        cfg.cryptocompare.enabled = false;
        cfg.newsapi.enabled = false;
        let names: Vec<&str> = cfg
            .build_adapters()
            .unwrap()
            .iter()
            .map(|a| a.name())
            .collect();
        assert_eq!(names, vec!["RSS", "CryptoPanic"]);
    }

    #[serial_test::serial]
    #[test]
    fn default_uses_env_then_fallbacks() {
        let old = env::current_dir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        env::set_current_dir(tmp.path()).unwrap();
        env::remove_var(ENV_PATH);

        // nothing on disk → defaults
        let cfg = load_config_default().unwrap();
        assert_eq!(cfg.lookback_days, 90);

        let p = tmp.path().join("custom.json");
        fs::write(&p, r#"{"lookback_days": 7}"#).unwrap();
        env::set_var(ENV_PATH, p.display().to_string());
        assert_eq!(load_config_default().unwrap().lookback_days, 7);

        env::set_var(ENV_PATH, tmp.path().join("missing.toml").display().to_string());
        assert!(load_config_default().is_err());
        env::remove_var(ENV_PATH);

        env::set_current_dir(&old).unwrap();
    }
}
