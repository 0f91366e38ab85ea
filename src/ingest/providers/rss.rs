// src/ingest/providers/rss.rs
//! Fixed list of RSS feeds. No time-bounded query exists, so each feed is
//! polled once for its latest items and filtered locally against the cutoff.

use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;
use time::{format_description::well_known::Rfc2822, OffsetDateTime};

use crate::ingest::error::SourceError;
use crate::ingest::http::get_text;
use crate::ingest::normalize_text;
use crate::ingest::paging::{Pacing, StopReason};
use crate::ingest::types::{FetchLimits, Harvest, NewsRecord, SourceAdapter, TimeWindow};

pub const NAME: &str = "RSS";

#[derive(Debug, Deserialize)]
struct Rss {
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct Channel {
    #[serde(rename = "item", default)]
    item: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    guid: Option<String>,
    #[serde(rename = "pubDate")]
    pub_date: Option<String>,
    description: Option<String>,
}

/// One feed in the poll list; `name` becomes the record's `source`.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
}

impl FeedSource {
    pub fn new(name: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            url: url.to_string(),
        }
    }
}

pub fn default_feeds() -> Vec<FeedSource> {
    vec![
        FeedSource::new("CoinDesk", "https://www.coindesk.com/arc/outboundfeeds/rss/"),
        FeedSource::new("Cointelegraph", "https://cointelegraph.com/rss"),
        FeedSource::new("Decrypt", "https://decrypt.co/feed"),
        FeedSource::new("The Block", "https://www.theblock.co/rss.xml"),
        FeedSource::new("Bitcoin.com", "https://news.bitcoin.com/feed/"),
        FeedSource::new("CryptoSlate", "https://cryptoslate.com/feed/"),
    ]
}

/// Unix millis from an RFC 2822 `pubDate` (RFC 3339 also accepted). 0 when unknown.
fn parse_pub_date_ms(ts: &str) -> i64 {
    let ts = ts.trim();
    if let Ok(dt) = OffsetDateTime::parse(ts, &Rfc2822) {
        return i64::try_from(dt.unix_timestamp_nanos() / 1_000_000).unwrap_or(0);
    }
    chrono::DateTime::parse_from_rfc2822(ts)
        .or_else(|_| chrono::DateTime::parse_from_rfc3339(ts))
        .map(|dt| dt.timestamp_millis())
        .unwrap_or(0)
}

/// Entities that are valid HTML but not XML break the parser.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
        .replace("&hellip;", "...")
}

/// Parses a feed body into records (at most `limit` items, in feed order).
/// Items without a usable date are dropped.
pub(crate) fn parse_feed(xml: &str, source: &str, limit: usize) -> Result<Vec<NewsRecord>, SourceError> {
    let rss: Rss = from_str(&scrub_html_entities_for_xml(xml))?;
    let mut out = Vec::with_capacity(rss.channel.item.len().min(limit));
    for it in rss.channel.item.into_iter().take(limit) {
        let ts = it.pub_date.as_deref().map(parse_pub_date_ms).unwrap_or(0);
        let url = it.link.or(it.guid).unwrap_or_default();
        let Some(rec) = NewsRecord::new(
            ts,
            normalize_text(it.title.as_deref().unwrap_or_default()),
            source,
            url.trim(),
        ) else {
            continue;
        };
        out.push(rec.with_body(normalize_text(it.description.as_deref().unwrap_or_default())));
    }
    Ok(out)
}

pub struct RssAdapter {
    client: reqwest::Client,
    feeds: Vec<FeedSource>,
    items_per_feed: usize,
    pacing: Pacing,
}

impl RssAdapter {
    pub fn new(client: reqwest::Client, feeds: Vec<FeedSource>, items_per_feed: usize, pacing: Pacing) -> Self {
        Self {
            client,
            feeds,
            items_per_feed,
            pacing,
        }
    }

    async fn fetch_feed(&self, feed: &FeedSource) -> Result<Vec<NewsRecord>, SourceError> {
        let body = get_text(self.client.get(&feed.url)).await?;
        parse_feed(&body, &feed.name, self.items_per_feed)
    }
}

#[async_trait]
impl SourceAdapter for RssAdapter {
    async fn fetch(
        &self,
        window: &TimeWindow,
        limits: &FetchLimits,
    ) -> Result<Harvest, SourceError> {
        if self.feeds.is_empty() {
            return Err(SourceError::configuration(NAME, "no feeds configured"));
        }

        let t0 = std::time::Instant::now();
        let mut harvest = Harvest::default();
        let mut stop = StopReason::FeedsDone;

        for (i, feed) in self.feeds.iter().enumerate() {
            if harvest.records.len() >= limits.max_articles {
                stop = StopReason::MaxArticles;
                break;
            }
            if i > 0 {
                self.pacing.wait(i as u32).await;
            }
            match self.fetch_feed(feed).await {
                Ok(items) => {
                    let before = harvest.records.len();
                    let room = limits.max_articles - before;
                    harvest.records.extend(
                        items
                            .into_iter()
                            .filter(|r| r.timestamp() >= window.cutoff_ms())
                            .take(room),
                    );
                    tracing::debug!(target: "ingest", feed = %feed.name, kept = harvest.records.len() - before, "feed polled");
                }
                Err(e) => {
                    tracing::warn!(target: "ingest", feed = %feed.name, error = %e, "feed failed; continuing");
                    counter!("ingest_provider_errors_total", "kind" => e.kind()).increment(1);
                    harvest.soft_failures.push(e);
                }
            }
        }

        histogram!("ingest_fetch_ms", "source" => NAME).record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_events_total", "source" => NAME).increment(harvest.records.len() as u64);
        tracing::info!(target: "ingest", source = NAME, feeds = self.feeds.len(), records = harvest.records.len(), failed = harvest.soft_failures.len(), "source done");
        Ok(harvest.with_stop(stop))
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>Test feed</title>
    <item>
      <title><![CDATA[Solana &amp; friends rally]]></title>
      <link>https://feed.test/a</link>
      <pubDate>Tue, 05 Mar 2024 10:00:00 +0000</pubDate>
      <description><![CDATA[<p>html body</p>]]></description>
    </item>
    <item>
      <title>No date</title>
      <link>https://feed.test/b</link>
    </item>
    <item>
      <title>Guid only</title>
      <guid>https://feed.test/c</guid>
      <pubDate>2024-03-04T09:00:00Z</pubDate>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_drops_undated() {
        let recs = parse_feed(FEED, "Test", 10).unwrap();
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].source, "Test");
        assert_eq!(recs[0].body, "html body");
        assert_eq!(recs[0].url, "https://feed.test/a");
        assert_eq!(recs[0].datetime(), "2024-03-05T10:00:00.000Z");
        assert_eq!(recs[1].url, "https://feed.test/c");
    }

    #[test]
    fn limit_applies_before_filtering() {
        let recs = parse_feed(FEED, "Test", 1).unwrap();
        assert_eq!(recs.len(), 1);
    }

    #[test]
    fn empty_channel_is_ok() {
        let xml = r#"<rss><channel><title>x</title></channel></rss>"#;
        assert!(parse_feed(xml, "X", 5).unwrap().is_empty());
    }

    #[test]
    fn garbage_is_parse_error() {
        let err = parse_feed("not xml at all", "X", 5).unwrap_err();
        assert_eq!(err.kind(), "parse");
    }

    #[test]
    fn rfc2822_and_rfc3339_dates() {
        assert_eq!(
            parse_pub_date_ms("Tue, 05 Mar 2024 10:00:00 GMT"),
            1_709_632_800_000
        );
        assert_eq!(parse_pub_date_ms("2024-03-05T10:00:00Z"), 1_709_632_800_000);
        assert_eq!(parse_pub_date_ms("garbage"), 0);
    }
}
