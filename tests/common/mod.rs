#![allow(dead_code)]

use chrono::{Duration, Utc};
use crypto_news_ingest::ingest::http::build_client;
use crypto_news_ingest::TimeWindow;

pub const DAY_SECS: i64 = 86_400;

pub fn client() -> reqwest::Client {
    build_client(std::time::Duration::from_secs(5)).unwrap()
}

/// `now - days .. now`, plus `now` in unix seconds.
pub fn lookback(days: u32) -> (TimeWindow, i64) {
    let now = Utc::now();
    (TimeWindow::lookback(now, days), now.timestamp())
}

pub fn days_ago_secs(now_secs: i64, days: i64) -> i64 {
    now_secs - days * DAY_SECS
}

pub fn rfc2822_days_ago(days: i64) -> String {
    (Utc::now() - Duration::days(days)).to_rfc2822()
}

pub fn rss_feed(items: &[(&str, &str, String)]) -> String {
    let mut body = String::from(r#"<?xml version="1.0"?><rss version="2.0"><channel><title>t</title>"#);
    for (title, link, date) in items {
        body.push_str(&format!(
            "<item><title>{title}</title><link>{link}</link><pubDate>{date}</pubDate></item>"
        ));
    }
    body.push_str("</channel></rss>");
    body
}
