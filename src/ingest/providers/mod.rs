// src/ingest/providers/mod.rs
//! Source adapters, one per pagination idiom:
//! - `cryptocompare`: timestamp cursor (`lTs`)
//! - `cryptopanic`: opaque `next` cursor
//! - `newsapi`: fixed-size date-range slices
//! - `rss`: fixed feed list, no paging
pub mod cryptocompare;
pub mod cryptopanic;
pub mod newsapi;
pub mod rss;

pub use cryptocompare::CryptoCompareAdapter;
pub use cryptopanic::CryptoPanicAdapter;
pub use newsapi::{NewsApiAdapter, NewsApiSettings};
pub use rss::{FeedSource, RssAdapter};
