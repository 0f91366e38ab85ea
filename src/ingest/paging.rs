// src/ingest/paging.rs
//! Termination bookkeeping shared by the paginated adapters.
//!
//! Every adapter loop looks the same: ask the guard whether another request
//! is allowed, fetch, run the page through `scan_page`, hand the scan to
//! `PageGuard::admit`, stop on the returned reason. The adapters only differ
//! in how they compute the next request.

use serde::Serialize;
use std::time::Duration;

use crate::ingest::types::{FetchLimits, NewsRecord, TimeWindow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Page carried no new articles.
    EmptyPage,
    /// An article older than the cutoff was seen.
    CutoffReached,
    MaxPages,
    MaxArticles,
    /// Source returned no next-page cursor.
    NoCursor,
    /// A page request failed after earlier pages succeeded.
    RequestFailed,
    /// Date-range slicing reached the window start.
    WindowExhausted,
    MaxChunks,
    /// Fixed feed list fully polled.
    FeedsDone,
}

/// One page after cutoff filtering.
#[derive(Debug, Default)]
pub struct PageScan {
    pub kept: Vec<NewsRecord>,
    /// Articles the page contributed before filtering.
    pub fresh: usize,
    pub reached_cutoff: bool,
    pub oldest_ms: Option<i64>,
}

/// Drops articles outside `window`, remembering whether any was past the cutoff.
pub fn scan_page(records: Vec<NewsRecord>, window: &TimeWindow) -> PageScan {
    let mut scan = PageScan {
        fresh: records.len(),
        ..PageScan::default()
    };
    for rec in records {
        let ts = rec.timestamp();
        scan.oldest_ms = Some(scan.oldest_ms.map_or(ts, |o| o.min(ts)));
        if ts < window.cutoff_ms() {
            scan.reached_cutoff = true;
            continue;
        }
        if ts > window.end_ms {
            continue;
        }
        scan.kept.push(rec);
    }
    scan
}

#[derive(Debug)]
pub struct PageGuard {
    max_pages: u32,
    max_articles: usize,
    pages: u32,
    collected: usize,
}

impl PageGuard {
    pub fn new(limits: &FetchLimits) -> Self {
        Self {
            max_pages: limits.max_pages,
            max_articles: limits.max_articles,
            pages: 0,
            collected: 0,
        }
    }

    pub fn pages(&self) -> u32 {
        self.pages
    }

    /// `Some` when no further request may be issued.
    pub fn before_request(&self) -> Option<StopReason> {
        if self.pages >= self.max_pages {
            return Some(StopReason::MaxPages);
        }
        if self.collected >= self.max_articles {
            return Some(StopReason::MaxArticles);
        }
        None
    }

    /// Accepts a scanned page (capped to the remaining article budget) and
    /// reports whether pagination must end after it.
    pub fn admit(&mut self, scan: PageScan) -> (Vec<NewsRecord>, Option<StopReason>) {
        self.pages += 1;
        let mut kept = scan.kept;
        let room = self.max_articles.saturating_sub(self.collected);
        kept.truncate(room);
        self.collected += kept.len();

        let stop = if scan.fresh == 0 {
            Some(StopReason::EmptyPage)
        } else if scan.reached_cutoff {
            Some(StopReason::CutoffReached)
        } else if self.collected >= self.max_articles {
            Some(StopReason::MaxArticles)
        } else {
            None
        };
        (kept, stop)
    }
}

/// Fixed delay between requests to one source plus a longer pause every N pages.
#[derive(Debug, Clone, Copy)]
pub struct Pacing {
    pub delay: Duration,
    pub long_pause_every: u32,
    pub long_pause: Duration,
}

impl Pacing {
    pub fn none() -> Self {
        Self {
            delay: Duration::ZERO,
            long_pause_every: 0,
            long_pause: Duration::ZERO,
        }
    }

    /// Sleep owed after `pages_done` pages.
    pub fn pause_after(&self, pages_done: u32) -> Duration {
        if self.long_pause_every > 0 && pages_done > 0 && pages_done % self.long_pause_every == 0 {
            self.delay + self.long_pause
        } else {
            self.delay
        }
    }

    pub async fn wait(&self, pages_done: u32) {
        let d = self.pause_after(pages_done);
        if !d.is_zero() {
            tokio::time::sleep(d).await;
        }
    }
}
