// src/detect.rs
//! Symbol detection over one alias dictionary snapshot.

use crate::symbols::AliasDictionary;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Where the ticker mention was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    /// An alias appears in the title.
    Direct,
    /// An alias appears only in the body.
    Related,
}

pub struct SymbolDetector<'a> {
    dict: &'a AliasDictionary,
}

impl<'a> SymbolDetector<'a> {
    pub fn new(dict: &'a AliasDictionary) -> Self {
        Self { dict }
    }

    /// All tracked tickers mentioned in `text`.
    pub fn detect(&self, text: &str) -> BTreeSet<String> {
        if text.is_empty() {
            return BTreeSet::new();
        }
        self.dict.matching_codes(&text.to_lowercase())
    }

    /// `Direct` when the title mentions a ticker, `Related` when only the
    /// combined title + body does. `None` means no mention at all; such
    /// records never make it to persistence.
    pub fn classify_relevance(&self, title: &str, body: &str) -> Option<Relevance> {
        if !self.detect(title).is_empty() {
            return Some(Relevance::Direct);
        }
        let combined = format!("{title} {body}");
        if self.detect(&combined).is_empty() {
            None
        } else {
            Some(Relevance::Related)
        }
    }
}
