// src/features/source_weights.rs
//! # Source Weights
//!
//! Maps news outlets (e.g. "CoinDesk", "Cointelegraph", "Reuters") to
//! curated trust weights in the range `[0.0, 1.0]`.
//!
//! - Loads from JSON config (weights + aliases), falls back to `default_seed()`.
//! - Case-insensitive lookup with normalization of punctuation, dashes, etc.
//! - Fallback order: aliases → exact match → substring match → default.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::{collections::HashMap, fs, path::Path};

/// Weight used for outlets missing from the table.
pub const DEFAULT_SOURCE_WEIGHT: f32 = 0.50;

#[derive(Debug, Clone, Deserialize)]
pub struct SourceWeights {
    #[serde(default = "default_default_weight")]
    pub default_weight: f32,
    /// Explicit weights for canonical source names.
    #[serde(default)]
    pub weights: HashMap<String, f32>,
    /// Aliases mapping non-canonical names → canonical names.
    #[serde(default)]
    pub aliases: HashMap<String, String>,
}

fn default_default_weight() -> f32 {
    DEFAULT_SOURCE_WEIGHT
}

static SEED: Lazy<SourceWeights> = Lazy::new(SourceWeights::default_seed);

/// Weight for `source` using the built-in table.
pub fn source_weight(source: &str) -> f32 {
    SEED.weight_for(source)
}

impl SourceWeights {
    /// Load from a JSON file; the built-in seed is used on any error.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match fs::read_to_string(path) {
            Ok(s) => serde_json::from_str::<SourceWeights>(&s)
                .map(|w| w.normalized())
                .unwrap_or_else(|e| {
                    tracing::warn!(target: "ingest", error = ?e, path = %path.display(), "bad source weights file; using seed");
                    Self::default_seed()
                }),
            Err(_) => Self::default_seed(),
        }
    }

    pub fn weight_for(&self, source: &str) -> f32 {
        let s = normalize(source);
        if s.is_empty() {
            return clamp01(self.default_weight);
        }

        if let Some(canon) = self.aliases.get(&s) {
            if let Some(&w) = self.weights.get(&normalize(canon)) {
                return clamp01(w);
            }
        }

        if let Some(&w) = self.weights.get(&s) {
            return clamp01(w);
        }

        // Longest key first so "bitcoin magazine" beats "bitcoin com" style overlaps.
        let mut best: Option<(&str, f32)> = None;
        for (k, &w) in &self.weights {
            if s.contains(k.as_str()) && best.map_or(true, |(bk, _)| k.len() > bk.len()) {
                best = Some((k.as_str(), w));
            }
        }
        if let Some((_, w)) = best {
            return clamp01(w);
        }

        clamp01(self.default_weight)
    }

    /// Keys from files are normalized the same way lookups are.
    fn normalized(self) -> Self {
        Self {
            default_weight: self.default_weight,
            weights: self
                .weights
                .into_iter()
                .map(|(k, v)| (normalize(&k), v))
                .collect(),
            aliases: self
                .aliases
                .into_iter()
                .map(|(k, v)| (normalize(&k), normalize(&v)))
                .collect(),
        }
    }

    pub fn default_seed() -> Self {
        let mut weights = HashMap::new();
        let mut aliases = HashMap::new();

        for (k, v) in [
            ("reuters", 0.95),
            ("bloomberg", 0.95),
            ("coindesk", 0.90),
            ("the block", 0.88),
            ("cointelegraph", 0.85),
            ("decrypt", 0.82),
            ("blockworks", 0.82),
            ("cryptoslate", 0.75),
            ("bitcoin magazine", 0.75),
            ("cryptocompare", 0.72),
            ("cryptopanic", 0.70),
            ("bitcoin com", 0.65),
            ("cryptopotato", 0.62),
            ("bitcoinist", 0.60),
            ("newsbtc", 0.58),
            ("u today", 0.58),
            ("coingape", 0.55),
        ] {
            weights.insert(k.to_string(), v);
        }

        for (a, c) in [
            ("coindesk com", "coindesk"),
            ("cointelegraph com", "cointelegraph"),
            ("theblock", "the block"),
            ("theblock co", "the block"),
            ("decrypt co", "decrypt"),
            ("news bitcoin com", "bitcoin com"),
            ("bitcoincom", "bitcoin com"),
            ("utoday", "u today"),
            ("crypto potato", "cryptopotato"),
            ("cc", "cryptocompare"),
        ] {
            aliases.insert(a.to_string(), c.to_string());
        }

        Self {
            default_weight: DEFAULT_SOURCE_WEIGHT,
            weights,
            aliases,
        }
    }
}

/// Lowercase, replace punctuation/dashes with spaces, collapse spaces.
fn normalize(s: &str) -> String {
    let mut out = s.trim().to_lowercase();
    for ch in ['—', '–', '-', '_', '/', '\\', '.', ',', '\'', '’'] {
        out = out.replace(ch, " ");
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn clamp01(x: f32) -> f32 {
    x.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_and_case_insensitive() {
        assert!((source_weight("CoinDesk") - 0.90).abs() < 1e-6);
        assert!((source_weight("COINDESK") - 0.90).abs() < 1e-6);
    }

    #[test]
    fn aliases_and_domains() {
        assert!((source_weight("cointelegraph.com") - 0.85).abs() < 1e-6);
        assert!((source_weight("U.Today") - 0.58).abs() < 1e-6);
        assert!((source_weight("news.bitcoin.com") - 0.65).abs() < 1e-6);
    }

    #[test]
    fn substring_prefers_longest_key() {
        assert!((source_weight("Bitcoin Magazine Pro") - 0.75).abs() < 1e-6);
    }

    #[test]
    fn unknown_and_empty_use_default() {
        assert!((source_weight("Totally Unknown Blog") - DEFAULT_SOURCE_WEIGHT).abs() < 1e-6);
        assert!((source_weight("") - DEFAULT_SOURCE_WEIGHT).abs() < 1e-6);
    }

    #[test]
    fn file_values_are_clamped_and_normalized() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("weights.json");
        fs::write(
            &p,
            r#"{"default_weight": 0.4, "weights": {"My-Feed": 1.7}, "aliases": {"mf": "my feed"}}"#,
        )
        .unwrap();
        let w = SourceWeights::load_from_file(&p);
        assert!((w.weight_for("my feed") - 1.0).abs() < 1e-6);
        assert!((w.weight_for("MF") - 1.0).abs() < 1e-6);
        assert!((w.weight_for("other") - 0.4).abs() < 1e-6);
    }

    #[test]
    fn missing_file_falls_back_to_seed() {
        let w = SourceWeights::load_from_file("__no_such_weights__.json");
        assert!((w.weight_for("Reuters") - 0.95).abs() < 1e-6);
    }
}
