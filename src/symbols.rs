// src/symbols.rs
//! # Alias Dictionary
//!
//! Maps tracked ticker codes (e.g. `ZEC`) to the lowercase aliases used to
//! spot them in news text (`"zec"`, `"zcash"`).
//!
//! - Built from a `SymbolRegistry` (the list of actively tracked tickers).
//! - `AliasBook` owns the current dictionary and swaps it as a whole on
//!   `refresh()`; detectors work on an immutable `snapshot()`.
//! - Refresh failures keep the last-known-good dictionary (or the built-in
//!   minimum set when nothing was ever loaded).
//! - The ticker code itself and any alias of 3 chars or fewer only match on
//!   word boundaries; longer names match as plain substrings.

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Aliases at or below this length need word boundaries around them.
pub const SHORT_ALIAS_MAX_LEN: usize = 3;

/// One tracked ticker as reported by a registry.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct SymbolEntry {
    pub code: String,
    /// Extra names on top of the code itself and the built-in names.
    #[serde(default)]
    pub aliases: Vec<String>,
}

impl SymbolEntry {
    pub fn new(code: &str) -> Self {
        Self {
            code: code.to_string(),
            aliases: Vec::new(),
        }
    }

    pub fn with_aliases(code: &str, aliases: &[&str]) -> Self {
        Self {
            code: code.to_string(),
            aliases: aliases.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// External source of truth for which tickers are tracked.
#[async_trait]
pub trait SymbolRegistry: Send + Sync {
    async fn list_active_symbols(&self) -> Result<Vec<SymbolEntry>>;
}

/// Fixed in-memory registry.
pub struct StaticRegistry {
    entries: Vec<SymbolEntry>,
}

impl StaticRegistry {
    pub fn new(entries: Vec<SymbolEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl SymbolRegistry for StaticRegistry {
    async fn list_active_symbols(&self) -> Result<Vec<SymbolEntry>> {
        Ok(self.entries.clone())
    }
}

/// Registry backed by a JSON file: either `["BTC", "ETH"]` or
/// `[{"code": "ZEC", "aliases": ["zcash"]}]`.
pub struct JsonFileRegistry {
    path: PathBuf,
}

impl JsonFileRegistry {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RegistryItem {
    Code(String),
    Entry(SymbolEntry),
}

#[async_trait]
impl SymbolRegistry for JsonFileRegistry {
    async fn list_active_symbols(&self) -> Result<Vec<SymbolEntry>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("reading symbol registry {}", self.path.display()))?;
        let items: Vec<RegistryItem> =
            serde_json::from_str(&raw).context("parsing symbol registry json")?;
        Ok(items
            .into_iter()
            .map(|it| match it {
                RegistryItem::Code(code) => SymbolEntry::new(&code),
                RegistryItem::Entry(e) => e,
            })
            .collect())
    }
}

/// Common names for well-known tickers, merged into registry entries.
const KNOWN_NAMES: &[(&str, &[&str])] = &[
    ("BTC", &["bitcoin"]),
    ("ETH", &["ethereum"]),
    ("SOL", &["solana"]),
    ("XRP", &["ripple"]),
    ("ADA", &["cardano"]),
    ("DOGE", &["dogecoin"]),
    ("LTC", &["litecoin"]),
    ("ZEC", &["zcash"]),
    ("XMR", &["monero"]),
    ("BNB", &["binance coin"]),
    ("DOT", &["polkadot"]),
    ("AVAX", &["avalanche"]),
    ("LINK", &["chainlink"]),
];

/// Minimum set used when no registry has ever been loaded successfully.
const FALLBACK_CODES: &[&str] = &["BTC", "ETH", "SOL", "XRP", "ZEC"];

#[derive(Debug, Clone)]
enum Matcher {
    Substring(String),
    Bounded(Regex),
}

impl Matcher {
    /// `whole_word` is set for the ticker code itself.
    fn for_alias(alias: &str, whole_word: bool) -> Self {
        if whole_word || alias.chars().count() <= SHORT_ALIAS_MAX_LEN {
            let pattern = format!(r"\b{}\b", regex::escape(alias));
            match Regex::new(&pattern) {
                Ok(re) => return Matcher::Bounded(re),
                Err(e) => warn!(target: "ingest", alias, error = ?e, "alias regex rejected"),
            }
        }
        Matcher::Substring(alias.to_string())
    }

    fn is_match(&self, lowered: &str) -> bool {
        match self {
            Matcher::Substring(s) => lowered.contains(s.as_str()),
            Matcher::Bounded(re) => re.is_match(lowered),
        }
    }
}

/// Immutable ticker → aliases mapping.
#[derive(Debug, Clone)]
pub struct AliasDictionary {
    aliases: BTreeMap<String, Vec<String>>,
    matchers: Vec<(String, Vec<Matcher>)>,
}

impl AliasDictionary {
    /// Builds the dictionary. Codes are uppercased; every code gets its own
    /// lowercase form plus any known names as aliases. Blank codes are ignored.
    pub fn from_entries(entries: &[SymbolEntry]) -> Self {
        let mut aliases: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for entry in entries {
            let code = entry.code.trim().to_ascii_uppercase();
            if code.is_empty() {
                continue;
            }
            let list = aliases.entry(code.clone()).or_default();
            let known = KNOWN_NAMES
                .iter()
                .find(|(c, _)| *c == code)
                .map(|(_, names)| *names)
                .unwrap_or_default();
            let candidates = std::iter::once(code.to_lowercase())
                .chain(known.iter().map(|s| s.to_string()))
                .chain(entry.aliases.iter().map(|a| a.trim().to_lowercase()));
            for alias in candidates {
                if !alias.is_empty() && !list.contains(&alias) {
                    list.push(alias);
                }
            }
        }

        let matchers = aliases
            .iter()
            .map(|(code, list)| {
                let lowered = code.to_lowercase();
                (
                    code.clone(),
                    list.iter()
                        .map(|a| Matcher::for_alias(a, *a == lowered))
                        .collect(),
                )
            })
            .collect();

        Self { aliases, matchers }
    }

    /// Hardcoded minimum set.
    pub fn fallback() -> Self {
        let entries: Vec<SymbolEntry> = FALLBACK_CODES.iter().map(|c| SymbolEntry::new(c)).collect();
        Self::from_entries(&entries)
    }

    pub fn contains(&self, code: &str) -> bool {
        self.aliases.contains_key(&code.to_ascii_uppercase())
    }

    pub fn aliases_of(&self, code: &str) -> Option<&[String]> {
        self.aliases
            .get(&code.to_ascii_uppercase())
            .map(|v| v.as_slice())
    }

    pub fn len(&self) -> usize {
        self.aliases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aliases.is_empty()
    }

    /// Tickers whose aliases occur in `lowered` (input must already be lowercase).
    pub(crate) fn matching_codes(&self, lowered: &str) -> BTreeSet<String> {
        self.matchers
            .iter()
            .filter(|(_, ms)| ms.iter().any(|m| m.is_match(lowered)))
            .map(|(code, _)| code.clone())
            .collect()
    }
}

/// Shared owner of the current dictionary.
#[derive(Clone)]
pub struct AliasBook {
    inner: Arc<RwLock<Arc<AliasDictionary>>>,
}

impl Default for AliasBook {
    fn default() -> Self {
        Self::new(AliasDictionary::fallback())
    }
}

impl AliasBook {
    pub fn new(dict: AliasDictionary) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(dict))),
        }
    }

    /// The dictionary as of now. Later refreshes do not affect it.
    pub fn snapshot(&self) -> Arc<AliasDictionary> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Reloads from `registry` and swaps the whole dictionary.
    /// Returns false (keeping the previous dictionary) when the registry
    /// fails or reports no symbols.
    pub async fn refresh(&self, registry: &dyn SymbolRegistry) -> bool {
        let entries = match registry.list_active_symbols().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(target: "ingest", error = ?e, "symbol registry refresh failed; keeping previous aliases");
                return false;
            }
        };

        let dict = AliasDictionary::from_entries(&entries);
        if dict.is_empty() {
            warn!(target: "ingest", "symbol registry returned no symbols; keeping previous aliases");
            return false;
        }

        info!(target: "ingest", symbols = dict.len(), "alias dictionary refreshed");
        match self.inner.write() {
            Ok(mut guard) => *guard = Arc::new(dict),
            Err(poisoned) => *poisoned.into_inner() = Arc::new(dict),
        }
        true
    }
}
