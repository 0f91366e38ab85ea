// src/features/tags.rs
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Fixed category vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tag {
    Regulation,
    Security,
    Upgrade,
    Etf,
    Defi,
    Nft,
    Exchange,
    Adoption,
    Macro,
    Price,
}

const TAG_KEYWORDS: &[(Tag, &[&str])] = &[
    (
        Tag::Regulation,
        &["regulat", " sec ", "cftc", "lawsuit", "court", "legislation", "compliance", " ban ", " bans "],
    ),
    (
        Tag::Security,
        &["hack", "exploit", "breach", "stolen", "vulnerability", "phishing", "scam"],
    ),
    (
        Tag::Upgrade,
        &["upgrade", "hard fork", "hardfork", "mainnet", "testnet", "network update"],
    ),
    (Tag::Etf, &["etf"]),
    (
        Tag::Defi,
        &["defi", " dex ", " dexes ", "liquidity pool", "lending", "yield", "staking"],
    ),
    (Tag::Nft, &["nft"]),
    (
        Tag::Exchange,
        &["exchange", "binance", "coinbase", "kraken", "listing", "delist"],
    ),
    (
        Tag::Adoption,
        &["adoption", "partnership", "integrat", "accepts", "payments"],
    ),
    (
        Tag::Macro,
        &["federal reserve", " fed ", " fed's ", "inflation", "interest rate", " cpi ", "recession"],
    ),
    (
        Tag::Price,
        &["price", "surge", "rally", "crash", "plunge", "all-time high", "record high"],
    ),
];

/// Every tag with at least one keyword in the lowercased `title`.
pub fn extract_tags(title: &str) -> BTreeSet<Tag> {
    // padded so space-delimited keywords like " sec " also hit at either end
    let lowered = format!(" {} ", title.to_lowercase());
    TAG_KEYWORDS
        .iter()
        .filter(|(_, kws)| kws.iter().any(|k| lowered.contains(k)))
        .map(|(tag, _)| *tag)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upgrade_headline() {
        let tags = extract_tags("Zcash announces major upgrade");
        assert!(tags.contains(&Tag::Upgrade));
    }

    #[test]
    fn multiple_tags() {
        let tags = extract_tags("SEC delays spot ETF decision as Bitcoin price slides");
        assert_eq!(
            tags,
            BTreeSet::from([Tag::Regulation, Tag::Etf, Tag::Price])
        );
    }

    #[test]
    fn short_keywords_need_whole_words() {
        let tags = extract_tags("Crypto index funds see unfed demand");
        assert!(!tags.contains(&Tag::Defi));
        assert!(!tags.contains(&Tag::Macro));

        let tags = extract_tags("Uniswap DEX volume climbs as Fed pauses");
        assert!(tags.contains(&Tag::Defi));
        assert!(tags.contains(&Tag::Macro));
    }

    #[test]
    fn no_tags() {
        assert!(extract_tags("Community call recap").is_empty());
    }

    #[test]
    fn serializes_lowercase() {
        let s = serde_json::to_string(&Tag::Defi).unwrap();
        assert_eq!(s, "\"defi\"");
    }
}
