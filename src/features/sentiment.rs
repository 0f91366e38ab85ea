// src/features/sentiment.rs
//! Keyword-count sentiment for headlines. Deterministic, not a model.

/// Bullish vocabulary (matched as lowercase substrings of the space-padded title).
const POSITIVE: &[&str] = &[
    "surge",
    "soar",
    "rally",
    "rallies",
    "gains",
    "gained",
    "bullish",
    "record high",
    "all-time high",
    "breakout",
    "approve",
    "approval",
    "adoption",
    "upgrade",
    "partnership",
    "jump",
    "boost",
    "rebound",
    "recover",
    "inflow",
    "milestone",
];

/// Bearish vocabulary (matched as lowercase substrings).
const NEGATIVE: &[&str] = &[
    "crash",
    "plunge",
    "drop",
    "slump",
    "tumble",
    "bearish",
    "hack",
    "exploit",
    "scam",
    "fraud",
    "lawsuit",
    "sues",
    "sued",
    "banned",
    " ban ",
    " bans ",
    "sell-off",
    "selloff",
    "decline",
    "loss",
    "liquidat",
    "delist",
    "outflow",
    "warning",
];

fn count_hits(lowered: &str, words: &[&str]) -> usize {
    words.iter().map(|w| lowered.matches(w).count()).sum()
}

/// `(pos - neg) / (pos + neg)` over keyword occurrences in `title`,
/// clamped to `[-1.0, 1.0]`; exactly `0.0` without any keyword.
pub fn sentiment_score(title: &str) -> f64 {
    let lowered = format!(" {} ", title.to_lowercase());
    let pos = count_hits(&lowered, POSITIVE);
    let neg = count_hits(&lowered, NEGATIVE);
    if pos + neg == 0 {
        return 0.0;
    }
    let score = (pos as f64 - neg as f64) / (pos + neg) as f64;
    score.clamp(-1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn neutral_title_scores_zero() {
        assert_eq!(sentiment_score("Weekly market wrap"), 0.0);
        assert_eq!(sentiment_score(""), 0.0);
    }

    #[test]
    fn positive_only_is_positive() {
        let s = sentiment_score("Zcash announces major upgrade");
        assert!(s > 0.0);
        assert_eq!(s, 1.0);
    }

    #[test]
    fn negative_only_is_minus_one() {
        assert_eq!(sentiment_score("Exchange HACK leads to token plunge"), -1.0);
    }

    #[test]
    fn mixed_keywords_balance() {
        // one positive (rally), one negative (crash)
        let s = sentiment_score("Bitcoin rally fades after flash crash");
        assert!(s.abs() < 1e-9);
        // two positive (surge, inflow), one negative (warning)
        let s = sentiment_score("ETF inflow drives surge despite warning");
        assert!((s - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn keywords_do_not_fire_inside_other_words() {
        assert_eq!(sentiment_score("Banks embrace bitcoin"), 0.0);
        assert_eq!(sentiment_score("Bitcoin ETF issuers see record high"), 1.0);
        assert_eq!(sentiment_score("Urban miners try again"), 0.0);
    }

    #[test]
    fn ban_and_lawsuit_forms_are_negative() {
        assert_eq!(sentiment_score("China bans crypto mining"), -1.0);
        assert_eq!(sentiment_score("SEC sues exchange"), -1.0);
        assert_eq!(sentiment_score("Token gains 20%"), 1.0);
    }

    #[test]
    fn repeated_keywords_are_counted() {
        // "surge" twice, "drop" once
        let s = sentiment_score("surge, drop, surge");
        assert!((s - 1.0 / 3.0).abs() < 1e-9);
    }
}
