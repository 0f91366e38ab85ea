// src/features/mod.rs
//! Pure per-record features: source trust weight, headline sentiment, tags.

pub mod sentiment;
pub mod source_weights;
pub mod tags;

pub use sentiment::sentiment_score;
pub use source_weights::{source_weight, SourceWeights, DEFAULT_SOURCE_WEIGHT};
pub use tags::{extract_tags, Tag};
