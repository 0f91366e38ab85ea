// src/lib.rs
// Public library surface for the ingest binary and integration tests.

pub mod detect;
pub mod features;
pub mod ingest;
pub mod symbols;

// ---- Re-exports for stable public API ----
pub use crate::detect::{Relevance, SymbolDetector};
pub use crate::ingest::gateway::{JsonLinesGateway, MemoryGateway, PersistenceError, PersistenceGateway};
pub use crate::ingest::types::{FetchLimits, Harvest, NewsRecord, SourceAdapter, TimeWindow};
pub use crate::ingest::{dedupe, enrich, Aggregator, RunError, RunReport};
pub use crate::symbols::{AliasBook, AliasDictionary, SymbolEntry, SymbolRegistry};
