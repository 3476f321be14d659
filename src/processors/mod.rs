//! Record processors: text cleaning and content deduplication.

pub mod cleaner;
pub mod dedup;

pub use cleaner::TextCleaner;
pub use dedup::{DedupStats, Deduplicator};
