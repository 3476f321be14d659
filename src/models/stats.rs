//! Run statistics and manifest models.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Counters for a single source. Values only ever grow during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStats {
    /// Raw documents found at the source location.
    pub collected: u64,
    /// Records emitted by the extractor.
    pub parsed: u64,
    /// Records that survived cleaning and gating.
    pub cleaned: u64,
    /// Records kept by the deduplicator.
    pub deduplicated: u64,
    /// Document-level failures.
    pub errors: u64,
}

impl SourceStats {
    /// Merge stats from another instance.
    pub fn merge(&mut self, other: &SourceStats) {
        self.collected += other.collected;
        self.parsed += other.parsed;
        self.cleaned += other.cleaned;
        self.deduplicated += other.deduplicated;
        self.errors += other.errors;
    }
}

/// Pipeline run manifest written next to the exported records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    /// Unique run identifier.
    pub run_id: String,
    pub run_timestamp: DateTime<Utc>,
    /// Short hash of the effective configuration.
    pub config_hash: String,
    pub date_range_start: NaiveDate,
    pub date_range_end: NaiveDate,
    /// Per-source statistics, keyed by source name.
    #[serde(default)]
    pub sources_processed: BTreeMap<String, SourceStats>,
    /// Records emitted by all extractors.
    pub total_records: u64,
    /// Records left after deduplication.
    pub deduplicated_records: u64,
    /// Output filename to SHA-256 checksum.
    #[serde(default)]
    pub output_files: BTreeMap<String, String>,
    #[serde(default)]
    pub errors: Vec<String>,
    pub pipeline_version: String,
}
