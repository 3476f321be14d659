//! Content-hash deduplication across sources.
//!
//! The key is a fingerprint of the configured record fields, not
//! `(source, source_id)`: the same speech republished by two sources is
//! one record. The first occurrence in stream order is kept.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use crate::config::{HashAlgorithm, ProcessingConfig};
use crate::models::{RecordField, Source, SpeechRecord};
use crate::utils::compute_hash;

/// Snapshot of deduplication counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DedupStats {
    pub total_seen: u64,
    pub unique: u64,
    pub duplicates_found: u64,
    pub duplicate_rate: f64,
    /// Duplicates keyed by the source of the discarded record.
    pub source_duplicates: BTreeMap<Source, u64>,
}

/// First-seen filter over content fingerprints.
///
/// One instance accumulates state for a whole run; feeding it two streams
/// treats them as one.
#[derive(Debug)]
pub struct Deduplicator {
    algorithm: HashAlgorithm,
    fields: Vec<RecordField>,
    seen: HashSet<String>,
    hash_to_source: HashMap<String, Source>,
    total_seen: u64,
    duplicates_found: u64,
    source_duplicates: BTreeMap<Source, u64>,
}

impl Deduplicator {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            algorithm: config.dedupe_hash_algorithm,
            fields: config.dedupe_fields.clone(),
            seen: HashSet::new(),
            hash_to_source: HashMap::new(),
            total_seen: 0,
            duplicates_found: 0,
            source_duplicates: BTreeMap::new(),
        }
    }

    /// Fingerprint of a record: non-empty configured fields joined by `\n`.
    pub fn compute_record_hash(&self, record: &SpeechRecord) -> String {
        let parts: Vec<_> = self
            .fields
            .iter()
            .filter_map(|field| record.field_value(*field))
            .filter(|value| !value.is_empty())
            .collect();
        compute_hash(&parts.join("\n"), self.algorithm)
    }

    /// Whether a record's fingerprint was already admitted. Does not
    /// change any state.
    pub fn is_duplicate(&self, record: &SpeechRecord) -> bool {
        self.seen.contains(&self.compute_record_hash(record))
    }

    /// Source that first produced a fingerprint.
    pub fn first_source(&self, hash: &str) -> Option<Source> {
        self.hash_to_source.get(hash).copied()
    }

    /// Admit one record. Returns it with `text_hash` set if its content is
    /// new, or `None` if it duplicates an earlier record.
    pub fn admit(&mut self, record: SpeechRecord) -> Option<SpeechRecord> {
        self.total_seen += 1;
        let hash = self.compute_record_hash(&record);

        if self.seen.contains(&hash) {
            self.duplicates_found += 1;
            *self.source_duplicates.entry(record.source).or_insert(0) += 1;
            tracing::debug!(
                "Duplicate: {}/{} matches {}",
                record.source,
                record.source_id,
                self.first_source(&hash)
                    .map(|s| s.as_str())
                    .unwrap_or("unknown")
            );
            return None;
        }

        self.seen.insert(hash.clone());
        self.hash_to_source.insert(hash.clone(), record.source);
        Some(record.with_text_hash(hash))
    }

    /// Lazily filter a stream, keeping first occurrences only.
    pub fn dedupe<'a, I>(&'a mut self, records: I) -> impl Iterator<Item = SpeechRecord> + 'a
    where
        I: IntoIterator<Item = SpeechRecord>,
        I::IntoIter: 'a,
    {
        records.into_iter().filter_map(move |record| self.admit(record))
    }

    pub fn stats(&self) -> DedupStats {
        DedupStats {
            total_seen: self.total_seen,
            unique: self.seen.len() as u64,
            duplicates_found: self.duplicates_found,
            duplicate_rate: if self.total_seen > 0 {
                self.duplicates_found as f64 / self.total_seen as f64
            } else {
                0.0
            },
            source_duplicates: self.source_duplicates.clone(),
        }
    }

    /// Forget everything seen so far.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.hash_to_source.clear();
        self.total_seen = 0;
        self.duplicates_found = 0;
        self.source_duplicates.clear();
    }
}
