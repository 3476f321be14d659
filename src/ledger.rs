//! Run ledger: per-source counters and the run's error list.
//!
//! Stages report what happened through [`StageEvent`]s; the ledger only
//! accumulates. Counters never decrease during a run.

use std::collections::BTreeMap;
use std::fmt;

use crate::models::{Source, SourceStats};

/// Pipeline stage reporting into the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Collect,
    Parse,
    Clean,
    Dedupe,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Collect => "Collection",
            Stage::Parse => "Parsing",
            Stage::Clean => "Cleaning",
            Stage::Dedupe => "Deduplication",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a stage reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Items that made it through the stage.
    Count(u64),
    /// A failure, counted once.
    Error(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageEvent {
    pub source: Source,
    pub stage: Stage,
    pub outcome: Outcome,
}

impl StageEvent {
    pub fn count(source: Source, stage: Stage, n: u64) -> Self {
        Self {
            source,
            stage,
            outcome: Outcome::Count(n),
        }
    }

    pub fn error(source: Source, stage: Stage, message: impl Into<String>) -> Self {
        Self {
            source,
            stage,
            outcome: Outcome::Error(message.into()),
        }
    }
}

/// Accumulated statistics for a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunLedger {
    stats: BTreeMap<Source, SourceStats>,
    errors: Vec<String>,
}

impl RunLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `source` shows up in the snapshot even with zero counts.
    pub fn touch(&mut self, source: Source) {
        self.stats.entry(source).or_default();
    }

    pub fn record(&mut self, event: StageEvent) {
        let stats = self.stats.entry(event.source).or_default();
        match event.outcome {
            Outcome::Count(n) => match event.stage {
                Stage::Collect => stats.collected += n,
                Stage::Parse => stats.parsed += n,
                Stage::Clean => stats.cleaned += n,
                Stage::Dedupe => stats.deduplicated += n,
            },
            Outcome::Error(message) => {
                stats.errors += 1;
                self.errors
                    .push(format!("{} error ({}): {}", event.stage, event.source, message));
            }
        }
    }

    /// Counters for one source; zero if it was never touched.
    pub fn stats(&self, source: Source) -> SourceStats {
        self.stats.get(&source).copied().unwrap_or_default()
    }

    /// Per-source counters keyed by source name.
    pub fn snapshot(&self) -> BTreeMap<String, SourceStats> {
        self.stats
            .iter()
            .map(|(source, stats)| (source.as_str().to_string(), *stats))
            .collect()
    }

    /// Sources in canonical order with their counters.
    pub fn sources(&self) -> impl Iterator<Item = (Source, SourceStats)> + '_ {
        self.stats.iter().map(|(source, stats)| (*source, *stats))
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    /// Records emitted by all extractors.
    pub fn total_records(&self) -> u64 {
        self.stats.values().map(|s| s.parsed).sum()
    }

    /// Records kept after deduplication.
    pub fn deduplicated_records(&self) -> u64 {
        self.stats.values().map(|s| s.deduplicated).sum()
    }

    /// Fold another ledger into this one. Errors are appended after ours.
    pub fn merge(&mut self, other: RunLedger) {
        for (source, stats) in other.stats {
            self.stats.entry(source).or_default().merge(&stats);
        }
        self.errors.extend(other.errors);
    }

    /// Plain-text report, one line per source.
    pub fn summary(&self) -> String {
        let mut out = format!(
            "Total records: {}\nAfter deduplication: {}\n",
            self.total_records(),
            self.deduplicated_records()
        );
        for (source, stats) in &self.stats {
            out.push_str(&format!(
                "  {}: {} collected, {} parsed, {} cleaned, {} final, {} errors\n",
                source,
                stats.collected,
                stats.parsed,
                stats.cleaned,
                stats.deduplicated,
                stats.errors
            ));
        }
        if !self.errors.is_empty() {
            out.push_str(&format!("Errors ({}):\n", self.errors.len()));
            for error in &self.errors {
                out.push_str(&format!("  - {}\n", error));
            }
        }
        out
    }
}
