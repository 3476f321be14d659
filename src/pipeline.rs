//! Pipeline orchestration: extract, clean and gate, deduplicate, sink.
//!
//! Sources are always handed to the deduplicator in configured order, so
//! "first seen wins" gives the same result whether extraction ran
//! sequentially or concurrently.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use thiserror::Error;

use crate::config::Config;
use crate::ledger::{RunLedger, Stage, StageEvent};
use crate::models::{Source, SpeechRecord};
use crate::parsers::{build_extractor, Extracted};
use crate::processors::{DedupStats, Deduplicator, TextCleaner};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to write record: {0}")]
    Sink(#[from] io::Error),

    #[error("Extraction task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Outcome of a pipeline run.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Short run identifier, `run_` followed by 8 hex digits.
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub ledger: RunLedger,
    pub dedup: DedupStats,
    /// Set when the run stopped early on request.
    pub cancelled: bool,
}

/// Clean-and-gate stage shared by both execution modes.
struct Gate<'a> {
    cleaner: TextCleaner,
    min_text_length: usize,
    exclude_speaker_roles: &'a [String],
}

impl<'a> Gate<'a> {
    fn new(config: &'a Config) -> Self {
        Self {
            cleaner: TextCleaner::new(&config.processing),
            min_text_length: config.processing.min_text_length,
            exclude_speaker_roles: &config.processing.exclude_speaker_roles,
        }
    }

    /// Count an extractor item and return the cleaned record if it passes
    /// length and role gating.
    fn process(&self, source: Source, item: Extracted, ledger: &mut RunLedger) -> Option<SpeechRecord> {
        let record = match item {
            Extracted::Record(record) => record,
            Extracted::Failed(failure) => {
                ledger.record(StageEvent::error(
                    source,
                    Stage::Parse,
                    format!("{}: {}", failure.document.display(), failure.error),
                ));
                return None;
            }
        };
        ledger.record(StageEvent::count(source, Stage::Parse, 1));

        let speaker = self.cleaner.clean_speaker(&record.speaker);
        let title = self.cleaner.clean_title(&record.title);
        let mut record = self.cleaner.clean(record);
        record.speaker = speaker;
        record.title = title;

        if record.text.chars().count() < self.min_text_length {
            tracing::debug!(
                "Dropping {}/{}: text shorter than {} characters",
                record.source,
                record.source_id,
                self.min_text_length
            );
            return None;
        }
        if let Some(role) = &record.speaker_role {
            if self.exclude_speaker_roles.iter().any(|r| r == role) {
                return None;
            }
        }

        ledger.record(StageEvent::count(source, Stage::Clean, 1));
        Some(record)
    }
}

/// Everything one source produced before deduplication.
struct SourceBatch {
    ledger: RunLedger,
    records: Vec<SpeechRecord>,
    cancelled: bool,
}

/// Extract, clean and gate one whole source. Runs on a blocking thread.
fn extract_source(source: Source, config: &Config, location: &Path, cancel: &AtomicBool) -> SourceBatch {
    let gate = Gate::new(config);
    let extractor = build_extractor(source, config);
    let mut ledger = RunLedger::new();
    ledger.touch(source);
    ledger.record(StageEvent::count(
        source,
        Stage::Collect,
        extractor.document_count(location),
    ));

    let mut records = Vec::new();
    for item in extractor.parse(location) {
        if cancel.load(Ordering::Relaxed) {
            return SourceBatch {
                ledger,
                records,
                cancelled: true,
            };
        }
        if let Some(record) = gate.process(source, item, &mut ledger) {
            records.push(record);
        }
    }

    tracing::info!(
        "Extracted {} records from {}",
        records.len(),
        source
    );
    SourceBatch {
        ledger,
        records,
        cancelled: false,
    }
}

/// Pipeline over the sources enabled in a configuration.
pub struct Pipeline {
    config: Config,
    base_dir: PathBuf,
    cancel: Arc<AtomicBool>,
}

impl Pipeline {
    /// The configuration must already be validated.
    pub fn new(config: Config) -> Self {
        let base_dir = config.base_dir().unwrap_or_else(|| PathBuf::from("."));
        Self {
            config,
            base_dir,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Resolve relative raw and output directories against `base_dir`
    /// instead of the config file location.
    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Flag shared with signal handlers. Setting it stops the run before
    /// the next record is handed downstream.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Raw input location for a source.
    pub fn source_location(&self, source: Source) -> PathBuf {
        self.config.source_dir(source, &self.base_dir)
    }

    /// Directory receiving exported files.
    pub fn output_dir(&self) -> PathBuf {
        self.config
            .resolve_path(&self.config.pipeline.output_dir, &self.base_dir)
    }

    fn new_report(&self) -> RunReport {
        let id = uuid::Uuid::new_v4().simple().to_string();
        RunReport {
            run_id: format!("run_{}", &id[..8]),
            started_at: Utc::now(),
            ledger: RunLedger::new(),
            dedup: DedupStats::default(),
            cancelled: false,
        }
    }

    /// Run every enabled source in order, streaming each final record into
    /// `sink` as soon as it is deduplicated.
    pub fn run<F>(&self, mut sink: F) -> Result<RunReport, PipelineError>
    where
        F: FnMut(&SpeechRecord) -> io::Result<()>,
    {
        let mut report = self.new_report();
        let gate = Gate::new(&self.config);
        let mut dedup = Deduplicator::new(&self.config.processing);

        'sources: for source in self.config.enabled_sources() {
            let location = self.source_location(source);
            let extractor = build_extractor(source, &self.config);
            tracing::info!(
                "Processing {} from {}",
                extractor.source_name(),
                location.display()
            );

            report.ledger.touch(source);
            report.ledger.record(StageEvent::count(
                source,
                Stage::Collect,
                extractor.document_count(&location),
            ));

            for item in extractor.parse(&location) {
                if self.is_cancelled() {
                    report.cancelled = true;
                    break 'sources;
                }
                let Some(record) = gate.process(source, item, &mut report.ledger) else {
                    continue;
                };
                if let Some(record) = dedup.admit(record) {
                    report.ledger.record(StageEvent::count(source, Stage::Dedupe, 1));
                    sink(&record)?;
                }
            }
        }

        report.dedup = dedup.stats();
        log_dedup(&report.dedup);
        Ok(report)
    }

    /// Run sources concurrently (at most `max_workers` at once), then
    /// deduplicate on the calling task in configured source order.
    pub async fn run_concurrent<F>(&self, mut sink: F) -> Result<RunReport, PipelineError>
    where
        F: FnMut(&SpeechRecord) -> io::Result<()>,
    {
        let mut report = self.new_report();
        let mut dedup = Deduplicator::new(&self.config.processing);
        let max_workers = self.config.pipeline.max_workers.max(1);

        let tasks = self.config.enabled_sources().into_iter().map(|source| {
            let config = self.config.clone();
            let location = self.source_location(source);
            let cancel = Arc::clone(&self.cancel);
            tokio::task::spawn_blocking(move || extract_source(source, &config, &location, &cancel))
        });
        let mut batches = futures::stream::iter(tasks).buffered(max_workers);

        while let Some(joined) = batches.next().await {
            let batch = joined?;
            report.ledger.merge(batch.ledger);
            if batch.cancelled {
                report.cancelled = true;
            }

            for record in batch.records {
                if self.is_cancelled() {
                    report.cancelled = true;
                    break;
                }
                let source = record.source;
                if let Some(record) = dedup.admit(record) {
                    report.ledger.record(StageEvent::count(source, Stage::Dedupe, 1));
                    sink(&record)?;
                }
            }

            if report.cancelled {
                tracing::warn!("Run cancelled, stopping before remaining sources");
                break;
            }
        }

        report.dedup = dedup.stats();
        log_dedup(&report.dedup);
        Ok(report)
    }
}

fn log_dedup(stats: &DedupStats) {
    tracing::info!(
        "Deduplication: {} -> {} ({} duplicates removed)",
        stats.total_seen,
        stats.unique,
        stats.duplicates_found
    );
}
