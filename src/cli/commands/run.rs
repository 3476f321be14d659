//! The `run` command: process raw sources and export the corpus.

use std::path::{Path, PathBuf};
use std::sync::atomic::Ordering;

use chrono::NaiveDate;
use console::style;

use speechcorpus::config::DateRange;
use speechcorpus::export::run_and_export;
use speechcorpus::models::{RunManifest, Source};
use speechcorpus::{Config, Pipeline, RunReport};

use crate::cli::icons::{dim_arrow, error, success, warn};

/// Command-line values that take precedence over the config file.
pub struct RunOverrides {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub raw_dir: Option<PathBuf>,
    pub output: Option<PathBuf>,
    pub sources: Vec<Source>,
    pub jobs: Option<usize>,
    pub sequential: bool,
}

impl RunOverrides {
    fn apply(&self, config: &mut Config) -> anyhow::Result<()> {
        let range = config.pipeline.date_range;
        config.pipeline.date_range = DateRange::new(
            self.start_date.unwrap_or(range.start),
            self.end_date.unwrap_or(range.end),
        );
        if let Some(raw_dir) = &self.raw_dir {
            config.pipeline.raw_dir = absolute(raw_dir)?;
        }
        if let Some(output) = &self.output {
            config.pipeline.output_dir = absolute(output)?;
        }
        if !self.sources.is_empty() {
            config.restrict_sources(&self.sources);
        }
        if let Some(jobs) = self.jobs {
            config.pipeline.max_workers = jobs;
        }
        Ok(())
    }
}

/// Command-line paths are relative to the working directory, not to the
/// config file.
fn absolute(path: &Path) -> anyhow::Result<String> {
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };
    Ok(path.to_string_lossy().into_owned())
}

pub async fn cmd_run(mut config: Config, overrides: RunOverrides) -> anyhow::Result<()> {
    overrides.apply(&mut config)?;
    if let Err(e) = config.validate() {
        eprintln!("{} {}", error(), e);
        std::process::exit(1);
    }

    let sources = config.enabled_sources();
    if sources.is_empty() {
        eprintln!("{} No sources enabled", warn());
        return Ok(());
    }

    let range = config.pipeline.date_range;
    eprintln!(
        "{} Processing {} from {} to {}",
        dim_arrow(),
        sources
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", "),
        range.start,
        range.end
    );

    let pipeline = Pipeline::new(config);
    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current record");
            cancel.store(true, Ordering::Relaxed);
        }
    });

    let (report, manifest) = run_and_export(&pipeline, !overrides.sequential).await?;
    print_summary(&report, &manifest, &pipeline.output_dir());
    Ok(())
}

fn print_summary(report: &RunReport, manifest: &RunManifest, output_dir: &Path) {
    if report.cancelled {
        eprintln!("{} Run {} cancelled", warn(), style(&report.run_id).yellow());
    } else {
        eprintln!("{} Run {} complete", success(), style(&report.run_id).green());
    }

    for (source, stats) in report.ledger.sources() {
        eprintln!(
            "  {} {:<13} {} collected, {} parsed, {} cleaned, {} kept, {} errors",
            dim_arrow(),
            source.as_str(),
            stats.collected,
            stats.parsed,
            stats.cleaned,
            style(stats.deduplicated).bold(),
            if stats.errors > 0 {
                style(stats.errors).red()
            } else {
                style(stats.errors).dim()
            }
        );
    }

    eprintln!(
        "  Total: {} records, {} after deduplication ({} duplicates, {:.1}%)",
        manifest.total_records,
        style(manifest.deduplicated_records).bold(),
        report.dedup.duplicates_found,
        report.dedup.duplicate_rate * 100.0
    );

    if !manifest.errors.is_empty() {
        eprintln!("  {} {} errors:", warn(), manifest.errors.len());
        for message in manifest.errors.iter().take(10) {
            eprintln!("    {}", style(message).dim());
        }
        if manifest.errors.len() > 10 {
            eprintln!("    ... and {} more", manifest.errors.len() - 10);
        }
    }

    eprintln!("  Output: {}", output_dir.display());
}
