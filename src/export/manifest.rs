//! Run manifest: what ran, with which configuration, and what came out.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;

use super::jsonl::JSONL_FILE;
use crate::config::Config;
use crate::models::RunManifest;
use crate::pipeline::RunReport;
use crate::utils::sha256_file;

/// File name of the manifest inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// Build the manifest for a finished run, checksumming the exported
/// corpus when it exists.
pub fn build_manifest(config: &Config, report: &RunReport, output_dir: &Path) -> RunManifest {
    let mut output_files = BTreeMap::new();
    let jsonl = output_dir.join(JSONL_FILE);
    if jsonl.is_file() {
        match sha256_file(&jsonl) {
            Ok(checksum) => {
                output_files.insert(JSONL_FILE.to_string(), checksum);
            }
            Err(e) => tracing::warn!("Could not checksum {}: {}", jsonl.display(), e),
        }
    }

    RunManifest {
        run_id: report.run_id.clone(),
        run_timestamp: report.started_at,
        config_hash: config.short_hash(),
        date_range_start: config.pipeline.date_range.start,
        date_range_end: config.pipeline.date_range.end,
        sources_processed: report.ledger.snapshot(),
        total_records: report.ledger.total_records(),
        deduplicated_records: report.ledger.deduplicated_records(),
        output_files,
        errors: report.ledger.errors().to_vec(),
        pipeline_version: env!("CARGO_PKG_VERSION").to_string(),
    }
}

/// Write the manifest as pretty-printed JSON.
pub fn write_manifest(manifest: &RunManifest, output_dir: &Path) -> anyhow::Result<PathBuf> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;
    let path = output_dir.join(MANIFEST_FILE);
    let json = serde_json::to_string_pretty(manifest)?;
    fs::write(&path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Wrote manifest to {}", path.display());
    Ok(path)
}
