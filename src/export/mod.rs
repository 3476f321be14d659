//! Exporters for the curated corpus and its run manifest.

mod jsonl;
mod manifest;

pub use jsonl::{read_jsonl, JsonlWriter, JSONL_FILE};
pub use manifest::{build_manifest, write_manifest, MANIFEST_FILE};

use anyhow::Context;

use crate::models::RunManifest;
use crate::pipeline::{Pipeline, RunReport};

/// Run the pipeline and write whatever the `export` section enables.
///
/// With JSONL export disabled the records are still processed and counted.
pub async fn run_and_export(
    pipeline: &Pipeline,
    concurrent: bool,
) -> anyhow::Result<(RunReport, RunManifest)> {
    let config = pipeline.config();
    let output_dir = pipeline.output_dir();

    let mut writer = if config.export.jsonl {
        Some(
            JsonlWriter::create(&output_dir)
                .with_context(|| format!("Failed to create {}", output_dir.display()))?,
        )
    } else {
        None
    };

    let sink = |record: &crate::models::SpeechRecord| match writer.as_mut() {
        Some(w) => w.write(record),
        None => Ok(()),
    };
    let report = if concurrent {
        pipeline.run_concurrent(sink).await?
    } else {
        pipeline.run(sink)?
    };

    if let Some(writer) = writer {
        writer.finish()?;
    }

    tracing::debug!("Run summary:\n{}", report.ledger.summary());
    let manifest = build_manifest(config, &report, &output_dir);
    if config.export.manifest {
        write_manifest(&manifest, &output_dir)?;
    }
    Ok((report, manifest))
}
