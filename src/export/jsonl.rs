//! JSON-lines record writer.

use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::models::SpeechRecord;

/// File name of the curated corpus inside the output directory.
pub const JSONL_FILE: &str = "curated.jsonl";

/// Streams records to `curated.jsonl`, one JSON object per line.
pub struct JsonlWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    count: u64,
}

impl JsonlWriter {
    /// Create (or truncate) the JSONL file inside `output_dir`.
    pub fn create(output_dir: &Path) -> io::Result<Self> {
        fs::create_dir_all(output_dir)?;
        let path = output_dir.join(JSONL_FILE);
        let file = File::create(&path)?;
        Ok(Self {
            path,
            writer: BufWriter::new(file),
            count: 0,
        })
    }

    pub fn write(&mut self, record: &SpeechRecord) -> io::Result<()> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        self.count += 1;
        Ok(())
    }

    /// Records written so far.
    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flush buffered lines and return the file path.
    pub fn finish(mut self) -> io::Result<PathBuf> {
        self.writer.flush()?;
        tracing::info!("Wrote {} records to {}", self.count, self.path.display());
        Ok(self.path)
    }
}

/// Read records back from a JSONL file. Blank lines are skipped.
pub fn read_jsonl(path: &Path) -> anyhow::Result<Vec<SpeechRecord>> {
    let contents = fs::read_to_string(path)?;
    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| serde_json::from_str(line).map_err(anyhow::Error::from))
        .collect()
}
