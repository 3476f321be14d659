//! European Parliament placeholder extractor.
//!
//! No structured verbatim feed exists for the covered period, so this
//! source never yields records. It reports what it found so operators can
//! tell an empty directory from unparsed data.

use std::path::Path;

use super::{Extracted, Extractor};
use crate::models::Source;
use crate::utils::{collect_files, has_extension};

/// Marker file left by the collector when Europarl is not collected.
pub const STUB_NOTICE: &str = "EUROPARL_STUB.md";

const DATA_EXTENSIONS: &[&str] = &["ttl", "rdf", "json", "jsonld", "xml"];

pub struct EuroparlExtractor {
    filter_country: String,
}

impl EuroparlExtractor {
    pub fn new(filter_country: String) -> Self {
        Self { filter_country }
    }

    fn data_files(location: &Path) -> Vec<std::path::PathBuf> {
        collect_files(location, |p| {
            DATA_EXTENSIONS.iter().any(|ext| has_extension(p, ext))
        })
    }
}

impl Extractor for EuroparlExtractor {
    fn source(&self) -> Source {
        Source::Europarl
    }

    fn document_count(&self, location: &Path) -> u64 {
        Self::data_files(location).len() as u64
    }

    fn parse<'a>(&'a self, location: &'a Path) -> Box<dyn Iterator<Item = Extracted> + 'a> {
        if !location.exists() {
            tracing::info!("Europarl source path does not exist: {}", location.display());
        } else if location.join(STUB_NOTICE).exists() {
            tracing::info!("Europarl stub notice found, data collection not implemented");
        } else {
            let files = Self::data_files(location);
            if files.is_empty() {
                tracing::info!("No Europarl data files found");
            } else {
                tracing::info!(
                    "Found {} Europarl data files (country filter {}), not parsed",
                    files.len(),
                    self.filter_country
                );
                for file in &files {
                    tracing::debug!("Europarl parsing not implemented: {}", file.display());
                }
            }
        }
        Box::new(std::iter::empty())
    }
}
