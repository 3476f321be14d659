//! Structural extractors, one per source family.
//!
//! Every extractor turns a raw source location into a lazy, restartable
//! sequence of [`Extracted`] items. A bad document never aborts the
//! sequence: it comes out as [`Extracted::Failed`] and the caller decides
//! how to count it.

pub mod assemblee;
pub mod dates;
pub mod europarl;
pub mod senat;
pub mod vie_publique;
pub mod xml;

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::config::{Config, DateRange};
use crate::models::{Source, SpeechRecord};

pub use assemblee::AssembleeExtractor;
pub use europarl::EuroparlExtractor;
pub use senat::SenatExtractor;
pub use vie_publique::ViePubliqueExtractor;

/// Errors that make a whole document unusable.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML error near line {line}: {message}")]
    Xml { line: usize, message: String },

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// A document that could not be parsed.
#[derive(Debug)]
pub struct DocumentFailure {
    pub document: PathBuf,
    pub error: ParseError,
}

/// One item of an extractor's output.
#[derive(Debug)]
pub enum Extracted {
    Record(SpeechRecord),
    Failed(DocumentFailure),
}

impl Extracted {
    pub(crate) fn failed(document: &Path, error: ParseError) -> Self {
        tracing::warn!("Failed to parse {}: {}", document.display(), error);
        Self::Failed(DocumentFailure {
            document: document.to_path_buf(),
            error,
        })
    }
}

/// Settings every extractor shares.
#[derive(Debug, Clone, Copy)]
pub struct ExtractorSettings {
    /// Only records dated inside this range are emitted.
    pub date_range: DateRange,
    /// Records with shorter text are discarded at the source.
    pub min_text_length: usize,
}

impl ExtractorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            date_range: config.pipeline.date_range,
            min_text_length: config.processing.min_text_length,
        }
    }

    /// Whether a raw text is long enough to keep, counted in characters.
    pub fn long_enough(&self, text: &str) -> bool {
        text.chars().count() >= self.min_text_length
    }
}

/// A source-specific extraction strategy.
///
/// Implementations own no mutable state, so calling [`Extractor::parse`]
/// twice on an unchanged location yields the same items.
pub trait Extractor: Send + Sync {
    /// Which source this extractor produces records for.
    fn source(&self) -> Source;

    /// Name used for raw directories and in reports.
    fn source_name(&self) -> &'static str {
        self.source().as_str()
    }

    /// Raw documents found at `location`, independent of parse outcome.
    fn document_count(&self, location: &Path) -> u64;

    /// Lazily parse everything under `location`.
    ///
    /// A missing location yields nothing and is not an error.
    fn parse<'a>(&'a self, location: &'a Path) -> Box<dyn Iterator<Item = Extracted> + 'a>;
}

/// Build the extractor for `source`.
pub fn build_extractor(source: Source, config: &Config) -> Box<dyn Extractor> {
    let settings = ExtractorSettings::from_config(config);
    match source {
        Source::ViePublique => Box::new(ViePubliqueExtractor::new(
            settings,
            &config.sources.vie_publique,
        )),
        Source::Senat => Box::new(SenatExtractor::new(settings)),
        Source::Assemblee => Box::new(AssembleeExtractor::new(
            settings,
            config.sources.assemblee.fallback_stub,
        )),
        Source::Europarl => Box::new(EuroparlExtractor::new(
            config.sources.europarl.filter_country.clone(),
        )),
    }
}

/// XML files at `location`: the file itself, or every `*.xml` below it in
/// sorted path order.
pub(crate) fn xml_files(location: &Path) -> Vec<PathBuf> {
    if location.is_file() {
        return vec![location.to_path_buf()];
    }
    crate::utils::collect_files(location, |p| crate::utils::has_extension(p, "xml"))
}

/// File stem as an owned string, empty when the path has none.
pub(crate) fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Read and parse one XML document.
pub(crate) fn read_xml(path: &Path) -> Result<xml::Element, ParseError> {
    let contents = std::fs::read_to_string(path)?;
    xml::parse_document(&contents)
}
