//! Assemblée nationale debate XML extractor.
//!
//! Structured debate archives only exist from 2011 onwards. For earlier
//! periods the raw directory carries a data-gap notice and the source
//! behaves as an empty stub.

use std::path::Path;

use chrono::NaiveDate;

use super::xml::Element;
use super::{file_stem, read_xml, xml_files, Extracted, Extractor, ExtractorSettings};
use crate::models::{Source, SpeechRecord};

/// Marker file announcing that no structured data exists for the period.
pub const DATA_GAP_NOTICE: &str = "DATA_GAP_NOTICE.md";

const DATE_ELEMENTS: &[&str] = &["dateSeance", "date", "jour"];

pub struct AssembleeExtractor {
    settings: ExtractorSettings,
    honour_gap_notice: bool,
}

impl AssembleeExtractor {
    pub fn new(settings: ExtractorSettings, honour_gap_notice: bool) -> Self {
        Self {
            settings,
            honour_gap_notice,
        }
    }

    fn is_stub(&self, location: &Path) -> bool {
        self.honour_gap_notice && location.join(DATA_GAP_NOTICE).exists()
    }

    fn parse_file(&self, path: &Path) -> Vec<Extracted> {
        let root = match read_xml(path) {
            Ok(root) => root,
            Err(e) => return vec![Extracted::failed(path, e)],
        };

        let Some(date) = session_date(&root) else {
            tracing::debug!("Could not determine date for {}", path.display());
            return Vec::new();
        };
        if !self.settings.date_range.contains(date) {
            return Vec::new();
        }

        let stem = file_stem(path);
        root.descendants()
            .filter(|e| e.name == "paragraphe")
            .filter_map(|e| self.from_paragraphe(e, date, &stem))
            .map(Extracted::Record)
            .collect()
    }

    fn from_paragraphe(&self, elem: &Element, date: NaiveDate, stem: &str) -> Option<SpeechRecord> {
        let orateur = elem.find("orateur")?;
        let speaker = orateur
            .find("nom")
            .map(|n| n.text.trim())
            .filter(|n| !n.is_empty())?;

        let text = elem.find("texte").map(Element::joined_text).unwrap_or_default();
        if !self.settings.long_enough(&text) {
            return None;
        }

        let role = orateur
            .find("qualite")
            .map(|q| q.text.trim().to_string())
            .filter(|q| !q.is_empty());

        let record = SpeechRecord::new(
            Source::Assemblee,
            format!("an_{}_{}_L{}", date, stem, elem.line),
            date,
            speaker,
            format!("Intervention - Assemblée nationale - {}", date),
            text,
        )
        .with_source_url(Some(format!(
            "https://www.assemblee-nationale.fr/dyn/debats/{}",
            stem
        )))
        .with_license("Licence Ouverte")
        .with_speaker_role(role)
        .with_speech_type(Some("intervention".to_string()))
        .with_session_id(Some(stem.to_string()));
        Some(record)
    }
}

impl Extractor for AssembleeExtractor {
    fn source(&self) -> Source {
        Source::Assemblee
    }

    fn document_count(&self, location: &Path) -> u64 {
        if self.is_stub(location) {
            return 0;
        }
        xml_files(location).len() as u64
    }

    fn parse<'a>(&'a self, location: &'a Path) -> Box<dyn Iterator<Item = Extracted> + 'a> {
        if !location.exists() {
            tracing::warn!("Source path does not exist: {}", location.display());
            return Box::new(std::iter::empty());
        }
        if self.is_stub(location) {
            tracing::info!("Assemblee data gap notice found, no structured data for this period");
            return Box::new(std::iter::empty());
        }

        let files = xml_files(location);
        if files.is_empty() {
            tracing::info!("No Assemblee XML files found");
        } else {
            tracing::info!("Parsing {} Assemblee XML files", files.len());
        }
        Box::new(files.into_iter().flat_map(move |path| self.parse_file(&path)))
    }
}

fn session_date(root: &Element) -> Option<NaiveDate> {
    DATE_ELEMENTS.iter().find_map(|tag| {
        let text = root.find(tag)?.joined_text();
        let head: String = text.chars().take(10).collect();
        NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
    })
}
