//! Sénat comptes rendus (CRI) XML extractor.
//!
//! Current files use namespaced `<cri:intervenant nom=".." qua="..">`
//! blocks holding `<p>` paragraphs. Older archives wrap each speech in an
//! un-namespaced `<intervention>` with the speaker in a child element.
//! Both layouts are accepted; the namespaced one wins when present.

use std::path::Path;

use chrono::NaiveDate;

use super::dates::{date_from_filename, date_from_session_stem, parse_date_string};
use super::xml::Element;
use super::{file_stem, read_xml, xml_files, Extracted, Extractor, ExtractorSettings};
use crate::models::{Source, SpeechRecord};

/// Namespace of Sénat CRI documents.
pub const CRI_NAMESPACE: &str = "http://senat.fr/schemas/thb/cri";

const DATE_ELEMENTS: &[&str] = &["date", "dateSeance", "date_seance", "jour"];
const DATE_ATTRIBUTES: &[&str] = &["date", "dateSeance"];
const ID_ATTRIBUTES: &[&str] = &["id", "identifiant", "uid"];
const SPEAKER_ELEMENTS: &[&str] = &["orateur", "intervenant", "auteur", "nom"];
const ROLE_ELEMENTS: &[&str] = &["qualite", "fonction", "titre"];

pub struct SenatExtractor {
    settings: ExtractorSettings,
}

impl SenatExtractor {
    pub fn new(settings: ExtractorSettings) -> Self {
        Self { settings }
    }

    fn parse_file(&self, path: &Path) -> Vec<Extracted> {
        let root = match read_xml(path) {
            Ok(root) => root,
            Err(e) => return vec![Extracted::failed(path, e)],
        };

        let stem = file_stem(path);
        let Some(date) = session_date(&stem, &root) else {
            tracing::debug!("Could not determine date for {}", path.display());
            return Vec::new();
        };
        if !self.settings.date_range.contains(date) {
            tracing::debug!("Skipping {} dated {}", path.display(), date);
            return Vec::new();
        }

        self.records_from_tree(&root, date, &stem)
            .into_iter()
            .map(Extracted::Record)
            .collect()
    }

    fn records_from_tree(&self, root: &Element, date: NaiveDate, stem: &str) -> Vec<SpeechRecord> {
        let namespaced: Vec<&Element> = root
            .descendants()
            .filter(|e| e.is(Some(CRI_NAMESPACE), "intervenant"))
            .collect();

        let intervenants = if namespaced.is_empty() {
            root.descendants()
                .filter(|e| e.name == "intervenant")
                .collect()
        } else {
            namespaced
        };

        if !intervenants.is_empty() {
            return intervenants
                .into_iter()
                .filter_map(|e| self.from_intervenant(e, date, stem))
                .collect();
        }

        root.descendants()
            .filter(|e| e.is(None, "intervention"))
            .filter_map(|e| self.from_intervention(e, date, stem))
            .collect()
    }

    fn from_intervenant(&self, elem: &Element, date: NaiveDate, stem: &str) -> Option<SpeechRecord> {
        let speaker = elem.attr("nom").map(normalize_speaker_name)?;
        if speaker.is_empty() {
            return None;
        }
        let role = elem.first_attr(&["qua"]).map(str::to_string);

        let paragraphs: Vec<String> = elem
            .descendants()
            .filter(|e| e.name == "p")
            .map(Element::joined_text)
            .filter(|t| !t.is_empty())
            .collect();
        let text = paragraphs.join(" ");
        if !self.settings.long_enough(&text) {
            return None;
        }

        Some(build_record(
            source_id(elem, stem),
            date,
            speaker,
            role,
            text,
            stem,
        ))
    }

    fn from_intervention(&self, elem: &Element, date: NaiveDate, stem: &str) -> Option<SpeechRecord> {
        let speaker = legacy_speaker(elem)?;
        let speaker = normalize_speaker_name(&speaker);
        if speaker.is_empty() {
            return None;
        }

        let text = elem.joined_text();
        if !self.settings.long_enough(&text) {
            return None;
        }

        let date = elem
            .find_unqualified("date")
            .and_then(|d| parse_date_string(&d.joined_text()))
            .unwrap_or(date);
        if !self.settings.date_range.contains(date) {
            return None;
        }

        let role = ROLE_ELEMENTS.iter().find_map(|tag| {
            elem.find_unqualified(tag)
                .map(|r| r.joined_text())
                .filter(|r| !r.is_empty())
        });

        Some(build_record(source_id(elem, stem), date, speaker, role, text, stem))
    }
}

impl Extractor for SenatExtractor {
    fn source(&self) -> Source {
        Source::Senat
    }

    fn document_count(&self, location: &Path) -> u64 {
        xml_files(location).len() as u64
    }

    fn parse<'a>(&'a self, location: &'a Path) -> Box<dyn Iterator<Item = Extracted> + 'a> {
        if !location.exists() {
            tracing::warn!("Source path does not exist: {}", location.display());
            return Box::new(std::iter::empty());
        }

        let files = xml_files(location);
        tracing::info!("Parsing {} Senat XML files", files.len());
        Box::new(files.into_iter().flat_map(move |path| self.parse_file(&path)))
    }
}

/// Session date: compact filename first, then the document, then any date
/// embedded in the filename.
fn session_date(stem: &str, root: &Element) -> Option<NaiveDate> {
    if let Some(date) = date_from_session_stem(stem) {
        return Some(date);
    }

    let from_elements = DATE_ELEMENTS.iter().find_map(|tag| {
        root.find(tag)
            .and_then(|elem| parse_date_string(&elem.joined_text()))
    });
    if from_elements.is_some() {
        return from_elements;
    }

    let from_attributes = DATE_ATTRIBUTES
        .iter()
        .find_map(|attr| root.attr(attr).and_then(parse_date_string));
    if from_attributes.is_some() {
        return from_attributes;
    }

    date_from_filename(stem)
}

fn legacy_speaker(elem: &Element) -> Option<String> {
    for tag in SPEAKER_ELEMENTS {
        let Some(found) = elem.find_unqualified(tag) else {
            continue;
        };
        if let Some(nom) = found.find_unqualified("nom") {
            let name = nom.text.trim();
            if !name.is_empty() {
                return Some(name.to_string());
            }
        }
        let name = found.text.trim();
        if !name.is_empty() {
            return Some(name.to_string());
        }
    }

    elem.attr("orateur").map(|s| s.trim().to_string())
}

/// Existing identifier attribute, else `{stem}_L{line}`.
fn source_id(elem: &Element, stem: &str) -> String {
    ID_ATTRIBUTES
        .iter()
        .find_map(|attr| elem.attr(attr).filter(|v| !v.is_empty()))
        .map(str::to_string)
        .unwrap_or_else(|| format!("{}_L{}", stem, elem.line))
}

fn build_record(
    source_id: String,
    date: NaiveDate,
    speaker: String,
    role: Option<String>,
    text: String,
    stem: &str,
) -> SpeechRecord {
    SpeechRecord::new(
        Source::Senat,
        source_id,
        date,
        speaker,
        format!("Intervention - Sénat - {}", date),
        text,
    )
    .with_source_url(Some(format!("https://www.senat.fr/seances/{}", stem)))
    .with_license("Licence Ouverte")
    .with_speaker_role(role)
    .with_speech_type(Some("intervention".to_string()))
    .with_session_id(Some(stem.to_string()))
}

/// Strip trailing dots and re-case names written in capitals.
///
/// `"JEAN-PAUL EMORINE."` becomes `"Jean-Paul Emorine"`; mixed-case names
/// pass through unchanged.
pub fn normalize_speaker_name(name: &str) -> String {
    let name = name.trim_end_matches(['.', ' ']).trim();
    let has_upper = name.chars().any(char::is_uppercase);
    let has_lower = name.chars().any(char::is_lowercase);
    if !has_upper || has_lower {
        return name.to_string();
    }

    name.split_whitespace()
        .map(title_case)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Capitalize the first letter of every alphabetic run.
fn title_case(word: &str) -> String {
    let mut out = String::with_capacity(word.len());
    let mut in_word = false;
    for c in word.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
