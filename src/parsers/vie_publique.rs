//! Vie-publique discours extractor.
//!
//! Metadata comes from a JSON manifest. The manifest text is usually a
//! short summary, so when a cached HTML page exists under `pages/` the
//! full text is taken from it instead.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::NaiveDate;
use scraper::{Html, Selector};
use serde_json::Value;

use super::dates::parse_manifest_date;
use super::{Extracted, Extractor, ExtractorSettings, ParseError};
use crate::config::ViePubliqueConfig;
use crate::models::{Source, SpeechRecord, UNKNOWN_SPEAKER, UNTITLED};

/// Manifest file name when the location is a directory.
pub const MANIFEST_FILE: &str = "vp_discours.json";

/// Extracted page text must be longer than this to replace the manifest text.
const MIN_PAGE_TEXT: usize = 100;

const DATE_FIELDS: &[&str] = &[
    "prononciation",
    "date",
    "dateDiscours",
    "date_discours",
    "mise_en_ligne",
];
const ID_FIELDS: &[&str] = &["id", "identifiant", "uid", "reference"];
const URL_FIELDS: &[&str] = &["url", "lien"];
const TITLE_FIELDS: &[&str] = &["titre", "title", "intitule"];
const SPEAKER_FIELDS: &[&str] = &["auteur", "orateur", "speaker", "intervenant"];
const ROLE_FIELDS: &[&str] = &["fonction", "qualite", "role"];
const TEXT_FIELDS: &[&str] = &["texte", "contenu", "content", "resume", "abstract"];
const TYPE_FIELDS: &[&str] = &["type_document", "domaine", "type", "nature"];
const JSON_LD_TEXT_FIELDS: &[&str] = &["articleBody", "text", "description", "content"];

static JSON_LD_SELECTOR: LazyLock<Option<Selector>> =
    LazyLock::new(|| Selector::parse(r#"script[type="application/ld+json"]"#).ok());

static CONTENT_SELECTORS: LazyLock<Vec<Selector>> = LazyLock::new(|| {
    [".field--name-field-texte-integral", ".layout-content", "main"]
        .iter()
        .filter_map(|s| Selector::parse(s).ok())
        .collect()
});

pub struct ViePubliqueExtractor {
    settings: ExtractorSettings,
    base_url: String,
    crawl_full_text: bool,
}

impl ViePubliqueExtractor {
    pub fn new(settings: ExtractorSettings, config: &ViePubliqueConfig) -> Self {
        Self {
            settings,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            crawl_full_text: config.crawl_full_text,
        }
    }

    fn parse_entry(&self, entry: &Value, pages_dir: Option<&Path>) -> Option<SpeechRecord> {
        let date = first_string(entry, DATE_FIELDS).and_then(|d| parse_manifest_date(&d))?;
        if !self.settings.date_range.contains(date) {
            return None;
        }

        let record = self.record_from_entry(entry, date)?;
        if !self.crawl_full_text {
            return Some(record);
        }

        match pages_dir
            .and_then(|dir| page_path(dir, &record.source_id))
            .and_then(|path| read_page_text(&path))
        {
            Some(full_text) => Some(record.with_text(full_text)),
            None => Some(record),
        }
    }

    fn record_from_entry(&self, entry: &Value, date: NaiveDate) -> Option<SpeechRecord> {
        let url = first_string(entry, URL_FIELDS);
        let source_id = first_string(entry, ID_FIELDS)
            .or_else(|| url.as_deref().and_then(id_from_url))?;

        let title = first_string(entry, TITLE_FIELDS).unwrap_or_else(|| UNTITLED.to_string());

        let first_intervenant = entry
            .get("intervenants")
            .and_then(Value::as_array)
            .and_then(|list| list.first())
            .filter(|first| first.is_object());
        let mut speaker = first_intervenant.and_then(|i| first_string(i, &["nom"]));
        let mut role = first_intervenant.and_then(|i| first_string(i, &["qualite_long", "qualite"]));
        if speaker.is_none() {
            speaker = first_string(entry, SPEAKER_FIELDS);
        }
        if role.is_none() {
            role = first_string(entry, ROLE_FIELDS);
        }

        let text = first_string(entry, TEXT_FIELDS).unwrap_or_default();
        let url = url.map(|u| {
            if u.starts_with("http") {
                u
            } else {
                format!("{}{}", self.base_url, u)
            }
        });

        let record = SpeechRecord::new(
            Source::ViePublique,
            source_id,
            date,
            speaker.unwrap_or_else(|| UNKNOWN_SPEAKER.to_string()),
            title,
            text,
        )
        .with_source_url(url)
        .with_license("Licence Ouverte v2.0")
        .with_speaker_role(role)
        .with_speech_type(first_string(entry, TYPE_FIELDS));
        Some(record)
    }
}

impl Extractor for ViePubliqueExtractor {
    fn source(&self) -> Source {
        Source::ViePublique
    }

    fn document_count(&self, location: &Path) -> u64 {
        let (manifest, _) = manifest_paths(location);
        load_manifest(&manifest)
            .map(|entries| entries.len() as u64)
            .unwrap_or(0)
    }

    fn parse<'a>(&'a self, location: &'a Path) -> Box<dyn Iterator<Item = Extracted> + 'a> {
        let (manifest, pages_dir) = manifest_paths(location);
        if !manifest.exists() {
            tracing::warn!("Manifest not found: {}", manifest.display());
            return Box::new(std::iter::empty());
        }

        let entries = match load_manifest(&manifest) {
            Ok(entries) => entries,
            Err(e) => return Box::new(std::iter::once(Extracted::failed(&manifest, e))),
        };
        tracing::info!("Parsing {} speeches from manifest", entries.len());

        let pages_dir = Some(pages_dir).filter(|dir| dir.is_dir());
        Box::new(entries.into_iter().filter_map(move |entry| {
            self.parse_entry(&entry, pages_dir.as_deref())
                .map(Extracted::Record)
        }))
    }
}

/// Cached page for a record id. Ids that could leave the pages
/// directory get no page.
fn page_path(pages_dir: &Path, source_id: &str) -> Option<PathBuf> {
    if source_id.contains(['/', '\\']) || source_id.contains("..") {
        tracing::debug!("Skipping page lookup for unsafe id {:?}", source_id);
        return None;
    }
    Some(pages_dir.join(format!("{}.html", source_id)))
}

/// Manifest path and pages directory for a location.
fn manifest_paths(location: &Path) -> (PathBuf, PathBuf) {
    if location.is_file() && crate::utils::has_extension(location, "json") {
        let parent = location.parent().unwrap_or_else(|| Path::new("."));
        (location.to_path_buf(), parent.join("pages"))
    } else {
        (location.join(MANIFEST_FILE), location.join("pages"))
    }
}

/// Load manifest entries: a bare array, or an object holding `discours`
/// or `data`.
fn load_manifest(path: &Path) -> Result<Vec<Value>, ParseError> {
    let contents = std::fs::read_to_string(path)?;
    let data: Value = serde_json::from_str(&contents)?;

    match data {
        Value::Array(entries) => Ok(entries),
        Value::Object(mut map) => {
            let list = map.remove("discours").or_else(|| map.remove("data"));
            match list {
                Some(Value::Array(entries)) => Ok(entries),
                Some(_) => Err(ParseError::Malformed(
                    "manifest entry list is not an array".to_string(),
                )),
                None => Ok(Vec::new()),
            }
        }
        _ => Err(ParseError::Malformed(
            "manifest must be an array or an object".to_string(),
        )),
    }
}

/// Non-empty string form of a JSON value. Numbers are accepted for ids.
fn value_as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn first_string(entry: &Value, fields: &[&str]) -> Option<String> {
    fields
        .iter()
        .find_map(|field| entry.get(field).and_then(value_as_string))
}

/// `/discours/272345-declaration-de-m-...` gives `272345`.
fn id_from_url(url: &str) -> Option<String> {
    let last = url.trim_end_matches('/').rsplit('/').next()?;
    let id = last.split('-').next().unwrap_or(last);
    Some(id.to_string()).filter(|id| !id.is_empty())
}

fn read_page_text(path: &Path) -> Option<String> {
    if !path.exists() {
        return None;
    }
    match std::fs::read_to_string(path) {
        Ok(html) => extract_page_text(&html),
        Err(e) => {
            tracing::warn!("Failed to read {}: {}", path.display(), e);
            None
        }
    }
}

/// Full speech text from a cached page, or `None` when nothing long enough
/// is found. Structured JSON-LD metadata is preferred over page layout.
pub fn extract_page_text(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    text_from_json_ld(&document).or_else(|| text_from_selectors(&document))
}

fn text_from_json_ld(document: &Html) -> Option<String> {
    let selector = JSON_LD_SELECTOR.as_ref()?;
    document.select(selector).find_map(|script| {
        let raw: String = script.text().collect();
        let data: Value = serde_json::from_str(raw.trim()).ok()?;
        text_from_schema_value(&data)
    })
}

fn text_from_schema_value(data: &Value) -> Option<String> {
    match data {
        Value::Array(items) => items.iter().find_map(text_from_schema_value),
        Value::Object(map) => JSON_LD_TEXT_FIELDS
            .iter()
            .find_map(|field| {
                map.get(*field)
                    .and_then(Value::as_str)
                    .filter(|text| text.chars().count() > MIN_PAGE_TEXT)
                    .map(str::to_string)
            })
            .or_else(|| map.get("@graph").and_then(text_from_schema_value)),
        _ => None,
    }
}

fn text_from_selectors(document: &Html) -> Option<String> {
    CONTENT_SELECTORS.iter().find_map(|selector| {
        let element = document.select(selector).next()?;
        let text = element
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");
        Some(text).filter(|t| t.chars().count() > MIN_PAGE_TEXT)
    })
}
