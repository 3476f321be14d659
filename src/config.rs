//! Configuration management for speechcorpus.
//!
//! The configuration is owned by the binary: it is loaded once, validated,
//! and then handed to the core by reference. Invalid enum values fail at
//! deserialization time; cross-field checks live in [`Config::validate`].

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::{RecordField, Source};
use crate::utils::sha256_hex;

/// Default minimum text length (in characters) for a record to be kept.
pub const DEFAULT_MIN_TEXT_LENGTH: usize = 100;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize {format} config: {message}")]
    Serialize {
        format: &'static str,
        message: String,
    },

    #[error("Failed to parse {format} config: {message}")]
    Parse {
        format: &'static str,
        message: String,
    },

    #[error("Invalid date range: start {start} is after end {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },

    #[error("dedupe_fields must name at least one field")]
    EmptyDedupeFields,

    #[error("max_workers must be at least 1")]
    InvalidWorkerCount,
}

/// Unicode normalization form applied to text before cleaning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnicodeForm {
    #[default]
    #[serde(rename = "NFC", alias = "canonical-composed")]
    Nfc,
    #[serde(rename = "NFD", alias = "canonical-decomposed")]
    Nfd,
    #[serde(rename = "NFKC", alias = "compatibility-composed")]
    Nfkc,
    #[serde(rename = "NFKD", alias = "compatibility-decomposed")]
    Nfkd,
}

/// Hash algorithm used for content fingerprints.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    /// xxHash64, fast and non-cryptographic.
    #[default]
    #[serde(rename = "xxhash64", alias = "fast-noncrypto")]
    Xxhash64,
    /// SHA-256, for when collision resistance matters more than speed.
    #[serde(rename = "sha256", alias = "cryptographic")]
    Sha256,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xxhash64 => "xxhash64",
            Self::Sha256 => "sha256",
        }
    }
}

/// Inclusive date range for filtering speeches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    /// Whether `date` falls inside the range, bounds included.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

impl Default for DateRange {
    fn default() -> Self {
        Self {
            start: NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or_default(),
            end: NaiveDate::from_ymd_opt(2010, 12, 31).unwrap_or_default(),
        }
    }
}

/// Run-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub date_range: DateRange,
    /// Directory holding one raw subdirectory per source.
    pub raw_dir: String,
    /// Directory receiving curated output and the manifest.
    pub output_dir: String,
    /// Maximum number of sources extracted concurrently.
    pub max_workers: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            date_range: DateRange::default(),
            raw_dir: "data/raw".to_string(),
            output_dir: "data".to_string(),
            max_workers: 4,
        }
    }
}

/// Vie-publique source settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ViePubliqueConfig {
    pub enabled: bool,
    /// Prefix for relative URLs found in the manifest.
    pub base_url: String,
    /// Look up cached HTML pages for full text.
    pub crawl_full_text: bool,
}

impl Default for ViePubliqueConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://www.vie-publique.fr".to_string(),
            crawl_full_text: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SenatConfig {
    pub enabled: bool,
}

impl Default for SenatConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AssembleeConfig {
    pub enabled: bool,
    /// Honour a data-gap notice in the raw directory.
    pub fallback_stub: bool,
}

impl Default for AssembleeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            fallback_stub: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EuroparlConfig {
    /// Off by default: no structured feed exists for the period.
    pub enabled: bool,
    pub filter_country: String,
}

impl Default for EuroparlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            filter_country: "FR".to_string(),
        }
    }
}

/// All data sources.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SourcesConfig {
    pub vie_publique: ViePubliqueConfig,
    pub senat: SenatConfig,
    pub assemblee: AssembleeConfig,
    pub europarl: EuroparlConfig,
}

/// Text processing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    pub unicode_normalize: UnicodeForm,
    pub strip_html: bool,
    pub remove_boilerplate: bool,
    /// Minimum text length, in characters, to keep a record.
    pub min_text_length: usize,
    pub dedupe_hash_algorithm: HashAlgorithm,
    /// Fields concatenated into the fingerprint, in order.
    pub dedupe_fields: Vec<RecordField>,
    /// Speaker roles dropped after cleaning.
    pub exclude_speaker_roles: Vec<String>,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            unicode_normalize: UnicodeForm::Nfc,
            strip_html: true,
            remove_boilerplate: true,
            min_text_length: DEFAULT_MIN_TEXT_LENGTH,
            dedupe_hash_algorithm: HashAlgorithm::Xxhash64,
            dedupe_fields: vec![RecordField::Text],
            exclude_speaker_roles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Write `curated.jsonl`.
    pub jsonl: bool,
    /// Write `manifest.json`.
    pub manifest: bool,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            jsonl: true,
            manifest: true,
        }
    }
}

/// Configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub pipeline: PipelineConfig,
    pub sources: SourcesConfig,
    pub processing: ProcessingConfig,
    pub export: ExportConfig,
    /// Path to the config file this was loaded from (not serialized).
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration using prefer for discovery.
    /// Falls back to defaults when no config file is found.
    pub async fn load() -> Result<Self, ConfigError> {
        match prefer::load("speechcorpus").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => Self::load_from_path(path).await,
                None => Ok(Self::default()),
            },
            Err(_) => Ok(Self::default()),
        }
    }

    /// Load configuration from a specific file path.
    /// The format is picked from the extension: TOML, YAML, else JSON.
    pub async fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents =
            tokio::fs::read_to_string(path)
                .await
                .map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let mut config = Self::parse(&contents, ext)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    /// Parse configuration text in the format named by `ext`.
    pub fn parse(contents: &str, ext: &str) -> Result<Self, ConfigError> {
        match ext {
            "toml" => toml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "TOML",
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "YAML",
                message: e.to_string(),
            }),
            _ => serde_json::from_str(contents).map_err(|e| ConfigError::Parse {
                format: "JSON",
                message: e.to_string(),
            }),
        }
    }

    /// Check cross-field constraints. Called once at startup.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let range = self.pipeline.date_range;
        if range.start > range.end {
            return Err(ConfigError::InvalidDateRange {
                start: range.start,
                end: range.end,
            });
        }
        if self.processing.dedupe_fields.is_empty() {
            return Err(ConfigError::EmptyDedupeFields);
        }
        if self.pipeline.max_workers == 0 {
            return Err(ConfigError::InvalidWorkerCount);
        }
        Ok(())
    }

    /// Enabled sources in canonical processing order.
    pub fn enabled_sources(&self) -> Vec<Source> {
        Source::ALL
            .into_iter()
            .filter(|source| match source {
                Source::ViePublique => self.sources.vie_publique.enabled,
                Source::Senat => self.sources.senat.enabled,
                Source::Assemblee => self.sources.assemblee.enabled,
                Source::Europarl => self.sources.europarl.enabled,
            })
            .collect()
    }

    /// Enable exactly the given sources.
    pub fn restrict_sources(&mut self, sources: &[Source]) {
        self.sources.vie_publique.enabled = sources.contains(&Source::ViePublique);
        self.sources.senat.enabled = sources.contains(&Source::Senat);
        self.sources.assemblee.enabled = sources.contains(&Source::Assemblee);
        self.sources.europarl.enabled = sources.contains(&Source::Europarl);
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to the config file.
    /// Paths starting with ~ are expanded.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Raw input directory for one source.
    pub fn source_dir(&self, source: Source, base_dir: &Path) -> PathBuf {
        self.resolve_path(&self.pipeline.raw_dir, base_dir)
            .join(source.as_str())
    }

    /// Serialize in the format named by `ext`, mirroring [`Config::parse`].
    pub fn render(&self, ext: &str) -> Result<String, ConfigError> {
        match ext {
            "toml" => toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
                format: "TOML",
                message: e.to_string(),
            }),
            "yaml" | "yml" => serde_yaml::to_string(self).map_err(|e| ConfigError::Serialize {
                format: "YAML",
                message: e.to_string(),
            }),
            _ => serde_json::to_string_pretty(self).map_err(|e| ConfigError::Serialize {
                format: "JSON",
                message: e.to_string(),
            }),
        }
    }

    /// Write the config to `path`, creating parent directories.
    pub async fn save_to_path(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        let contents = self.render(ext)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(path, contents).await.map_err(write_err)
    }

    /// Compute SHA-256 hash of the serialized config.
    pub fn hash(&self) -> String {
        let json = serde_json::to_string(self).unwrap_or_default();
        sha256_hex(json.as_bytes())
    }

    /// Short form of [`Config::hash`] used in run manifests.
    pub fn short_hash(&self) -> String {
        self.hash()[..16].to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.processing.min_text_length, 100);
        assert_eq!(config.processing.unicode_normalize, UnicodeForm::Nfc);
        assert_eq!(config.processing.dedupe_hash_algorithm, HashAlgorithm::Xxhash64);
        assert_eq!(config.processing.dedupe_fields, vec![RecordField::Text]);
        assert_eq!(
            config.enabled_sources(),
            vec![Source::ViePublique, Source::Senat, Source::Assemblee]
        );
    }

    #[test]
    fn test_parse_yaml_with_descriptive_aliases() {
        let yaml = r#"
pipeline:
  date_range:
    start: 2005-01-01
    end: 2005-12-31
processing:
  unicode_normalize: compatibility-composed
  dedupe_hash_algorithm: cryptographic
  dedupe_fields: [speaker, text]
  min_text_length: 50
"#;
        let config = Config::parse(yaml, "yaml").unwrap();
        assert_eq!(config.processing.unicode_normalize, UnicodeForm::Nfkc);
        assert_eq!(config.processing.dedupe_hash_algorithm, HashAlgorithm::Sha256);
        assert_eq!(
            config.processing.dedupe_fields,
            vec![RecordField::Speaker, RecordField::Text]
        );
        assert_eq!(config.processing.min_text_length, 50);
        assert!(config.processing.strip_html);
        assert_eq!(
            config.pipeline.date_range.start,
            NaiveDate::from_ymd_opt(2005, 1, 1).unwrap()
        );
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
[processing]
unicode_normalize = "NFD"
dedupe_hash_algorithm = "sha256"

[sources.europarl]
enabled = true
"#;
        let config = Config::parse(toml, "toml").unwrap();
        assert_eq!(config.processing.unicode_normalize, UnicodeForm::Nfd);
        assert!(config.enabled_sources().contains(&Source::Europarl));
    }

    #[test]
    fn test_unknown_enum_value_is_rejected() {
        let result = Config::parse(
            r#"{"processing": {"dedupe_hash_algorithm": "md5"}}"#,
            "json",
        );
        assert!(matches!(result, Err(ConfigError::Parse { .. })));

        let result = Config::parse(r#"{"processing": {"dedupe_fields": ["body"]}}"#, "json");
        assert!(matches!(result, Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn test_validate_rejects_inverted_range() {
        let mut config = Config::default();
        config.pipeline.date_range = DateRange::new(
            NaiveDate::from_ymd_opt(2010, 1, 1).unwrap(),
            NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        );
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_empty_dedupe_fields() {
        let mut config = Config::default();
        config.processing.dedupe_fields.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::EmptyDedupeFields)
        ));
    }

    #[test]
    fn test_date_range_is_inclusive() {
        let day = NaiveDate::from_ymd_opt(2005, 1, 1).unwrap();
        let range = DateRange::new(day, day);
        assert!(range.contains(day));
        assert!(!range.contains(day.succ_opt().unwrap()));
    }

    #[test]
    fn test_restrict_sources() {
        let mut config = Config::default();
        config.restrict_sources(&[Source::Senat, Source::Europarl]);
        assert_eq!(
            config.enabled_sources(),
            vec![Source::Senat, Source::Europarl]
        );
    }

    #[tokio::test]
    async fn test_saved_defaults_load_back_in_every_format() {
        let dir = tempfile::tempdir().unwrap();
        let defaults = Config::default();

        for name in ["speechcorpus.yaml", "nested/speechcorpus.toml", "speechcorpus.json"] {
            let path = dir.path().join(name);
            defaults.save_to_path(&path).await.unwrap();

            let loaded = Config::load_from_path(&path).await.unwrap();
            assert_eq!(loaded.hash(), defaults.hash(), "{}", name);
            assert_eq!(loaded.source_path.as_deref(), Some(path.as_path()));
            loaded.validate().unwrap();
        }
    }

    #[test]
    fn test_hash_is_stable_and_short_hash_is_prefix() {
        let config = Config::default();
        assert_eq!(config.hash(), Config::default().hash());
        assert_eq!(config.hash().len(), 64);
        assert!(config.hash().starts_with(&config.short_hash()));
    }

    #[test]
    fn test_resolve_path_relative_to_base() {
        let config = Config::default();
        let resolved = config.resolve_path("raw", Path::new("/srv/corpus"));
        assert_eq!(resolved, PathBuf::from("/srv/corpus/raw"));
        let absolute = config.resolve_path("/tmp/raw", Path::new("/srv/corpus"));
        assert_eq!(absolute, PathBuf::from("/tmp/raw"));
    }
}
