//! Canonical speech record shared by every pipeline stage.
//!
//! Records are produced by extractors, rewritten by the cleaner and
//! stamped with a content hash by the deduplicator. Each stage consumes a
//! record by value and hands a new one downstream, so provenance fields
//! can only move forward.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used when no speaker can be recovered.
pub const UNKNOWN_SPEAKER: &str = "Unknown";

/// Placeholder used when a record has no usable title.
pub const UNTITLED: &str = "Untitled";

/// Origin of a record. The set is closed: adding a source means adding an
/// extractor for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    ViePublique,
    Senat,
    Assemblee,
    Europarl,
}

impl Source {
    /// All sources in canonical processing order.
    pub const ALL: [Source; 4] = [
        Source::ViePublique,
        Source::Senat,
        Source::Assemblee,
        Source::Europarl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ViePublique => "vie_publique",
            Self::Senat => "senat",
            Self::Assemblee => "assemblee",
            Self::Europarl => "europarl",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "vie_publique" => Ok(Self::ViePublique),
            "senat" => Ok(Self::Senat),
            "assemblee" => Ok(Self::Assemblee),
            "europarl" => Ok(Self::Europarl),
            other => Err(format!("unknown source: {}", other)),
        }
    }
}

/// A record field that can take part in the deduplication fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordField {
    Source,
    SourceId,
    Date,
    Speaker,
    Title,
    Text,
    SourceUrl,
    Lang,
    License,
    SpeakerRole,
    SpeechType,
    SessionId,
}

/// Unified speech record across all sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeechRecord {
    /// Origin of the record.
    pub source: Source,
    /// Identifier, unique only within `source`.
    pub source_id: String,
    /// Delivery or session date.
    pub date: NaiveDate,
    /// Speaker display name.
    pub speaker: String,
    /// Speech title.
    pub title: String,
    /// Full text content.
    pub text: String,
    /// Original URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Language code.
    #[serde(default = "default_lang")]
    pub lang: String,
    /// When the raw document was turned into this record.
    pub retrieved_at: DateTime<Utc>,
    /// License the source publishes under.
    #[serde(default = "default_license")]
    pub license: String,
    /// Speaker's role or title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker_role: Option<String>,
    /// Kind of speech: discours, intervention, declaration...
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speech_type: Option<String>,
    /// Session identifier, when the source groups speeches by sitting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Content fingerprint, set by the deduplicator only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_hash: Option<String>,
    /// When the text went through the cleaner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cleaned_at: Option<DateTime<Utc>>,
}

fn default_lang() -> String {
    "fr".to_string()
}

fn default_license() -> String {
    "Open License".to_string()
}

impl SpeechRecord {
    /// Create a record with default metadata; `retrieved_at` is stamped now.
    pub fn new(
        source: Source,
        source_id: impl Into<String>,
        date: NaiveDate,
        speaker: impl Into<String>,
        title: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            source,
            source_id: source_id.into(),
            date,
            speaker: speaker.into(),
            title: title.into(),
            text: text.into(),
            source_url: None,
            lang: default_lang(),
            retrieved_at: Utc::now(),
            license: default_license(),
            speaker_role: None,
            speech_type: None,
            session_id: None,
            text_hash: None,
            cleaned_at: None,
        }
    }

    pub fn with_source_url(mut self, url: Option<String>) -> Self {
        self.source_url = url;
        self
    }

    pub fn with_license(mut self, license: impl Into<String>) -> Self {
        self.license = license.into();
        self
    }

    pub fn with_speaker_role(mut self, role: Option<String>) -> Self {
        self.speaker_role = role;
        self
    }

    pub fn with_speech_type(mut self, speech_type: Option<String>) -> Self {
        self.speech_type = speech_type;
        self
    }

    pub fn with_session_id(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    /// Replace the text body, keeping every other field.
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    /// Record the cleaning time. A record that was already cleaned keeps its
    /// first timestamp.
    pub(crate) fn mark_cleaned(mut self, at: DateTime<Utc>) -> Self {
        if self.cleaned_at.is_none() {
            self.cleaned_at = Some(at);
        }
        self
    }

    /// Attach the content fingerprint. Only the deduplicator calls this.
    pub(crate) fn with_text_hash(mut self, hash: String) -> Self {
        self.text_hash = Some(hash);
        self
    }

    /// A record is final once it has been cleaned and deduplicated.
    pub fn is_final(&self) -> bool {
        self.cleaned_at.is_some() && self.text_hash.is_some()
    }

    /// String form of a field, as used for fingerprinting.
    pub fn field_value(&self, field: RecordField) -> Option<Cow<'_, str>> {
        match field {
            RecordField::Source => Some(Cow::Borrowed(self.source.as_str())),
            RecordField::SourceId => Some(Cow::Borrowed(&self.source_id)),
            RecordField::Date => Some(Cow::Owned(self.date.format("%Y-%m-%d").to_string())),
            RecordField::Speaker => Some(Cow::Borrowed(&self.speaker)),
            RecordField::Title => Some(Cow::Borrowed(&self.title)),
            RecordField::Text => Some(Cow::Borrowed(&self.text)),
            RecordField::SourceUrl => self.source_url.as_deref().map(Cow::Borrowed),
            RecordField::Lang => Some(Cow::Borrowed(&self.lang)),
            RecordField::License => Some(Cow::Borrowed(&self.license)),
            RecordField::SpeakerRole => self.speaker_role.as_deref().map(Cow::Borrowed),
            RecordField::SpeechType => self.speech_type.as_deref().map(Cow::Borrowed),
            RecordField::SessionId => self.session_id.as_deref().map(Cow::Borrowed),
        }
    }
}
