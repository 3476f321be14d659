//! Text cleaning for speech records.
//!
//! Cleaning runs in a fixed order: Unicode normalization, HTML stripping,
//! whitespace canonicalization, boilerplate removal, and whitespace again.
//! The whole sequence repeats until the text stops changing, so cleaning
//! a cleaned text is a no-op even when stripped HTML decoded entities.

use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use scraper::Html;
use unicode_normalization::UnicodeNormalization;

use crate::config::{ProcessingConfig, UnicodeForm};
use crate::models::{SpeechRecord, UNKNOWN_SPEAKER, UNTITLED};

/// Titles longer than this are truncated with an ellipsis.
pub const MAX_TITLE_CHARS: usize = 500;

/// Upper bound on extra cleaning passes; real texts settle in one or two.
const MAX_PASSES: usize = 16;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]+>").unwrap());
static CONTROL_WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\t\r\x0C\x0B]+").unwrap());
static MULTI_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}").unwrap());
static MULTI_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\([^)]*\)\s*").unwrap());

/// Session ceremony, audience reactions, presidency prefixes and page
/// markers, applied in this order.
static BOILERPLATE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)La séance est ouverte[^.]*\.",
        r"(?i)La séance est levée[^.]*\.",
        r"(?i)Prochaine séance[^.]*\.",
        r"(?i)La séance est suspendue[^.]*\.",
        r"(?i)La séance est reprise[^.]*\.",
        r"(?i)\(Applaudissements[^)]*\)",
        r"(?i)\(Exclamations[^)]*\)",
        r"(?i)\(Rires[^)]*\)",
        r"(?i)\(Protestations[^)]*\)",
        r"(?i)\(Murmures[^)]*\)",
        r"(?i)M\. le président\.?\s*[-–—]?\s*",
        r"(?i)Mme la présidente\.?\s*[-–—]?\s*",
        r"(?i)- \d+ -",
        r"(?i)page \d+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Civility prefixes removed from speaker names.
static SPEAKER_PREFIXES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"(?i)^M\.\s+",
        r"(?i)^Mme\.?\s+",
        r"(?i)^Mlle\.?\s+",
        r"(?i)^Dr\.?\s+",
        r"(?i)^Pr\.?\s+",
        r"(?i)^Me\.?\s+",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).unwrap())
    .collect()
});

/// Deterministic text cleaner configured from the `processing` section.
#[derive(Debug, Clone)]
pub struct TextCleaner {
    form: UnicodeForm,
    strip_html: bool,
    remove_boilerplate: bool,
    min_text_length: usize,
}

impl TextCleaner {
    pub fn new(config: &ProcessingConfig) -> Self {
        Self {
            form: config.unicode_normalize,
            strip_html: config.strip_html,
            remove_boilerplate: config.remove_boilerplate,
            min_text_length: config.min_text_length,
        }
    }

    /// Clean a record's text and stamp `cleaned_at`.
    ///
    /// Length gating is left to the caller.
    pub fn clean(&self, record: SpeechRecord) -> SpeechRecord {
        let text = self.clean_text(&record.text);
        record.with_text(text).mark_cleaned(Utc::now())
    }

    /// Run the full cleaning sequence on a text.
    pub fn clean_text(&self, text: &str) -> String {
        let mut text = self.clean_pass(text);
        for _ in 0..MAX_PASSES {
            let next = self.clean_pass(&text);
            if next == text {
                break;
            }
            text = next;
        }
        text
    }

    /// One pass of the sequence. Entity decoding can produce fresh markup
    /// or unnormalized code points, so passes repeat until stable.
    fn clean_pass(&self, text: &str) -> String {
        let mut text = self.normalize(text);

        if self.strip_html && text.contains('<') {
            text = self.normalize(&strip_html(&text));
        }

        text = canonicalize_whitespace(&text);

        if self.remove_boilerplate {
            loop {
                let next = canonicalize_whitespace(&remove_boilerplate(&text));
                if next == text {
                    break;
                }
                text = next;
            }
        }

        text
    }

    /// Clean records and drop those whose text ends up too short.
    pub fn clean_batch<'a, I>(&'a self, records: I) -> impl Iterator<Item = SpeechRecord> + 'a
    where
        I: IntoIterator<Item = SpeechRecord>,
        I::IntoIter: 'a,
    {
        records
            .into_iter()
            .map(|record| self.clean(record))
            .filter(|record| record.text.chars().count() >= self.min_text_length)
    }

    /// Strip civility titles and asides from a speaker name.
    ///
    /// Empty results become [`UNKNOWN_SPEAKER`].
    pub fn clean_speaker(&self, speaker: &str) -> String {
        let mut speaker = self.normalize(speaker);
        for prefix in SPEAKER_PREFIXES.iter() {
            speaker = prefix.replace(&speaker, "").into_owned();
        }
        let speaker = PARENTHETICAL.replace_all(&speaker, " ");
        let speaker = collapse_whitespace(&speaker);

        if speaker.is_empty() {
            UNKNOWN_SPEAKER.to_string()
        } else {
            speaker
        }
    }

    /// Collapse whitespace and bound the length of a title.
    ///
    /// Empty results become [`UNTITLED`].
    pub fn clean_title(&self, title: &str) -> String {
        let title = collapse_whitespace(&self.normalize(title));
        let title = if title.chars().count() > MAX_TITLE_CHARS {
            let kept: String = title.chars().take(MAX_TITLE_CHARS - 3).collect();
            format!("{}...", kept)
        } else {
            title
        };

        let title = title.trim();
        if title.is_empty() {
            UNTITLED.to_string()
        } else {
            title.to_string()
        }
    }

    fn normalize(&self, text: &str) -> String {
        match self.form {
            UnicodeForm::Nfc => text.nfc().collect(),
            UnicodeForm::Nfd => text.nfd().collect(),
            UnicodeForm::Nfkc => text.nfkc().collect(),
            UnicodeForm::Nfkd => text.nfkd().collect(),
        }
    }
}

/// Text content of an HTML fragment. Falls back to blind tag removal
/// when structural parsing recovers nothing.
fn strip_html(text: &str) -> String {
    if !text.contains('<') {
        return text.to_string();
    }

    let fragment = Html::parse_fragment(text);
    let structural: String = fragment.root_element().text().collect();
    if structural.trim().is_empty() {
        let fallback = HTML_TAG.replace_all(text, " ");
        if !fallback.trim().is_empty() {
            return fallback.into_owned();
        }
    }
    structural
}

/// Control whitespace to spaces, single spaces, trimmed lines, at most one
/// blank line in a row, trimmed ends.
fn canonicalize_whitespace(text: &str) -> String {
    let text = CONTROL_WHITESPACE.replace_all(text, " ");
    let text = MULTI_SPACE.replace_all(&text, " ");
    let text = text.split('\n').map(str::trim).collect::<Vec<_>>().join("\n");
    let text = MULTI_NEWLINE.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn remove_boilerplate(text: &str) -> String {
    BOILERPLATE
        .iter()
        .fold(text.to_string(), |acc, pattern| {
            pattern.replace_all(&acc, "").into_owned()
        })
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Source;
    use chrono::NaiveDate;

    fn cleaner() -> TextCleaner {
        TextCleaner::new(&ProcessingConfig::default())
    }

    fn record(text: &str) -> SpeechRecord {
        SpeechRecord::new(
            Source::Senat,
            "x",
            NaiveDate::from_ymd_opt(2005, 1, 1).unwrap(),
            "Jean Dupont",
            "Titre",
            text,
        )
    }

    #[test]
    fn test_applause_is_removed_with_single_spacing() {
        let cleaned = cleaner().clean_text(
            "Nous devons agir ensemble (Applaudissements prolongés) pour notre pays.",
        );
        assert_eq!(cleaned, "Nous devons agir ensemble pour notre pays.");
    }

    #[test]
    fn test_session_ceremony_is_removed() {
        let cleaned = cleaner().clean_text(
            "La séance est ouverte à quinze heures.\nMes chers collègues, bienvenue. (Rires.)\n- 12 -\nLa séance est levée à minuit.",
        );
        assert_eq!(cleaned, "Mes chers collègues, bienvenue.");
    }

    #[test]
    fn test_presidency_prefix_and_page_markers() {
        let cleaned = cleaner().clean_text("M. le président. – La parole est à vous. Page 3");
        assert_eq!(cleaned, "La parole est à vous.");
    }

    #[test]
    fn test_whitespace_canonicalization() {
        let cleaned = cleaner().clean_text("  Un\t\tdeux   trois \r\n\n\n\n  quatre  \n");
        assert_eq!(cleaned, "Un deux trois\n\nquatre");
    }

    #[test]
    fn test_html_is_stripped_and_entities_decoded() {
        let cleaned = cleaner().clean_text("<p>Bonjour <b>à tous</b> &amp; merci</p>");
        assert_eq!(cleaned, "Bonjour à tous & merci");
    }

    #[test]
    fn test_decoded_entities_are_cleaned_in_the_same_call() {
        let cleaner = cleaner();
        assert_eq!(cleaner.clean_text("<p>e&#769;lu</p>"), "\u{e9}lu");
        assert_eq!(
            cleaner.clean_text("<p>&lt;b&gt;Bonjour&lt;/b&gt;</p>"),
            "Bonjour"
        );
    }

    #[test]
    fn test_plain_comparison_survives_html_stripping() {
        let cleaned = cleaner().clean_text("Le déficit est < 3 % du PIB.");
        assert_eq!(cleaned, "Le déficit est < 3 % du PIB.");
    }

    #[test]
    fn test_html_stripping_can_be_disabled() {
        let config = ProcessingConfig {
            strip_html: false,
            ..ProcessingConfig::default()
        };
        let cleaned = TextCleaner::new(&config).clean_text("<b>gras</b>");
        assert_eq!(cleaned, "<b>gras</b>");
    }

    #[test]
    fn test_boilerplate_removal_can_be_disabled() {
        let config = ProcessingConfig {
            remove_boilerplate: false,
            ..ProcessingConfig::default()
        };
        let cleaned = TextCleaner::new(&config).clean_text("Bravo (Applaudissements) !");
        assert_eq!(cleaned, "Bravo (Applaudissements) !");
    }

    #[test]
    fn test_unicode_forms() {
        let decomposed = "e\u{301}lu";
        assert_eq!(cleaner().clean_text(decomposed), "\u{e9}lu");

        let config = ProcessingConfig {
            unicode_normalize: UnicodeForm::Nfkc,
            ..ProcessingConfig::default()
        };
        assert_eq!(TextCleaner::new(&config).clean_text("\u{fb01}n"), "fin");

        let config = ProcessingConfig {
            unicode_normalize: UnicodeForm::Nfd,
            ..ProcessingConfig::default()
        };
        assert_eq!(TextCleaner::new(&config).clean_text("\u{e9}lu"), decomposed);
    }

    #[test]
    fn test_cleaning_is_idempotent() {
        let samples = [
            "Nous devons agir (Applaudissements) maintenant.",
            "La séance (Rires) est ouverte à dix heures. Bonjour.",
            "  <div>Texte <i>riche</i></div>\n\n\n\nSuite  (Murmures sur divers bancs)  ",
            "M. le président. – - 4 - Merci. page 12\t\tFin",
            "Ligne un\r\nLigne deux\n \n \n \nLigne trois",
            "Mme la présidente. — (Exclamations) (Protestations) Bien.",
            "<p>e&#769;lu</p>",
            "<p>&lt;b&gt;Bonjour&lt;/b&gt;</p>",
            "<div>&amp;lt;i&amp;gt;deux niveaux&amp;lt;/i&amp;gt;</div>",
        ];
        let cleaner = cleaner();
        for sample in samples {
            let once = cleaner.clean_text(sample);
            assert_eq!(cleaner.clean_text(&once), once, "sample: {:?}", sample);
        }
    }

    #[test]
    fn test_clean_stamps_cleaned_at_once() {
        let cleaner = cleaner();
        let first = cleaner.clean(record("Un  texte"));
        assert_eq!(first.text, "Un texte");
        let stamp = first.cleaned_at;
        assert!(stamp.is_some());

        let second = cleaner.clean(first);
        assert_eq!(second.cleaned_at, stamp);
    }

    #[test]
    fn test_clean_speaker() {
        let cleaner = cleaner();
        assert_eq!(cleaner.clean_speaker("M. Jean Dupont"), "Jean Dupont");
        assert_eq!(cleaner.clean_speaker("mme  Nicole Borvo"), "Nicole Borvo");
        assert_eq!(cleaner.clean_speaker("Dr. Martin (UMP)"), "Martin");
        assert_eq!(
            cleaner.clean_speaker("Jean Arthuis (Union centriste) rapporteur"),
            "Jean Arthuis rapporteur"
        );
        assert_eq!(cleaner.clean_speaker(""), UNKNOWN_SPEAKER);
        assert_eq!(cleaner.clean_speaker("(inconnu)"), UNKNOWN_SPEAKER);
    }

    #[test]
    fn test_clean_title() {
        let cleaner = cleaner();
        assert_eq!(cleaner.clean_title("  Déclaration \n sur   l'Europe "), "Déclaration sur l'Europe");
        assert_eq!(cleaner.clean_title("   "), UNTITLED);

        let long = "é".repeat(600);
        let title = cleaner.clean_title(&long);
        assert_eq!(title.chars().count(), MAX_TITLE_CHARS);
        assert!(title.ends_with("..."));
    }

    #[test]
    fn test_clean_batch_drops_short_records() {
        let config = ProcessingConfig {
            min_text_length: 10,
            ..ProcessingConfig::default()
        };
        let cleaner = TextCleaner::new(&config);
        let kept: Vec<SpeechRecord> = cleaner
            .clean_batch(vec![
                record("Assez long pour rester."),
                record("Court (Applaudissements sur toutes les travées)"),
            ])
            .collect();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].text, "Assez long pour rester.");
    }
}
