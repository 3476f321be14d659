//! Date recovery for raw transcripts.
//!
//! Sources disagree on how they write dates: compact session filenames,
//! ISO strings, French day-first forms, long forms with month names, and
//! full timestamps in JSON manifests. Everything here returns `Option`;
//! an unreadable date is a filtering decision for the caller.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;

/// Sénat session files: `d20050127.xml`.
static SESSION_STEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[dD](\d{4})(\d{2})(\d{2})").unwrap());

/// Any date embedded in a filename: `seance_2005-03-15`, `cr20050315`.
static EMBEDDED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4})[-_]?(\d{2})[-_]?(\d{2})").unwrap());

static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4})(\d{2})(\d{2})").unwrap());

/// `27 janvier 2005`, `1er mars 2004`, `jeudi 3 February 2005`.
static LONG_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d{1,2})(?:er)?\s+(\p{L}+)\.?\s+(\d{4})\b").unwrap());

/// Day-first and ISO layouts tried on the first ten characters.
const SHORT_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%d-%m-%Y"];

fn month_number(name: &str) -> Option<u32> {
    let month = match name.to_lowercase().as_str() {
        "janvier" | "january" | "jan" => 1,
        "février" | "fevrier" | "february" | "feb" | "fév" | "fev" => 2,
        "mars" | "march" | "mar" => 3,
        "avril" | "april" | "apr" | "avr" => 4,
        "mai" | "may" => 5,
        "juin" | "june" | "jun" => 6,
        "juillet" | "july" | "jul" | "juil" => 7,
        "août" | "aout" | "august" | "aug" => 8,
        "septembre" | "september" | "sep" | "sept" => 9,
        "octobre" | "october" | "oct" => 10,
        "novembre" | "november" | "nov" => 11,
        "décembre" | "decembre" | "december" | "dec" | "déc" => 12,
        _ => return None,
    };
    Some(month)
}

fn ymd_from_captures(caps: &regex::Captures<'_>) -> Option<NaiveDate> {
    let year = caps.get(1)?.as_str().parse().ok()?;
    let month = caps.get(2)?.as_str().parse().ok()?;
    let day = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// First `n` characters of `s`, respecting char boundaries.
fn prefix(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Parse a date written in any of the layouts found in transcript XML.
pub fn parse_date_string(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let head = prefix(trimmed, 10);
    for format in SHORT_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(head, format) {
            return Some(date);
        }
    }

    if let Some(caps) = COMPACT_DATE.captures(head) {
        if let Some(date) = ymd_from_captures(&caps) {
            return Some(date);
        }
    }

    let caps = LONG_DATE.captures(trimmed)?;
    let day = caps.get(1)?.as_str().parse().ok()?;
    let month = month_number(caps.get(2)?.as_str())?;
    let year = caps.get(3)?.as_str().parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Date from a Sénat session filename stem (`d20050127`).
pub fn date_from_session_stem(stem: &str) -> Option<NaiveDate> {
    SESSION_STEM
        .captures(stem)
        .and_then(|caps| ymd_from_captures(&caps))
}

/// First plausible date embedded anywhere in a filename stem.
pub fn date_from_filename(stem: &str) -> Option<NaiveDate> {
    EMBEDDED_DATE
        .captures(stem)
        .and_then(|caps| ymd_from_captures(&caps))
}

/// Parse a manifest date: RFC 3339 timestamps, naive ISO datetimes, or
/// plain dates.
pub fn parse_manifest_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(dt.date());
        }
    }

    NaiveDate::parse_from_str(prefix(trimmed, 10), "%Y-%m-%d").ok()
}
