//! Data models for speechcorpus.

mod speech;
mod stats;

pub use speech::{RecordField, Source, SpeechRecord, UNKNOWN_SPEAKER, UNTITLED};
pub use stats::{RunManifest, SourceStats};
