//! speechcorpus - normalization pipeline for public political speech
//! transcripts.
//!
//! Raw archives from several French public sources go through structural
//! extraction, text cleaning and cross-source content deduplication, and
//! come out as one canonical [`models::SpeechRecord`] stream.

pub mod config;
pub mod export;
pub mod ledger;
pub mod models;
pub mod parsers;
pub mod pipeline;
pub mod processors;
pub mod utils;

pub use config::Config;
pub use pipeline::{Pipeline, PipelineError, RunReport};
