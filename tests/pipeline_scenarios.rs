//! End-to-end pipeline runs over small raw trees.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;
use tempfile::TempDir;

use speechcorpus::config::DateRange;
use speechcorpus::export::{read_jsonl, run_and_export, JSONL_FILE, MANIFEST_FILE};
use speechcorpus::models::{RunManifest, Source, SpeechRecord};
use speechcorpus::utils::sha256_file;
use speechcorpus::{Config, Pipeline};

const LONG_TEXT: &str = "Mes chers collègues, le projet de loi que nous examinons aujourd'hui \
     engage durablement les finances de nos collectivités territoriales.";

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn senat_doc(speaker: &str, text: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<cri:compteRendu xmlns:cri="http://senat.fr/schemas/thb/cri">
  <cri:intervenant nom="{}">
    <p>{}</p>
  </cri:intervenant>
</cri:compteRendu>"#,
        speaker, text
    )
}

fn config_for(root: &TempDir, sources: &[Source], start: NaiveDate, end: NaiveDate) -> Config {
    let mut config = Config::default();
    config.pipeline.raw_dir = root.path().join("raw").to_string_lossy().into_owned();
    config.pipeline.output_dir = root.path().join("out").to_string_lossy().into_owned();
    config.pipeline.date_range = DateRange::new(start, end);
    config.processing.min_text_length = 50;
    config.restrict_sources(sources);
    config
}

fn collect(pipeline: &Pipeline) -> (Vec<SpeechRecord>, speechcorpus::RunReport) {
    let mut out = Vec::new();
    let report = pipeline
        .run(|record| {
            out.push(record.clone());
            Ok(())
        })
        .unwrap();
    (out, report)
}

#[test]
fn test_senat_filename_date_gating_and_speaker_recasing() {
    let root = tempfile::tempdir().unwrap();
    let senat = root.path().join("raw/senat");
    write(&senat.join("d20050101.xml"), &senat_doc("JEAN DUPONT", LONG_TEXT));
    write(
        &senat.join("d20050102.xml"),
        &senat_doc("Claire Petit", "Une autre intervention, sans rapport avec la première, tenue le lendemain."),
    );

    let config = config_for(&root, &[Source::Senat], date(2005, 1, 1), date(2005, 1, 1));
    let (records, report) = collect(&Pipeline::new(config));

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].speaker, "Jean Dupont");
    assert_eq!(records[0].date, date(2005, 1, 1));
    assert_eq!(records[0].session_id.as_deref(), Some("d20050101"));
    assert!(records[0].is_final());

    let stats = report.ledger.stats(Source::Senat);
    assert_eq!(stats.collected, 2);
    assert_eq!(stats.parsed, 1);
    assert_eq!(stats.deduplicated, 1);
}

fn vie_publique_manifest(entries: &str) -> String {
    format!(r#"{{"discours": [{}]}}"#, entries)
}

#[test]
fn test_cross_source_duplicate_keeps_first_source() {
    let root = tempfile::tempdir().unwrap();
    write(
        &root.path().join("raw/vie_publique/vp_discours.json"),
        &vie_publique_manifest(&format!(
            r#"{{"id": "vp-1", "prononciation": "2005-01-01", "titre": "Discours", "auteur": "Jean Dupont", "texte": "{}"}}"#,
            LONG_TEXT
        )),
    );
    write(&root.path().join("raw/senat/d20050101.xml"), &senat_doc("Jean Dupont", LONG_TEXT));

    let config = config_for(
        &root,
        &[Source::ViePublique, Source::Senat],
        date(2005, 1, 1),
        date(2005, 12, 31),
    );
    let (records, report) = collect(&Pipeline::new(config));

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].source, Source::ViePublique);
    assert_eq!(records[0].source_id, "vp-1");

    assert_eq!(report.dedup.total_seen, 2);
    assert_eq!(report.dedup.duplicates_found, 1);
    assert_eq!(report.dedup.source_duplicates.get(&Source::Senat), Some(&1));
    assert_eq!(report.ledger.stats(Source::Senat).cleaned, 1);
    assert_eq!(report.ledger.stats(Source::Senat).deduplicated, 0);
    assert_eq!(report.ledger.total_records(), 2);
    assert_eq!(report.ledger.deduplicated_records(), 1);
}

#[test]
fn test_structured_page_body_replaces_manifest_summary() {
    let root = tempfile::tempdir().unwrap();
    let body = "x".repeat(2000);
    let vp = root.path().join("raw/vie_publique");
    write(
        &vp.join("vp_discours.json"),
        &vie_publique_manifest(
            r#"{"id": "12345", "prononciation": "2005-06-15", "titre": "Déclaration", "texte": "..."}"#,
        ),
    );
    write(
        &vp.join("pages/12345.html"),
        &format!(
            r#"<html><head><script type="application/ld+json">{{"@type": "Article", "articleBody": "{}"}}</script></head><body><main>Résumé</main></body></html>"#,
            body
        ),
    );

    let config = config_for(&root, &[Source::ViePublique], date(2005, 1, 1), date(2005, 12, 31));
    let (records, _) = collect(&Pipeline::new(config));

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text, body);
}

#[test]
fn test_applause_removed_before_export() {
    let root = tempfile::tempdir().unwrap();
    write(
        &root.path().join("raw/senat/d20050101.xml"),
        &senat_doc(
            "Jean Dupont",
            "Nous devons agir ensemble (Applaudissements prolongés) pour que notre pays retrouve la croissance.",
        ),
    );

    let config = config_for(&root, &[Source::Senat], date(2005, 1, 1), date(2005, 12, 31));
    let (records, _) = collect(&Pipeline::new(config));

    assert_eq!(records.len(), 1);
    assert_eq!(
        records[0].text,
        "Nous devons agir ensemble pour que notre pays retrouve la croissance."
    );
    assert!(!records[0].text.contains("  "));
}

#[test]
fn test_dateless_file_is_a_skip_not_an_error() {
    let root = tempfile::tempdir().unwrap();
    let senat = root.path().join("raw/senat");
    write(&senat.join("sans_date.xml"), &senat_doc("Jean Dupont", LONG_TEXT));

    let config = config_for(&root, &[Source::Senat], date(2000, 1, 1), date(2010, 12, 31));
    let (records, report) = collect(&Pipeline::new(config));

    assert!(records.is_empty());
    let stats = report.ledger.stats(Source::Senat);
    assert_eq!(stats.collected, 1);
    assert_eq!(stats.parsed, 0);
    assert_eq!(stats.errors, 0);
    assert!(report.ledger.errors().is_empty());
}

#[test]
fn test_malformed_document_is_counted_and_run_continues() {
    let root = tempfile::tempdir().unwrap();
    let senat = root.path().join("raw/senat");
    write(&senat.join("d20050101.xml"), "<cri:compteRendu><p>oops</cri:compteRendu>");
    write(&senat.join("d20050102.xml"), &senat_doc("Jean Dupont", LONG_TEXT));

    let config = config_for(&root, &[Source::Senat], date(2005, 1, 1), date(2005, 12, 31));
    let (records, report) = collect(&Pipeline::new(config));

    assert_eq!(records.len(), 1);
    let stats = report.ledger.stats(Source::Senat);
    assert_eq!(stats.collected, 2);
    assert_eq!(stats.errors, 1);
    assert_eq!(report.ledger.errors().len(), 1);
    assert!(report.ledger.errors()[0].starts_with("Parsing error (senat): "));
    assert!(report.ledger.errors()[0].contains("d20050101.xml"));
}

#[test]
fn test_every_emitted_record_is_in_range_and_long_enough() {
    let root = tempfile::tempdir().unwrap();
    let senat = root.path().join("raw/senat");
    write(&senat.join("d20041231.xml"), &senat_doc("Avant", LONG_TEXT));
    write(&senat.join("d20050301.xml"), &senat_doc("Pendant", &format!("{} Premier.", LONG_TEXT)));
    write(&senat.join("d20050302.xml"), &senat_doc("Court", "Très bien (Applaudissements sur de nombreuses travées de l'hémicycle)."));
    write(&senat.join("d20060101.xml"), &senat_doc("Après", LONG_TEXT));

    let config = config_for(&root, &[Source::Senat], date(2005, 1, 1), date(2005, 12, 31));
    let min = config.processing.min_text_length;
    let range = config.pipeline.date_range;
    let (records, _) = collect(&Pipeline::new(config));

    assert_eq!(records.len(), 1);
    for record in &records {
        assert!(range.contains(record.date));
        assert!(record.text.chars().count() >= min);
    }
    assert_eq!(records[0].speaker, "Pendant");
}

#[test]
fn test_assemblee_gap_notice_and_europarl_stub_yield_nothing() {
    let root = tempfile::tempdir().unwrap();
    write(&root.path().join("raw/assemblee/DATA_GAP_NOTICE.md"), "No structured data before 2011.");
    write(&root.path().join("raw/europarl/EUROPARL_STUB.md"), "Not collected.");

    let config = config_for(
        &root,
        &[Source::Assemblee, Source::Europarl],
        date(2000, 1, 1),
        date(2010, 12, 31),
    );
    let (records, report) = collect(&Pipeline::new(config));

    assert!(records.is_empty());
    assert_eq!(report.ledger.snapshot().len(), 2);
    assert!(report.ledger.errors().is_empty());
}

#[test]
fn test_repeated_runs_are_deterministic() {
    let root = tempfile::tempdir().unwrap();
    let senat = root.path().join("raw/senat");
    write(&senat.join("d20050101.xml"), &senat_doc("Jean Dupont", LONG_TEXT));
    write(&senat.join("d20050102.xml"), &senat_doc("Paul Durand", LONG_TEXT));
    write(&senat.join("d20050103.xml"), &senat_doc("Claire Petit", &format!("{} Fin.", LONG_TEXT)));

    let config = config_for(&root, &[Source::Senat], date(2005, 1, 1), date(2005, 12, 31));
    let key = |records: Vec<SpeechRecord>| -> Vec<(String, Option<String>)> {
        records.into_iter().map(|r| (r.source_id, r.text_hash)).collect()
    };
    let (first, _) = collect(&Pipeline::new(config.clone()));
    let (second, _) = collect(&Pipeline::new(config));

    assert_eq!(first.len(), 2);
    assert_eq!(key(first), key(second));
}

#[tokio::test]
async fn test_concurrent_run_matches_sequential_run() {
    let root = tempfile::tempdir().unwrap();
    write(
        &root.path().join("raw/vie_publique/vp_discours.json"),
        &vie_publique_manifest(&format!(
            r#"{{"id": "vp-1", "prononciation": "2005-01-01", "auteur": "Jean Dupont", "texte": "{}"}},
               {{"id": "vp-2", "prononciation": "2005-02-01", "auteur": "Paul Durand", "texte": "{} Suite."}}"#,
            LONG_TEXT, LONG_TEXT
        )),
    );
    write(&root.path().join("raw/senat/d20050101.xml"), &senat_doc("Jean Dupont", LONG_TEXT));
    write(
        &root.path().join("raw/senat/d20050102.xml"),
        &senat_doc("Claire Petit", &format!("{} Autre.", LONG_TEXT)),
    );

    let mut config = config_for(
        &root,
        &[Source::ViePublique, Source::Senat],
        date(2005, 1, 1),
        date(2005, 12, 31),
    );
    config.pipeline.max_workers = 2;
    let pipeline = Pipeline::new(config);

    let (sequential, seq_report) = collect(&pipeline);

    let mut concurrent = Vec::new();
    let con_report = pipeline
        .run_concurrent(|record| {
            concurrent.push(record.clone());
            Ok(())
        })
        .await
        .unwrap();

    let ids = |records: &[SpeechRecord]| -> Vec<(Source, String)> {
        records.iter().map(|r| (r.source, r.source_id.clone())).collect()
    };
    assert_eq!(ids(&sequential), ids(&concurrent));
    assert_eq!(sequential.len(), 3);
    assert_eq!(seq_report.ledger.snapshot(), con_report.ledger.snapshot());
    assert_eq!(seq_report.dedup, con_report.dedup);
    assert!(!con_report.cancelled);
}

#[tokio::test]
async fn test_run_and_export_writes_corpus_and_manifest() {
    let root = tempfile::tempdir().unwrap();
    write(&root.path().join("raw/senat/d20050101.xml"), &senat_doc("JEAN DUPONT", LONG_TEXT));
    write(
        &root.path().join("raw/senat/d20050102.xml"),
        &senat_doc("Claire Petit", &format!("{} Autre.", LONG_TEXT)),
    );

    let config = config_for(&root, &[Source::Senat], date(2005, 1, 1), date(2005, 12, 31));
    let pipeline = Pipeline::new(config);
    let (report, manifest) = run_and_export(&pipeline, true).await.unwrap();

    let out = root.path().join("out");
    let records = read_jsonl(&out.join(JSONL_FILE)).unwrap();
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.text_hash.as_deref().map(str::len) == Some(16)));

    let written: RunManifest =
        serde_json::from_str(&fs::read_to_string(out.join(MANIFEST_FILE)).unwrap()).unwrap();
    assert_eq!(written.run_id, report.run_id);
    assert_eq!(written.run_id, manifest.run_id);
    assert_eq!(written.total_records, 2);
    assert_eq!(written.deduplicated_records, 2);
    assert_eq!(written.date_range_start, date(2005, 1, 1));
    assert_eq!(written.sources_processed["senat"].collected, 2);
    assert_eq!(
        written.output_files[JSONL_FILE],
        sha256_file(&out.join(JSONL_FILE)).unwrap()
    );
}

#[test]
fn test_yaml_config_drives_a_run() {
    let root = tempfile::tempdir().unwrap();
    write(&root.path().join("raw/senat/d20050101.xml"), &senat_doc("Jean Dupont", LONG_TEXT));

    let yaml = r#"
pipeline:
  date_range:
    start: 2005-01-01
    end: 2005-12-31
  raw_dir: raw
sources:
  vie_publique:
    enabled: false
  assemblee:
    enabled: false
processing:
  unicode_normalize: canonical-composed
  dedupe_hash_algorithm: cryptographic
  min_text_length: 50
"#;
    let config = Config::parse(yaml, "yaml").unwrap();
    config.validate().unwrap();
    let pipeline = Pipeline::new(config).with_base_dir(root.path());
    let (records, _) = collect(&pipeline);

    assert_eq!(records.len(), 1);
    assert_eq!(records[0].text_hash.as_deref().map(str::len), Some(64));
}
