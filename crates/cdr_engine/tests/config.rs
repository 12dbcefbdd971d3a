use std::fs;
use std::io::Read;
use std::path::Path;

use cdr_core::{content_digest, CdrVersion, CrawlRecord};
use cdr_engine::{
    run_export, ConfigError, ExportConfig, IndexTarget, ObjectStoreConfig, SetupError,
};
use flate2::read::GzDecoder;
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

fn write_fixture(dir: &Path) {
    let records = [
        CrawlRecord::new("http://x.com/logo.png", Some("image/png"), "PNG"),
        CrawlRecord::new(
            "http://x.com/page.html",
            Some("text/html"),
            r#"<html><img src="/logo.png"></html>"#,
        ),
        CrawlRecord::new("http://x.com/unknown", None, "?"),
    ];
    let body: String = records
        .iter()
        .map(|r| serde_json::to_string(r).unwrap() + "\n")
        .collect();
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("part-0000.jsonl"), body).unwrap();
}

fn with_index(mut config: ExportConfig, target: IndexTarget) -> ExportConfig {
    config.index = Some(target);
    config
}

#[test]
fn v31_requires_an_object_store() {
    let config = ExportConfig::new("/data");
    assert_eq!(
        config.validate(),
        Err(ConfigError::MissingObjectStore(CdrVersion::V31))
    );

    let mut config = ExportConfig::new("/data");
    config.version = CdrVersion::V3;
    assert_eq!(config.validate(), Ok(()));
}

#[test]
fn index_target_needs_name_type_and_sane_auth() {
    let mut base = ExportConfig::new("/data");
    base.version = CdrVersion::V2;

    let target = IndexTarget::new("http://localhost:9200");
    assert_eq!(
        with_index(base.clone(), target.clone()).validate(),
        Err(ConfigError::MissingIndexName)
    );

    let named = IndexTarget {
        index: Some("cdr".into()),
        doc_type: Some(String::new()),
        ..target.clone()
    };
    assert_eq!(
        with_index(base.clone(), named.clone()).validate(),
        Err(ConfigError::MissingIndexType)
    );

    let typed = IndexTarget {
        doc_type: Some("page".into()),
        ..named
    };
    assert_eq!(with_index(base.clone(), typed.clone()).validate(), Ok(()));

    let bad_auth = IndexTarget {
        auth: Some("no-separator".into()),
        ..typed.clone()
    };
    assert_eq!(
        with_index(base.clone(), bad_auth).validate(),
        Err(ConfigError::InvalidAuth)
    );

    let zero_bulk = IndexTarget {
        bulk_size: 0,
        ..typed
    };
    assert_eq!(
        with_index(base, zero_bulk).validate(),
        Err(ConfigError::InvalidBulkSize)
    );
}

#[test]
fn zero_progress_interval_is_rejected() {
    let mut config = ExportConfig::new("/data");
    config.version = CdrVersion::V2;
    config.progress_every = 0;
    assert_eq!(config.validate(), Err(ConfigError::InvalidProgressInterval));
}

#[test]
fn invalid_config_aborts_before_reading_input() {
    engine_logging::initialize_for_tests();
    let config = ExportConfig::new("/definitely/not/here");
    let err = run_export(&config).unwrap_err();
    assert!(matches!(
        err,
        SetupError::Config(ConfigError::MissingObjectStore(CdrVersion::V31))
    ));
}

#[test]
fn missing_input_directory_is_reported() {
    engine_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let mut config = ExportConfig::new(temp.path().join("absent"));
    config.version = CdrVersion::V3;
    config.tmp_path = Some(temp.path().to_path_buf());

    let err = run_export(&config).unwrap_err();
    assert!(matches!(err, SetupError::Export(_)), "got {err:?}");
}

#[test]
fn run_export_writes_objects_and_compressed_documents() {
    engine_logging::initialize_for_tests();
    let temp = TempDir::new().unwrap();
    let input = temp.path().join("crawl");
    write_fixture(&input);
    let objects = temp.path().join("objects");
    let scratch = temp.path().join("tmp");
    fs::create_dir_all(&scratch).unwrap();
    let output = temp.path().join("out/cdr.json.gz");

    let mut config = ExportConfig::new(&input);
    config.object_store = Some(ObjectStoreConfig::Directory(objects.clone()));
    config.output_file = Some(output.clone());
    config.tmp_path = Some(scratch.clone());

    let summary = run_export(&config).unwrap();

    assert_eq!(summary.media.emitted, 1);
    assert_eq!(summary.media.anomalies, 1);
    assert_eq!(summary.documents.emitted, 1);
    assert_eq!(summary.documents.anomalies, 1);

    let key = format!("com/x/{}", content_digest(b"PNG"));
    assert_eq!(fs::read(objects.join(&key)).unwrap(), b"PNG");

    let mut text = String::new();
    GzDecoder::new(fs::File::open(&output).unwrap())
        .read_to_string(&mut text)
        .unwrap();
    let docs: Vec<Value> = text
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0]["url"], "http://x.com/page.html");
    assert_eq!(docs[0]["team"], "NYU");
    assert_eq!(docs[0]["crawler"], "ACHE");
    assert_eq!(docs[0]["objects"][0]["obj_stored_url"], key.as_str());

    assert_eq!(fs::read_dir(&scratch).unwrap().count(), 0, "cache dir left behind");
}
