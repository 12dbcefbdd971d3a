use std::fs;
use std::io::Write;
use std::path::Path;

use cdr_core::CrawlRecord;
use cdr_engine::{
    open_repository, CrawlRepository, FileSystemOptions, FileSystemRepository, FilesRepository,
    RepositoryError, RepositoryKind,
};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn record(url: &str, content_type: &str) -> CrawlRecord {
    CrawlRecord::new(url, Some(content_type), format!("<p>{url}</p>")).with_fetch_time(7)
}

fn json_lines(records: &[CrawlRecord]) -> String {
    records
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect::<Vec<_>>()
        .join("\n")
}

fn zlib(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

fn urls(repo: &dyn CrawlRepository) -> Vec<String> {
    repo.records()
        .unwrap()
        .map(|r| r.unwrap().url)
        .collect()
}

#[test]
fn files_repository_reads_plain_and_deflate_files_in_name_order() {
    let dir = TempDir::new().unwrap();
    let a = record("http://a.com/1", "text/html");
    let b = record("http://b.com/2", "image/png");
    let c = record("http://c.com/3", "text/html");
    fs::write(dir.path().join("crawl_data-2.deflate"), zlib(json_lines(&[c.clone()]).as_bytes())).unwrap();
    fs::write(dir.path().join("crawl_data-1.jsonl"), format!("{}\n\n", json_lines(&[a.clone(), b.clone()]))).unwrap();
    fs::write(dir.path().join(".hidden"), "garbage").unwrap();

    let repo = FilesRepository::new(dir.path());
    let records: Vec<CrawlRecord> = repo.records().unwrap().map(|r| r.unwrap()).collect();
    assert_eq!(records, vec![a, b, c]);
}

#[test]
fn records_can_be_scanned_more_than_once() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("data.jsonl"),
        json_lines(&[record("http://a.com/1", "text/html"), record("http://a.com/2", "image/gif")]),
    )
    .unwrap();
    let repo = FilesRepository::new(dir.path());

    let mut first = repo.records().unwrap();
    let second = repo.records().unwrap();
    assert_eq!(first.next().unwrap().unwrap().url, "http://a.com/1");
    assert_eq!(second.count(), 2);
    assert_eq!(urls(&repo), vec!["http://a.com/1", "http://a.com/2"]);
}

#[test]
fn malformed_line_is_reported_and_scanning_continues() {
    let dir = TempDir::new().unwrap();
    let good = serde_json::to_string(&record("http://a.com/ok", "text/html")).unwrap();
    fs::write(dir.path().join("data.jsonl"), format!("{{not json\n{good}\n")).unwrap();

    let results: Vec<_> = FilesRepository::new(dir.path()).records().unwrap().collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(results[0], Err(RepositoryError::Malformed { .. })));
    assert_eq!(results[1].as_ref().unwrap().url, "http://a.com/ok");
}

#[test]
fn missing_repository_directory_fails_to_open() {
    let dir = TempDir::new().unwrap();
    let repo = FilesRepository::new(dir.path().join("absent"));
    assert!(matches!(repo.records(), Err(RepositoryError::Open { .. })));
}

fn store(repo: &FileSystemRepository, record: &CrawlRecord, compressed: bool) {
    let path = repo.path_for(&record.url).unwrap();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    let json = serde_json::to_vec(record).unwrap();
    let bytes = if compressed { zlib(&json) } else { json };
    fs::write(path, bytes).unwrap();
}

fn filesystem_roundtrip(root: &Path, options: FileSystemOptions) {
    let repo = FileSystemRepository::new(root, options);
    let page = record("http://x.com/page.html", "text/html");
    let logo = record("http://x.com/logo.png", "image/png");
    let other = record("http://a.org/index", "text/html");
    for r in [&page, &logo, &other] {
        store(&repo, r, options.compressed);
    }

    let mut found = urls(&repo);
    found.sort();
    assert_eq!(
        found,
        vec!["http://a.org/index", "http://x.com/logo.png", "http://x.com/page.html"]
    );
    assert_eq!(repo.get("http://x.com/logo.png").unwrap(), Some(logo));
    assert_eq!(repo.get("http://x.com/unknown").unwrap(), None);
}

#[test]
fn filesystem_repository_with_encoded_names() {
    let dir = TempDir::new().unwrap();
    filesystem_roundtrip(dir.path(), FileSystemOptions::default());
    assert!(dir
        .path()
        .join("x.com")
        .join("http%3A%2F%2Fx.com%2Flogo.png")
        .is_file());
}

#[test]
fn filesystem_repository_with_hashed_compressed_files() {
    let dir = TempDir::new().unwrap();
    let options = FileSystemOptions {
        hashed_filenames: true,
        compressed: true,
    };
    filesystem_roundtrip(dir.path(), options);
    let name = FileSystemRepository::new(dir.path(), options)
        .path_for("http://x.com/logo.png")
        .unwrap();
    let file_name = name.file_name().unwrap().to_string_lossy().to_string();
    assert_eq!(file_name.len(), 64);
}

#[test]
fn open_repository_selects_layout() {
    let dir = TempDir::new().unwrap();
    fs::write(
        dir.path().join("data.jsonl"),
        json_lines(&[record("http://a.com/1", "text/html")]),
    )
    .unwrap();
    let files = open_repository(RepositoryKind::Files, dir.path(), FileSystemOptions::default());
    assert_eq!(urls(files.as_ref()), vec!["http://a.com/1"]);

    // Plain files at the root are not host directories.
    let per_host = open_repository(
        RepositoryKind::FileSystemJson,
        dir.path(),
        FileSystemOptions::default(),
    );
    assert!(urls(per_host.as_ref()).is_empty());
}

#[test]
fn filesystem_lookup_uses_form_encoded_names() {
    let dir = TempDir::new().unwrap();
    let url = "http://x.com/a b~c*d.png";
    let host_dir = dir.path().join("x.com");
    fs::create_dir_all(&host_dir).unwrap();
    let stored = record(url, "image/png");
    fs::write(
        host_dir.join("http%3A%2F%2Fx.com%2Fa+b%7Ec*d.png"),
        serde_json::to_vec(&stored).unwrap(),
    )
    .unwrap();

    let repo = FileSystemRepository::new(dir.path(), FileSystemOptions::default());
    assert_eq!(repo.get(url).unwrap(), Some(stored));
}
