//! Readers for the two on-disk crawl repository layouts.
//!
//! Every call to [`CrawlRepository::records`] starts a fresh scan, so the media
//! pass and the document pass each see the whole repository from the start.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use cdr_core::CrawlRecord;
use flate2::read::ZlibDecoder;
use sha2::{Digest, Sha256};
use thiserror::Error;
use url::Url;

const DEFLATE_EXTENSION: &str = "deflate";

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("cannot open repository at {path:?}: {source}")]
    Open { path: PathBuf, source: io::Error },
    #[error("failed to read {path:?}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("malformed record in {path:?}: {source}")]
    Malformed {
        path: PathBuf,
        source: serde_json::Error,
    },
}

pub type RecordIter = Box<dyn Iterator<Item = Result<CrawlRecord, RepositoryError>>>;

/// A restartable source of crawl records.
pub trait CrawlRepository {
    fn records(&self) -> Result<RecordIter, RepositoryError>;
}

/// Supported repository layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RepositoryKind {
    /// Data files of newline-delimited JSON records.
    #[default]
    Files,
    /// One JSON file per record, grouped in per-host directories.
    FileSystemJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileSystemOptions {
    pub hashed_filenames: bool,
    pub compressed: bool,
}

pub fn open_repository(
    kind: RepositoryKind,
    root: &Path,
    options: FileSystemOptions,
) -> Box<dyn CrawlRepository> {
    match kind {
        RepositoryKind::Files => Box::new(FilesRepository::new(root)),
        RepositoryKind::FileSystemJson => Box::new(FileSystemRepository::new(root, options)),
    }
}

fn sorted_entries(dir: &Path, want_dirs: bool) -> Result<Vec<PathBuf>, RepositoryError> {
    let read = fs::read_dir(dir).map_err(|source| RepositoryError::Open {
        path: dir.to_path_buf(),
        source,
    })?;
    let mut entries: Vec<PathBuf> = read
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|ft| ft.is_dir() == want_dirs).unwrap_or(false))
        .filter(|e| !e.file_name().to_string_lossy().starts_with('.'))
        .map(|e| e.path())
        .collect();
    entries.sort();
    Ok(entries)
}

/// Directory of data files, each holding newline-delimited JSON records.
/// Files with a `.deflate` extension are zlib-compressed.
#[derive(Debug, Clone)]
pub struct FilesRepository {
    root: PathBuf,
}

impl FilesRepository {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl CrawlRepository for FilesRepository {
    fn records(&self) -> Result<RecordIter, RepositoryError> {
        let files = sorted_entries(&self.root, false)?;
        Ok(Box::new(FilesIter {
            pending: files.into(),
            current: None,
        }))
    }
}

struct OpenDataFile {
    path: PathBuf,
    lines: io::Lines<Box<dyn BufRead>>,
}

struct FilesIter {
    pending: VecDeque<PathBuf>,
    current: Option<OpenDataFile>,
}

fn open_data_file(path: PathBuf) -> Result<OpenDataFile, RepositoryError> {
    let file = File::open(&path).map_err(|source| RepositoryError::Read {
        path: path.clone(),
        source,
    })?;
    let compressed = path.extension().and_then(|ext| ext.to_str()) == Some(DEFLATE_EXTENSION);
    let reader: Box<dyn BufRead> = if compressed {
        Box::new(BufReader::new(ZlibDecoder::new(file)))
    } else {
        Box::new(BufReader::new(file))
    };
    Ok(OpenDataFile {
        path,
        lines: reader.lines(),
    })
}

impl Iterator for FilesIter {
    type Item = Result<CrawlRecord, RepositoryError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(current) = self.current.as_mut() {
                match current.lines.next() {
                    Some(Ok(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        return Some(serde_json::from_str(&line).map_err(|source| {
                            RepositoryError::Malformed {
                                path: current.path.clone(),
                                source,
                            }
                        }));
                    }
                    Some(Err(source)) => {
                        // A broken stream cannot be resynchronised; move to the next file.
                        let path = current.path.clone();
                        self.current = None;
                        return Some(Err(RepositoryError::Read { path, source }));
                    }
                    None => self.current = None,
                }
            }

            let path = self.pending.pop_front()?;
            match open_data_file(path) {
                Ok(opened) => self.current = Some(opened),
                Err(err) => return Some(Err(err)),
            }
        }
    }
}

/// One record per file at `<root>/<host>/<name>`.
///
/// `<name>` is the URL-encoded URL, or the SHA-256 hex of the URL when
/// filenames are hashed. File contents are zlib-compressed when configured.
#[derive(Debug, Clone)]
pub struct FileSystemRepository {
    root: PathBuf,
    options: FileSystemOptions,
}

impl FileSystemRepository {
    pub fn new(root: impl Into<PathBuf>, options: FileSystemOptions) -> Self {
        Self {
            root: root.into(),
            options,
        }
    }

    /// Location of the record for `url`, or `None` when the url has no host.
    pub fn path_for(&self, url: &str) -> Option<PathBuf> {
        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str().filter(|h| !h.is_empty())?;
        let name = if self.options.hashed_filenames {
            hex::encode(Sha256::digest(url.as_bytes()))
        } else {
            form_encode(url)
        };
        Some(self.root.join(host).join(name))
    }

    /// Reads the record stored for `url`, if any.
    pub fn get(&self, url: &str) -> Result<Option<CrawlRecord>, RepositoryError> {
        match self.path_for(url) {
            Some(path) if path.is_file() => read_record_file(&path, self.options.compressed).map(Some),
            _ => Ok(None),
        }
    }

    fn record_paths(&self) -> Result<Vec<PathBuf>, RepositoryError> {
        let mut paths = Vec::new();
        for host_dir in sorted_entries(&self.root, true)? {
            paths.extend(sorted_entries(&host_dir, false)?);
        }
        Ok(paths)
    }
}

/// `application/x-www-form-urlencoded` spelling used by the crawler for file names:
/// space becomes `+`, `*` stays literal, `~` is escaped.
fn form_encode(raw: &str) -> String {
    urlencoding::encode(raw)
        .replace("%20", "+")
        .replace("%2A", "*")
        .replace('~', "%7E")
}

fn read_record_file(path: &Path, compressed: bool) -> Result<CrawlRecord, RepositoryError> {
    let read_err = |source| RepositoryError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_err)?;
    let mut raw = Vec::new();
    if compressed {
        ZlibDecoder::new(file).read_to_end(&mut raw).map_err(read_err)?;
    } else {
        BufReader::new(file).read_to_end(&mut raw).map_err(read_err)?;
    }
    serde_json::from_slice(&raw).map_err(|source| RepositoryError::Malformed {
        path: path.to_path_buf(),
        source,
    })
}

impl CrawlRepository for FileSystemRepository {
    fn records(&self) -> Result<RecordIter, RepositoryError> {
        let compressed = self.options.compressed;
        let paths = self.record_paths()?;
        Ok(Box::new(
            paths
                .into_iter()
                .map(move |path| read_record_file(&path, compressed)),
        ))
    }
}

/// Records held in memory; handy for tests and small fixtures.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    records: Vec<CrawlRecord>,
}

impl InMemoryRepository {
    pub fn new(records: Vec<CrawlRecord>) -> Self {
        Self { records }
    }
}

impl CrawlRepository for InMemoryRepository {
    fn records(&self) -> Result<RecordIter, RepositoryError> {
        Ok(Box::new(self.records.clone().into_iter().map(Ok)))
    }
}
