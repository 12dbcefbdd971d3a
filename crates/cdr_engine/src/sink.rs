use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use cdr_core::ExportDocument;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde_json::Value;
use thiserror::Error;

use crate::indexer::{ElasticBulkIndexer, IndexError};
use crate::persist::{ensure_output_dir, PersistError};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("cannot serialize document: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("index error: {0}")]
    Index(#[from] IndexError),
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("sink already finished")]
    Finished,
}

impl SinkError {
    /// Number of documents a failed batch lost, when the destination batches.
    pub fn lost_documents(&self) -> Option<usize> {
        match self {
            SinkError::Index(err) => err.lost_documents(),
            _ => None,
        }
    }
}

/// Destination for finished export documents.
pub trait DocumentSink {
    fn name(&self) -> &str;
    fn accept(&mut self, document: &ExportDocument) -> Result<(), SinkError>;
    /// Flushes and releases the destination; later `accept` calls fail.
    fn finish(&mut self) -> Result<(), SinkError>;
}

/// Gzip-compressed file with one JSON document per line.
pub struct GzipJsonLinesSink {
    encoder: Option<GzEncoder<BufWriter<File>>>,
    lines: usize,
}

impl GzipJsonLinesSink {
    /// Creates (or truncates) `path`, creating missing parent directories.
    pub fn create(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_output_dir(parent)?;
        }
        let file = File::create(path)?;
        Ok(Self {
            encoder: Some(GzEncoder::new(BufWriter::new(file), Compression::default())),
            lines: 0,
        })
    }

    pub fn lines(&self) -> usize {
        self.lines
    }
}

impl DocumentSink for GzipJsonLinesSink {
    fn name(&self) -> &str {
        "gzip-file"
    }

    fn accept(&mut self, document: &ExportDocument) -> Result<(), SinkError> {
        let encoder = self.encoder.as_mut().ok_or(SinkError::Finished)?;
        // Serialize fully before writing so a failure never leaves half a line.
        let line = document.to_json_line()?;
        encoder.write_all(line.as_bytes())?;
        encoder.write_all(b"\n")?;
        self.lines += 1;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(encoder) = self.encoder.take() {
            let mut inner = encoder.finish()?;
            inner.flush()?;
        }
        Ok(())
    }
}

/// Forwards documents to a bulk indexer under a fixed index and type.
pub struct BulkIndexSink {
    indexer: Option<ElasticBulkIndexer>,
    index: String,
    doc_type: String,
}

impl BulkIndexSink {
    pub fn new(indexer: ElasticBulkIndexer, index: impl Into<String>, doc_type: impl Into<String>) -> Self {
        Self {
            indexer: Some(indexer),
            index: index.into(),
            doc_type: doc_type.into(),
        }
    }
}

impl DocumentSink for BulkIndexSink {
    fn name(&self) -> &str {
        "bulk-index"
    }

    fn accept(&mut self, document: &ExportDocument) -> Result<(), SinkError> {
        let indexer = self.indexer.as_mut().ok_or(SinkError::Finished)?;
        let mut body = serde_json::to_value(document)?;
        // The id travels in the action line; `_id` is reserved inside the source.
        if let Value::Object(map) = &mut body {
            map.remove("_id");
        }
        indexer.add_document(&self.index, &self.doc_type, &body, document.id())?;
        Ok(())
    }

    fn finish(&mut self) -> Result<(), SinkError> {
        if let Some(indexer) = self.indexer.take() {
            indexer.close()?;
        }
        Ok(())
    }
}
