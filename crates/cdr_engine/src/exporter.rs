//! The two-pass export run.
//!
//! Pass one uploads every image record and fills the [`MediaCache`]; pass two
//! assembles documents for every HTML record, resolving embedded images
//! through the now-complete cache. The passes never interleave.

use cdr_core::{
    assembler_for, classify, normalize_url, storage_key, Assembler, AssemblyContext, CdrVersion,
    CrawlRecord, DocumentIdentity, MediaObject, RecordClass,
};
use chrono::Utc;
use engine_logging::{engine_debug, engine_error, engine_info, engine_warn};
use thiserror::Error;

use crate::cache::{CacheError, MediaCache};
use crate::repository::{CrawlRepository, RepositoryError};
use crate::sink::{DocumentSink, SinkError};
use crate::types::{ExportSummary, PassStats, RecordOutcome, SkipReason};
use crate::upload::ObjectUploader;

pub const DEFAULT_PROGRESS_EVERY: usize = 100;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("repository error: {0}")]
    Repository(#[from] RepositoryError),
    #[error("media cache error: {0}")]
    Cache(#[from] CacheError),
    #[error("failed to finish {sink}: {source}")]
    Sink { sink: String, source: SinkError },
}

#[derive(Debug, Clone)]
pub struct ExporterSettings {
    pub version: CdrVersion,
    pub identity: DocumentIdentity,
    /// Log progress after this many emitted documents.
    pub progress_every: usize,
}

impl Default for ExporterSettings {
    fn default() -> Self {
        Self {
            version: CdrVersion::default(),
            identity: DocumentIdentity::default(),
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }
}

pub struct Exporter {
    settings: ExporterSettings,
    cache: MediaCache,
    uploader: Option<Box<dyn ObjectUploader>>,
    sinks: Vec<Box<dyn DocumentSink>>,
    /// Previously accepted documents that a failed sink batch took down.
    dropped_by_sinks: usize,
}

impl Exporter {
    pub fn new(
        settings: ExporterSettings,
        cache: MediaCache,
        uploader: Option<Box<dyn ObjectUploader>>,
        sinks: Vec<Box<dyn DocumentSink>>,
    ) -> Self {
        Self {
            settings,
            cache,
            uploader,
            sinks,
            dropped_by_sinks: 0,
        }
    }

    pub fn cache(&self) -> &MediaCache {
        &self.cache
    }

    /// Hands back the cache so the caller can close it.
    pub fn into_cache(self) -> MediaCache {
        self.cache
    }

    /// Runs the media pass (3.1 only), then the document pass, then finishes every sink.
    pub fn run(&mut self, repository: &dyn CrawlRepository) -> Result<ExportSummary, ExportError> {
        let media = if self.settings.version.supports_media() {
            self.run_media_pass(repository.records()?)
        } else {
            PassStats::default()
        };
        let mut documents = self.run_document_pass(repository.records()?);
        documents.record_dropped(self.finish_sinks()?);
        Ok(ExportSummary { media, documents })
    }

    pub fn run_media_pass<I>(&mut self, records: I) -> PassStats
    where
        I: IntoIterator<Item = Result<CrawlRecord, RepositoryError>>,
    {
        let mut stats = PassStats::default();
        for next in records {
            let record = match next {
                Ok(record) => record,
                Err(err) => {
                    engine_error!("Failed to read record: {}", err);
                    stats.record_unreadable();
                    continue;
                }
            };
            let outcome = self.process_media_record(&record);
            if let RecordOutcome::Failed(reason) = &outcome {
                engine_error!("Failed to upload media {}: {}", record.url, reason);
            }
            stats.record(&outcome);
        }
        engine_info!("Media pass finished: {} ({} cached)", stats, self.cache.len());
        stats
    }

    /// Uploads one image record and caches its media object.
    pub fn process_media_record(&mut self, record: &CrawlRecord) -> RecordOutcome {
        match classify(record) {
            RecordClass::Image => {}
            RecordClass::MissingContentType => {
                engine_warn!("Ignoring URL with no content-type: {}", record.url);
                return RecordOutcome::Skipped(SkipReason::MissingContentType);
            }
            RecordClass::Html | RecordClass::Other(_) => {
                return RecordOutcome::Skipped(SkipReason::UnsupportedContentType {
                    content_type: record.content_type().unwrap_or_default().to_string(),
                });
            }
        }
        if !self.settings.version.supports_media() {
            return RecordOutcome::Skipped(SkipReason::MediaNotSupported {
                version: self.settings.version,
            });
        }

        let key = match storage_key(&record.content, &record.url) {
            Ok(Some(key)) => key,
            Ok(None) => {
                engine_warn!("Ignoring media URL without host: {}", record.url);
                return RecordOutcome::Skipped(SkipReason::MissingHost);
            }
            Err(err) => return RecordOutcome::Failed(err.to_string()),
        };

        let Some(uploader) = self.uploader.as_ref() else {
            return RecordOutcome::Failed("no object store configured".to_string());
        };
        if let Err(err) = uploader.upload(&key, &record.content) {
            return RecordOutcome::Failed(err.to_string());
        }
        engine_info!("Uploaded object: {}", key);

        let object = MediaObject::from_record(record, key);
        // Keyed the way page references are resolved, so both spellings meet.
        match self.cache.put(&normalize_url(&record.url), &object) {
            Ok(()) => RecordOutcome::Emitted,
            Err(err) => RecordOutcome::Failed(err.to_string()),
        }
    }

    pub fn run_document_pass<I>(&mut self, records: I) -> PassStats
    where
        I: IntoIterator<Item = Result<CrawlRecord, RepositoryError>>,
    {
        let assembler = assembler_for(self.settings.version);
        let progress_every = self.settings.progress_every.max(1);
        let mut stats = PassStats::default();
        for next in records {
            let record = match next {
                Ok(record) => record,
                Err(err) => {
                    engine_error!("Failed to read record: {}", err);
                    stats.record_unreadable();
                    continue;
                }
            };
            let outcome = self.process_document_record(&record, assembler);
            if let RecordOutcome::Failed(reason) = &outcome {
                engine_error!("Failed to process record {}: {}", record.url, reason);
            }
            stats.record(&outcome);
            let dropped = std::mem::take(&mut self.dropped_by_sinks);
            if dropped > 0 {
                engine_error!("{} earlier documents were not delivered", dropped);
                stats.record_dropped(dropped);
            }
            if outcome == RecordOutcome::Emitted && stats.emitted % progress_every == 0 {
                engine_info!("Processed {} pages", stats.emitted);
            }
        }
        engine_info!("Processed {} pages", stats.emitted);
        engine_info!("Document pass finished: {}", stats);
        stats
    }

    /// Builds one document and hands it to every sink.
    pub fn process_document_record(
        &mut self,
        record: &CrawlRecord,
        assembler: Assembler,
    ) -> RecordOutcome {
        match classify(record) {
            RecordClass::Html => {}
            RecordClass::MissingContentType => {
                engine_warn!("Ignoring URL with no content-type: {}", record.url);
                return RecordOutcome::Skipped(SkipReason::MissingContentType);
            }
            RecordClass::Image | RecordClass::Other(_) => {
                engine_debug!("Skipping non-HTML record {}", record.url);
                return RecordOutcome::Skipped(SkipReason::UnsupportedContentType {
                    content_type: record.content_type().unwrap_or_default().to_string(),
                });
            }
        }

        let ctx = AssemblyContext {
            identity: &self.settings.identity,
            media: &self.cache,
            indexed_at: Utc::now(),
        };
        let document = match assembler(record, &ctx) {
            Ok(document) => document,
            Err(err) => return RecordOutcome::Failed(err.to_string()),
        };

        let mut failures = Vec::new();
        let mut dropped_earlier = 0;
        for sink in self.sinks.iter_mut() {
            if let Err(err) = sink.accept(&document) {
                // A failed batch loses this document plus the ones queued before it.
                if let Some(lost) = err.lost_documents() {
                    dropped_earlier = dropped_earlier.max(lost.saturating_sub(1));
                }
                failures.push(format!("{}: {}", sink.name(), err));
            }
        }
        self.dropped_by_sinks += dropped_earlier;
        if failures.is_empty() {
            RecordOutcome::Emitted
        } else {
            RecordOutcome::Failed(failures.join("; "))
        }
    }

    /// Finishes every sink and returns how many accepted documents a final
    /// batch failed to deliver.
    ///
    /// Lost batches are logged and counted; any other failure is reported
    /// after every sink has been tried.
    pub fn finish_sinks(&mut self) -> Result<usize, ExportError> {
        let mut first_error = None;
        let mut dropped = 0;
        for sink in self.sinks.iter_mut() {
            if let Err(source) = sink.finish() {
                engine_error!("Failed to finish {}: {}", sink.name(), source);
                if let Some(lost) = source.lost_documents() {
                    dropped = dropped.max(lost);
                } else if first_error.is_none() {
                    first_error = Some(ExportError::Sink {
                        sink: sink.name().to_string(),
                        source,
                    });
                }
            }
        }
        match first_error {
            Some(err) => Err(err),
            None => Ok(dropped),
        }
    }
}
