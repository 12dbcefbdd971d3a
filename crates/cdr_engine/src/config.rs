use std::path::PathBuf;

use cdr_core::{CdrVersion, DocumentIdentity};
use engine_logging::{engine_info, engine_warn};
use thiserror::Error;

use crate::cache::MediaCache;
use crate::exporter::{ExportError, Exporter, ExporterSettings, DEFAULT_PROGRESS_EVERY};
use crate::indexer::{BasicAuth, BulkIndexSettings, ElasticBulkIndexer, IndexError, DEFAULT_BULK_SIZE};
use crate::repository::{open_repository, CrawlRepository, FileSystemOptions, RepositoryKind};
use crate::sink::{BulkIndexSink, DocumentSink, GzipJsonLinesSink, SinkError};
use crate::types::ExportSummary;
use crate::upload::{DirectoryUploader, ObjectUploader, S3Settings, S3Uploader, UploadError};

/// Problems detected before any record is read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("Argument for Elasticsearch index can't be empty")]
    MissingIndexName,
    #[error("Argument for Elasticsearch type can't be empty")]
    MissingIndexType,
    #[error("Elasticsearch credentials must be given as user:password")]
    InvalidAuth,
    #[error("bulk size must be at least 1")]
    InvalidBulkSize,
    #[error("progress interval must be at least 1")]
    InvalidProgressInterval,
    #[error("{0} needs an object store: set a bucket or an object store directory")]
    MissingObjectStore(CdrVersion),
}

/// Errors that stop a run before or during setup.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot open output file: {0}")]
    Output(#[from] SinkError),
    #[error("cannot create indexer client: {0}")]
    Index(#[from] IndexError),
    #[error("cannot create object store client: {0}")]
    Upload(#[from] UploadError),
    #[error(transparent)]
    Export(#[from] ExportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexTarget {
    pub endpoint: String,
    pub index: Option<String>,
    pub doc_type: Option<String>,
    /// `user:password`
    pub auth: Option<String>,
    pub bulk_size: usize,
}

#[derive(Debug, Clone)]
pub enum ObjectStoreConfig {
    S3(S3Settings),
    Directory(PathBuf),
}

/// Fully resolved settings for one export run.
#[derive(Debug, Clone)]
pub struct ExportConfig {
    pub input_path: PathBuf,
    pub repository: RepositoryKind,
    pub filesystem: FileSystemOptions,
    pub version: CdrVersion,
    pub identity: DocumentIdentity,
    pub output_file: Option<PathBuf>,
    pub index: Option<IndexTarget>,
    pub object_store: Option<ObjectStoreConfig>,
    pub tmp_path: Option<PathBuf>,
    pub progress_every: usize,
}

impl ExportConfig {
    pub fn new(input_path: impl Into<PathBuf>) -> Self {
        Self {
            input_path: input_path.into(),
            repository: RepositoryKind::default(),
            filesystem: FileSystemOptions::default(),
            version: CdrVersion::default(),
            identity: DocumentIdentity::default(),
            output_file: None,
            index: None,
            object_store: None,
            tmp_path: None,
            progress_every: DEFAULT_PROGRESS_EVERY,
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(target) = &self.index {
            if target.index.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingIndexName);
            }
            if target.doc_type.as_deref().is_none_or(str::is_empty) {
                return Err(ConfigError::MissingIndexType);
            }
            if let Some(raw) = &target.auth {
                BasicAuth::parse(raw).map_err(|_| ConfigError::InvalidAuth)?;
            }
            if target.bulk_size == 0 {
                return Err(ConfigError::InvalidBulkSize);
            }
        }
        if self.progress_every == 0 {
            return Err(ConfigError::InvalidProgressInterval);
        }
        if self.version.supports_media() && self.object_store.is_none() {
            return Err(ConfigError::MissingObjectStore(self.version));
        }
        Ok(())
    }

    pub fn open_repository(&self) -> Box<dyn CrawlRepository> {
        open_repository(self.repository, &self.input_path, self.filesystem)
    }

    pub fn build_uploader(&self) -> Result<Option<Box<dyn ObjectUploader>>, SetupError> {
        if !self.version.supports_media() {
            return Ok(None);
        }
        let uploader: Box<dyn ObjectUploader> = match &self.object_store {
            Some(ObjectStoreConfig::S3(settings)) => Box::new(S3Uploader::new(settings.clone())?),
            Some(ObjectStoreConfig::Directory(root)) => Box::new(DirectoryUploader::new(root.clone())),
            None => return Err(ConfigError::MissingObjectStore(self.version).into()),
        };
        Ok(Some(uploader))
    }

    pub fn build_sinks(&self) -> Result<Vec<Box<dyn DocumentSink>>, SetupError> {
        let mut sinks: Vec<Box<dyn DocumentSink>> = Vec::new();
        if let Some(path) = &self.output_file {
            sinks.push(Box::new(GzipJsonLinesSink::create(path)?));
        }
        if let Some(target) = &self.index {
            let index = target.index.clone().ok_or(ConfigError::MissingIndexName)?;
            let doc_type = target.doc_type.clone().ok_or(ConfigError::MissingIndexType)?;
            let auth = match &target.auth {
                Some(raw) => Some(BasicAuth::parse(raw).map_err(|_| ConfigError::InvalidAuth)?),
                None => None,
            };
            let settings = BulkIndexSettings {
                auth,
                bulk_size: target.bulk_size,
                ..BulkIndexSettings::new(target.endpoint.clone())
            };
            sinks.push(Box::new(BulkIndexSink::new(
                ElasticBulkIndexer::new(settings)?,
                index,
                doc_type,
            )));
        }
        if sinks.is_empty() {
            engine_warn!("No output file or index configured; documents will only be counted");
        }
        Ok(sinks)
    }
}

impl IndexTarget {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            index: None,
            doc_type: None,
            auth: None,
            bulk_size: DEFAULT_BULK_SIZE,
        }
    }
}

/// Validates `config`, sets up every resource, and runs both passes.
///
/// Setup failures abort before any record is processed; the media cache
/// directory is removed when the run ends.
pub fn run_export(config: &ExportConfig) -> Result<ExportSummary, SetupError> {
    config.validate()?;

    let cache = MediaCache::open_temporary(config.tmp_path.as_deref()).map_err(ExportError::from)?;
    engine_info!("Media cache at {:?}", cache.path());
    let uploader = config.build_uploader()?;
    let sinks = config.build_sinks()?;
    let repository = config.open_repository();

    let settings = ExporterSettings {
        version: config.version,
        identity: config.identity.clone(),
        progress_every: config.progress_every,
    };
    let mut exporter = Exporter::new(settings, cache, uploader, sinks);
    let result = exporter.run(repository.as_ref());

    if let Err(err) = exporter.into_cache().close() {
        engine_warn!("Failed to remove media cache: {}", err);
    }
    Ok(result?)
}
