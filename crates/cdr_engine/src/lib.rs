//! CDR engine: media cache, crawl repositories, uploaders, sinks, and the export run.
mod cache;
mod config;
mod exporter;
mod indexer;
mod persist;
mod repository;
mod sink;
mod types;
mod upload;

pub use cache::{CacheError, MediaCache};
pub use config::{
    run_export, ConfigError, ExportConfig, IndexTarget, ObjectStoreConfig, SetupError,
};
pub use exporter::{ExportError, Exporter, ExporterSettings, DEFAULT_PROGRESS_EVERY};
pub use indexer::{
    BasicAuth, BulkIndexSettings, ElasticBulkIndexer, IndexError, DEFAULT_BULK_SIZE,
};
pub use persist::{ensure_output_dir, AtomicFileWriter, PersistError};
pub use repository::{
    open_repository, CrawlRepository, FileSystemOptions, FileSystemRepository, FilesRepository,
    InMemoryRepository, RecordIter, RepositoryError, RepositoryKind,
};
pub use sink::{BulkIndexSink, DocumentSink, GzipJsonLinesSink, SinkError};
pub use types::{ExportSummary, PassStats, RecordOutcome, SkipReason};
pub use upload::{DirectoryUploader, ObjectUploader, S3Settings, S3Uploader, UploadError};
