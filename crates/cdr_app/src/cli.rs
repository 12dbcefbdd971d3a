//! Command-line surface of `cdr-export`.

use std::path::PathBuf;

use cdr_core::{CdrVersion, DocumentIdentity, DEFAULT_CRAWLER, DEFAULT_TEAM};
use cdr_engine::{
    ExportConfig, FileSystemOptions, IndexTarget, ObjectStoreConfig, RepositoryKind, S3Settings,
    DEFAULT_BULK_SIZE, DEFAULT_PROGRESS_EVERY,
};
use clap::{ArgAction, Parser, ValueEnum};

/// Export an ACHE crawl repository as CDR documents.
#[derive(Debug, Parser)]
#[command(name = "cdr-export", version, about, long_about = None)]
pub(crate) struct Cli {
    /// Path of the ACHE data repository.
    #[arg(long, short = 'i')]
    pub input_path: PathBuf,

    /// Layout of the repository at --input-path.
    #[arg(long, value_enum, default_value_t = RepositoryType::Files)]
    pub repository_type: RepositoryType,

    /// File names are SHA-256 hashes of the URL (filesystem-json only).
    #[arg(long)]
    pub fs_hashed: bool,

    /// Record files are zlib-compressed (filesystem-json only).
    #[arg(long)]
    pub fs_compressed: bool,

    /// CDR schema revision to produce.
    #[arg(long, value_enum, default_value_t = VersionArg::V31)]
    pub cdr_version: VersionArg,

    #[arg(long, default_value = DEFAULT_TEAM)]
    pub team: String,

    #[arg(long, default_value = DEFAULT_CRAWLER)]
    pub crawler: String,

    /// Gzip-compressed JSON lines output file.
    #[arg(long, short = 'o')]
    pub output_file: Option<PathBuf>,

    /// Elasticsearch base URL, enables bulk indexing.
    #[arg(long)]
    pub output_es_url: Option<String>,

    #[arg(long)]
    pub output_es_index: Option<String>,

    #[arg(long)]
    pub output_es_type: Option<String>,

    /// Credentials as user:password.
    #[arg(long)]
    pub output_es_auth: Option<String>,

    #[arg(long, default_value_t = DEFAULT_BULK_SIZE)]
    pub output_es_bulk_size: usize,

    #[arg(long, env = "AWS_ACCESS_KEY_ID", hide_env_values = true)]
    pub accesskey: Option<String>,

    #[arg(long, env = "AWS_SECRET_ACCESS_KEY", hide_env_values = true)]
    pub secretkey: Option<String>,

    /// S3 bucket receiving media objects.
    #[arg(long, conflicts_with = "object_store_dir")]
    pub bucket: Option<String>,

    #[arg(long, default_value = "us-east-1")]
    pub region: String,

    /// Base URL of an S3-compatible service.
    #[arg(long, requires = "bucket")]
    pub s3_endpoint: Option<String>,

    /// Store media objects in a local directory instead of S3.
    #[arg(long)]
    pub object_store_dir: Option<PathBuf>,

    /// Parent directory for the temporary media cache.
    #[arg(long)]
    pub tmp_path: Option<PathBuf>,

    /// Log progress every N exported pages.
    #[arg(long, default_value_t = DEFAULT_PROGRESS_EVERY)]
    pub progress_every: usize,

    /// Also write the log to this file.
    #[arg(long)]
    pub log_file: Option<PathBuf>,

    /// More output (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Less output (-q warnings only, -qq errors only).
    #[arg(short, long, action = ArgAction::Count)]
    pub quiet: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum RepositoryType {
    Files,
    #[value(name = "filesystem-json")]
    FilesystemJson,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum VersionArg {
    #[value(alias = "2")]
    V2,
    #[value(alias = "3")]
    V3,
    #[value(alias = "3.1")]
    V31,
}

impl From<RepositoryType> for RepositoryKind {
    fn from(value: RepositoryType) -> Self {
        match value {
            RepositoryType::Files => RepositoryKind::Files,
            RepositoryType::FilesystemJson => RepositoryKind::FileSystemJson,
        }
    }
}

impl From<VersionArg> for CdrVersion {
    fn from(value: VersionArg) -> Self {
        match value {
            VersionArg::V2 => CdrVersion::V2,
            VersionArg::V3 => CdrVersion::V3,
            VersionArg::V31 => CdrVersion::V31,
        }
    }
}

impl Cli {
    /// Verbosity offset for [`engine_logging::level_for_verbosity`].
    pub fn verbosity(&self) -> i8 {
        let up = i8::try_from(self.verbose).unwrap_or(i8::MAX);
        let down = i8::try_from(self.quiet).unwrap_or(i8::MAX);
        up.saturating_sub(down)
    }

    pub fn to_config(&self) -> ExportConfig {
        let mut config = ExportConfig::new(&self.input_path);
        config.repository = self.repository_type.into();
        config.filesystem = FileSystemOptions {
            hashed_filenames: self.fs_hashed,
            compressed: self.fs_compressed,
        };
        config.version = self.cdr_version.into();
        config.identity = DocumentIdentity {
            team: self.team.clone(),
            crawler: self.crawler.clone(),
        };
        config.output_file = self.output_file.clone();
        config.index = self.output_es_url.as_ref().map(|url| IndexTarget {
            index: self.output_es_index.clone(),
            doc_type: self.output_es_type.clone(),
            auth: self.output_es_auth.clone(),
            bulk_size: self.output_es_bulk_size,
            ..IndexTarget::new(url.clone())
        });
        config.object_store = self.object_store();
        config.tmp_path = self.tmp_path.clone();
        config.progress_every = self.progress_every;
        config
    }

    fn object_store(&self) -> Option<ObjectStoreConfig> {
        if let Some(bucket) = &self.bucket {
            let settings = S3Settings {
                access_key: self.accesskey.clone().unwrap_or_default(),
                secret_key: self.secretkey.clone().unwrap_or_default(),
                endpoint: self.s3_endpoint.clone(),
                ..S3Settings::new(bucket.clone(), self.region.clone())
            };
            return Some(ObjectStoreConfig::S3(settings));
        }
        self.object_store_dir
            .clone()
            .map(ObjectStoreConfig::Directory)
    }
}
