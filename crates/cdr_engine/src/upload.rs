use std::path::PathBuf;
use std::time::Duration;

use rusty_s3::{Bucket, Credentials, S3Action, UrlStyle};
use thiserror::Error;
use url::Url;

use crate::persist::{AtomicFileWriter, PersistError};

/// Destination for content-addressed media objects.
pub trait ObjectUploader {
    fn upload(&self, key: &str, content: &[u8]) -> Result<(), UploadError>;
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("invalid object store endpoint {0}")]
    InvalidEndpoint(String),
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("object store rejected {key}: http status {status}")]
    Status { key: String, status: u16 },
    #[error("persist error: {0}")]
    Persist(#[from] PersistError),
}

#[derive(Debug, Clone)]
pub struct S3Settings {
    pub access_key: String,
    pub secret_key: String,
    pub bucket: String,
    pub region: String,
    /// Base URL of an S3-compatible service; objects go to `<endpoint>/<bucket>/<key>`.
    pub endpoint: Option<String>,
    pub request_timeout: Duration,
}

impl S3Settings {
    pub fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            bucket: bucket.into(),
            region: region.into(),
            endpoint: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Lifetime of the presigned URL for a single upload.
const PRESIGN_TTL: Duration = Duration::from_secs(15 * 60);

/// Uploads objects with presigned `PUT` requests.
pub struct S3Uploader {
    bucket: Bucket,
    credentials: Option<Credentials>,
    client: reqwest::blocking::Client,
}

impl S3Uploader {
    /// Without an endpoint, objects go to the virtual-hosted AWS URL
    /// `https://<bucket>.s3.<region>.amazonaws.com/<key>`. Empty credentials
    /// send unsigned requests.
    pub fn new(settings: S3Settings) -> Result<Self, UploadError> {
        let (endpoint, style) = match settings.endpoint.as_deref() {
            Some(endpoint) => (endpoint.to_string(), UrlStyle::Path),
            None => (
                format!("https://s3.{}.amazonaws.com", settings.region),
                UrlStyle::VirtualHost,
            ),
        };
        let invalid = |reason: String| UploadError::InvalidEndpoint(format!("{endpoint}: {reason}"));
        let url = Url::parse(&endpoint).map_err(|err| invalid(err.to_string()))?;
        let bucket = Bucket::new(url, style, settings.bucket.clone(), settings.region.clone())
            .map_err(|err| invalid(err.to_string()))?;

        let credentials = (!settings.access_key.is_empty())
            .then(|| Credentials::new(settings.access_key.clone(), settings.secret_key.clone()));
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            bucket,
            credentials,
            client,
        })
    }
}

impl ObjectUploader for S3Uploader {
    fn upload(&self, key: &str, content: &[u8]) -> Result<(), UploadError> {
        let url = self
            .bucket
            .put_object(self.credentials.as_ref(), key.trim_start_matches('/'))
            .sign(PRESIGN_TTL);

        let response = self.client.put(url).body(content.to_vec()).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(UploadError::Status {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

/// Stores objects as files under a local directory, one file per key.
pub struct DirectoryUploader {
    writer: AtomicFileWriter,
}

impl DirectoryUploader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            writer: AtomicFileWriter::new(root.into()),
        }
    }
}

impl ObjectUploader for DirectoryUploader {
    fn upload(&self, key: &str, content: &[u8]) -> Result<(), UploadError> {
        self.writer.write(key, content)?;
        Ok(())
    }
}
