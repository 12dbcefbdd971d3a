use std::fmt::Write as _;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use reqwest::header::CONTENT_TYPE;
use serde_json::{json, Value};
use thiserror::Error;

pub const DEFAULT_BULK_SIZE: usize = 25;

#[derive(Debug, Error)]
pub enum IndexError {
    #[error("invalid credentials, expected user:password")]
    InvalidAuth,
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("bulk request for {lost} documents failed: {source}")]
    Request { lost: usize, source: reqwest::Error },
    #[error("bulk request for {lost} documents failed with http status {status}: {body}")]
    Status {
        status: u16,
        body: String,
        lost: usize,
    },
    #[error("bulk request reported {failed} failed item(s) out of {total}")]
    ItemFailures { failed: usize, total: usize },
    #[error("cannot encode bulk payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl IndexError {
    /// Documents of a sent batch that were not indexed.
    pub fn lost_documents(&self) -> Option<usize> {
        match self {
            IndexError::Request { lost, .. } | IndexError::Status { lost, .. } => Some(*lost),
            IndexError::ItemFailures { failed, total } => Some((*failed).min(*total)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BasicAuth {
    pub user: String,
    pub password: String,
}

impl BasicAuth {
    /// Parses `user:password`; the password may itself contain `:`.
    pub fn parse(raw: &str) -> Result<Self, IndexError> {
        match raw.split_once(':') {
            Some((user, password)) if !user.is_empty() => Ok(Self {
                user: user.to_string(),
                password: password.to_string(),
            }),
            _ => Err(IndexError::InvalidAuth),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BulkIndexSettings {
    pub endpoint: String,
    pub auth: Option<BasicAuth>,
    pub bulk_size: usize,
    pub request_timeout: Duration,
}

impl BulkIndexSettings {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            auth: None,
            bulk_size: DEFAULT_BULK_SIZE,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// Buffers documents and sends them to the search engine's `_bulk` API.
pub struct ElasticBulkIndexer {
    client: reqwest::blocking::Client,
    bulk_url: String,
    auth: Option<BasicAuth>,
    bulk_size: usize,
    payload: String,
    pending: usize,
    indexed: usize,
}

impl ElasticBulkIndexer {
    pub fn new(settings: BulkIndexSettings) -> Result<Self, IndexError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.request_timeout)
            .build()?;
        Ok(Self {
            client,
            bulk_url: format!("{}/_bulk", settings.endpoint.trim_end_matches('/')),
            auth: settings.auth,
            bulk_size: settings.bulk_size.max(1),
            payload: String::new(),
            pending: 0,
            indexed: 0,
        })
    }

    /// Queues one document, sending the batch once `bulk_size` are pending.
    pub fn add_document(
        &mut self,
        index: &str,
        doc_type: &str,
        document: &Value,
        id: &str,
    ) -> Result<(), IndexError> {
        let action = json!({ "index": { "_index": index, "_type": doc_type, "_id": id } });
        let body = serde_json::to_string(document)?;
        let _ = writeln!(self.payload, "{action}");
        let _ = writeln!(self.payload, "{body}");
        self.pending += 1;
        if self.pending >= self.bulk_size {
            self.flush()?;
        }
        Ok(())
    }

    /// Sends whatever is pending. The buffer is cleared even when the request fails.
    pub fn flush(&mut self) -> Result<(), IndexError> {
        if self.pending == 0 {
            return Ok(());
        }
        let payload = std::mem::take(&mut self.payload);
        let total = std::mem::take(&mut self.pending);

        let mut request = self
            .client
            .post(&self.bulk_url)
            .header(CONTENT_TYPE, "application/x-ndjson")
            .body(payload);
        if let Some(auth) = &self.auth {
            request = request.basic_auth(&auth.user, Some(&auth.password));
        }
        let lost = |source| IndexError::Request { lost: total, source };
        let response = request.send().map_err(lost)?;
        let status = response.status();
        let body = response.text().map_err(lost)?;
        if !status.is_success() {
            return Err(IndexError::Status {
                status: status.as_u16(),
                body,
                lost: total,
            });
        }

        let failed = count_failed_items(&body);
        if failed > 0 {
            engine_warn!("Bulk request: {} of {} documents rejected", failed, total);
            self.indexed += total - failed.min(total);
            return Err(IndexError::ItemFailures { failed, total });
        }
        self.indexed += total;
        engine_debug!("Bulk request indexed {} documents", total);
        Ok(())
    }

    pub fn indexed(&self) -> usize {
        self.indexed
    }

    /// Flushes pending work and returns the number of documents indexed.
    pub fn close(mut self) -> Result<usize, IndexError> {
        self.flush()?;
        Ok(self.indexed)
    }
}

fn count_failed_items(body: &str) -> usize {
    let Ok(parsed) = serde_json::from_str::<Value>(body) else {
        return 0;
    };
    if parsed.get("errors").and_then(Value::as_bool) != Some(true) {
        return 0;
    }
    parsed
        .get("items")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item.as_object()
                        .and_then(|obj| obj.values().next())
                        .and_then(|result| result.get("error"))
                        .is_some()
                })
                .count()
        })
        .filter(|count| *count > 0)
        .unwrap_or(1)
}
