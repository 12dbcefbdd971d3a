use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::record::{CrawlRecord, ResponseHeaders};

/// An uploaded image, as embedded in CDR 3.1 `objects`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaObject {
    pub content_type: String,
    pub timestamp_crawl: DateTime<Utc>,
    #[serde(rename = "obj_original_url")]
    pub original_url: String,
    #[serde(rename = "obj_stored_url")]
    pub stored_url: String,
    pub response_headers: ResponseHeaders,
}

impl MediaObject {
    pub fn from_record(record: &CrawlRecord, stored_url: impl Into<String>) -> Self {
        Self {
            content_type: record.content_type().unwrap_or_default().to_string(),
            timestamp_crawl: record.fetched_at(),
            original_url: record.url.clone(),
            stored_url: stored_url.into(),
            response_headers: record.response_headers.clone(),
        }
    }
}

/// Read side of the media cache, keyed by original media URL.
pub trait MediaLookup {
    fn lookup(&self, original_url: &str) -> Option<MediaObject>;
}

impl MediaLookup for HashMap<String, MediaObject> {
    fn lookup(&self, original_url: &str) -> Option<MediaObject> {
        self.get(original_url).cloned()
    }
}
