use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::media::MediaObject;
use crate::record::ResponseHeaders;

pub const CDR2_VERSION: &str = "2.0";

/// CDR schema revision selected for a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CdrVersion {
    V2,
    V3,
    #[default]
    V31,
}

impl CdrVersion {
    /// Only 3.1 documents embed media objects.
    pub fn supports_media(self) -> bool {
        matches!(self, CdrVersion::V31)
    }

    pub fn label(self) -> &'static str {
        match self {
            CdrVersion::V2 => "2.0",
            CdrVersion::V3 => "3.0",
            CdrVersion::V31 => "3.1",
        }
    }
}

impl fmt::Display for CdrVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CDR {}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown CDR version {0:?} (expected v2, v3 or v31)")]
pub struct UnknownVersion(pub String);

impl FromStr for CdrVersion {
    type Err = UnknownVersion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase();
        let normalized = normalized
            .strip_prefix("cdr")
            .unwrap_or(&normalized)
            .trim_start_matches('v')
            .to_string();
        match normalized.as_str() {
            "2" | "2.0" => Ok(CdrVersion::V2),
            "3" | "3.0" => Ok(CdrVersion::V3),
            "31" | "3.1" => Ok(CdrVersion::V31),
            _ => Err(UnknownVersion(s.to_string())),
        }
    }
}

/// Stable document id: upper-case hex SHA-256 of the URL.
pub fn document_id(url: &str) -> String {
    hex::encode_upper(Sha256::digest(url.as_bytes()))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlData {
    pub response_headers: ResponseHeaders,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cdr2Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    /// Fetch time in epoch milliseconds.
    pub timestamp: i64,
    pub team: String,
    pub crawler: String,
    pub raw_content: String,
    pub content_type: String,
    pub crawl_data: CrawlData,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cdr3Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    pub timestamp_crawl: DateTime<Utc>,
    pub timestamp_index: DateTime<Utc>,
    pub team: String,
    pub crawler: String,
    pub raw_content: String,
    pub content_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cdr31Document {
    #[serde(rename = "_id")]
    pub id: String,
    pub url: String,
    pub timestamp_crawl: DateTime<Utc>,
    pub timestamp_index: DateTime<Utc>,
    pub team: String,
    pub crawler: String,
    pub raw_content: String,
    pub content_type: String,
    pub response_headers: ResponseHeaders,
    pub objects: Vec<MediaObject>,
}

/// A finished export document of any supported schema revision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ExportDocument {
    V2(Cdr2Document),
    V3(Cdr3Document),
    V31(Cdr31Document),
}

impl ExportDocument {
    pub fn id(&self) -> &str {
        match self {
            ExportDocument::V2(doc) => &doc.id,
            ExportDocument::V3(doc) => &doc.id,
            ExportDocument::V31(doc) => &doc.id,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ExportDocument::V2(doc) => &doc.url,
            ExportDocument::V3(doc) => &doc.url,
            ExportDocument::V31(doc) => &doc.url,
        }
    }

    pub fn version(&self) -> CdrVersion {
        match self {
            ExportDocument::V2(_) => CdrVersion::V2,
            ExportDocument::V3(_) => CdrVersion::V3,
            ExportDocument::V31(_) => CdrVersion::V31,
        }
    }

    /// Single-line JSON, as written to newline-delimited output.
    pub fn to_json_line(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}
