use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::decode::decode_text;

/// Response headers of a crawled resource, one joined value per header name.
pub type ResponseHeaders = BTreeMap<String, String>;

/// One crawled resource as stored by the crawl repository.
///
/// Records are read-only input: nothing in the exporter mutates them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlRecord {
    pub url: String,
    #[serde(alias = "fetchTime", default)]
    pub fetch_time: i64,
    #[serde(alias = "contentType", default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(with = "base64_bytes", default)]
    pub content: Vec<u8>,
    #[serde(
        alias = "responseHeaders",
        default,
        deserialize_with = "deserialize_headers"
    )]
    pub response_headers: ResponseHeaders,
}

impl CrawlRecord {
    pub fn new(url: impl Into<String>, content_type: Option<&str>, content: impl Into<Vec<u8>>) -> Self {
        Self {
            url: url.into(),
            fetch_time: 0,
            content_type: content_type.map(ToOwned::to_owned),
            content: content.into(),
            response_headers: ResponseHeaders::new(),
        }
    }

    pub fn with_fetch_time(mut self, epoch_millis: i64) -> Self {
        self.fetch_time = epoch_millis;
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.response_headers.insert(name.into(), value.into());
        self
    }

    /// Content type, or `None` when absent or blank.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type
            .as_deref()
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.fetch_time).unwrap_or_default()
    }

    /// Text view of the content, decoded with the charset the record declares.
    pub fn content_as_text(&self) -> String {
        decode_text(&self.content, self.content_type()).text
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HeaderValue {
    One(String),
    Many(Vec<String>),
}

impl HeaderValue {
    fn joined(self) -> String {
        match self {
            HeaderValue::One(value) => value,
            HeaderValue::Many(values) => values.join(", "),
        }
    }
}

fn deserialize_headers<'de, D>(deserializer: D) -> Result<ResponseHeaders, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, HeaderValue>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(name, value)| (name, value.joined()))
        .collect())
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        match raw {
            None => Ok(Vec::new()),
            Some(text) => STANDARD
                .decode(text.trim().as_bytes())
                .map_err(serde::de::Error::custom),
        }
    }
}
