//! Content addressing for uploaded media.
//!
//! A storage key is the source host reversed into a path (`foo.bar.com` becomes
//! `com/bar/foo`) followed by the lower-case SHA-256 of the object bytes.

use sha2::{Digest, Sha256};
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid url {url}: {source}")]
    InvalidUrl { url: String, source: url::ParseError },
}

/// Reverses the dot-separated labels of `host` and joins them with `/`.
///
/// Returns `None` when the host has no labels.
pub fn reverse_domain(host: &str) -> Option<String> {
    let mut labels: Vec<&str> = host.split('.').collect();
    while labels.last().is_some_and(|label| label.is_empty()) {
        labels.pop();
    }
    if labels.is_empty() {
        return None;
    }
    labels.reverse();
    Some(labels.join("/"))
}

pub fn content_digest(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Storage key for `content` fetched from `url`, or `None` when the url has no host.
pub fn storage_key(content: &[u8], url: &str) -> Result<Option<String>, AddressError> {
    let parsed = Url::parse(url).map_err(|source| AddressError::InvalidUrl {
        url: url.to_string(),
        source,
    })?;
    let host = parsed.host_str().unwrap_or_default();
    Ok(reverse_domain(host).map(|prefix| format!("{prefix}/{}", content_digest(content))))
}
