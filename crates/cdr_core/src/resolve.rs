use std::collections::BTreeSet;

use scraper::{Html, Selector};
use url::Url;

/// Absolute URLs of every `<img src>` in `html`, deduplicated.
///
/// Relative sources resolve against the document's `<base href>` when present,
/// otherwise against `base_url`. Sources that cannot be resolved are dropped.
pub fn image_references(html: &str, base_url: Option<&str>) -> BTreeSet<String> {
    let mut references = BTreeSet::new();
    let document = Html::parse_document(html);
    let base = effective_base(&document, base_url);

    let selector = match Selector::parse("img[src]") {
        Ok(selector) => selector,
        Err(_) => return references,
    };
    for element in document.select(&selector) {
        if let Some(src) = element.value().attr("src") {
            if let Some(url) = resolve_url(src, base.as_ref()) {
                references.insert(url.into());
            }
        }
    }
    references
}

/// Canonical spelling of an absolute URL, as produced by reference resolution.
///
/// Lower-cases the host, drops default ports and percent-encodes the path.
/// Input that does not parse is returned unchanged.
pub fn normalize_url(raw: &str) -> String {
    match Url::parse(raw.trim()) {
        Ok(url) => url.into(),
        Err(_) => raw.to_string(),
    }
}

fn effective_base(document: &Html, base_url: Option<&str>) -> Option<Url> {
    let base = base_url.and_then(|b| Url::parse(b).ok());
    let declared = Selector::parse("base[href]")
        .ok()
        .and_then(|sel| document.select(&sel).next())
        .and_then(|el| el.value().attr("href"))
        .and_then(|href| resolve_url(href, base.as_ref()));
    declared.or(base)
}

fn resolve_url(reference: &str, base: Option<&Url>) -> Option<Url> {
    let trimmed = reference.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_ascii_lowercase();
    if lower.starts_with('#') || lower.starts_with("javascript:") || lower.starts_with("data:") {
        return None;
    }
    if let Ok(url) = Url::parse(trimmed) {
        return Some(url);
    }
    base.and_then(|base| base.join(trimmed).ok())
}
