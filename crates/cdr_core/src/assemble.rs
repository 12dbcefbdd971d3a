//! Per-record document assembly for each CDR revision.
//!
//! The revision is chosen once per run through [`assembler_for`]; the returned
//! function builds a complete document from one record and the media cache.

use chrono::{DateTime, Utc};
use engine_logging::engine_debug;
use url::Url;

use crate::document::{
    document_id, Cdr2Document, Cdr31Document, Cdr3Document, CdrVersion, CrawlData, ExportDocument,
    CDR2_VERSION,
};
use crate::media::MediaLookup;
use crate::record::CrawlRecord;
use crate::resolve::image_references;

pub const DEFAULT_TEAM: &str = "NYU";
pub const DEFAULT_CRAWLER: &str = "ACHE";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentIdentity {
    pub team: String,
    pub crawler: String,
}

impl Default for DocumentIdentity {
    fn default() -> Self {
        Self {
            team: DEFAULT_TEAM.to_string(),
            crawler: DEFAULT_CRAWLER.to_string(),
        }
    }
}

/// Everything a document needs beyond the record itself.
pub struct AssemblyContext<'a> {
    pub identity: &'a DocumentIdentity,
    pub media: &'a dyn MediaLookup,
    pub indexed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AssembleError {
    #[error("record has no content type")]
    MissingContentType,
    #[error("invalid url {url}: {source}")]
    InvalidUrl { url: String, source: url::ParseError },
}

/// How a record is routed by its content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordClass<'a> {
    Html,
    Image,
    MissingContentType,
    Other(&'a str),
}

pub fn classify(record: &CrawlRecord) -> RecordClass<'_> {
    let Some(content_type) = record.content_type() else {
        return RecordClass::MissingContentType;
    };
    let lower = content_type.to_ascii_lowercase();
    if lower.starts_with("text/html") {
        RecordClass::Html
    } else if lower.starts_with("image") {
        RecordClass::Image
    } else {
        RecordClass::Other(content_type)
    }
}

pub type Assembler =
    fn(&CrawlRecord, &AssemblyContext<'_>) -> Result<ExportDocument, AssembleError>;

pub fn assembler_for(version: CdrVersion) -> Assembler {
    match version {
        CdrVersion::V2 => assemble_v2,
        CdrVersion::V3 => assemble_v3,
        CdrVersion::V31 => assemble_v31,
    }
}

struct CommonFields {
    id: String,
    url: String,
    content_type: String,
    raw_content: String,
}

fn common_fields(record: &CrawlRecord) -> Result<CommonFields, AssembleError> {
    let content_type = record
        .content_type()
        .ok_or(AssembleError::MissingContentType)?
        .to_string();
    Url::parse(&record.url).map_err(|source| AssembleError::InvalidUrl {
        url: record.url.clone(),
        source,
    })?;
    Ok(CommonFields {
        id: document_id(&record.url),
        url: record.url.clone(),
        content_type,
        raw_content: record.content_as_text(),
    })
}

pub fn assemble_v2(
    record: &CrawlRecord,
    ctx: &AssemblyContext<'_>,
) -> Result<ExportDocument, AssembleError> {
    let common = common_fields(record)?;
    Ok(ExportDocument::V2(Cdr2Document {
        id: common.id,
        url: common.url,
        timestamp: record.fetch_time,
        team: ctx.identity.team.clone(),
        crawler: ctx.identity.crawler.clone(),
        raw_content: common.raw_content,
        content_type: common.content_type,
        crawl_data: CrawlData {
            response_headers: record.response_headers.clone(),
        },
        version: CDR2_VERSION.to_string(),
    }))
}

pub fn assemble_v3(
    record: &CrawlRecord,
    ctx: &AssemblyContext<'_>,
) -> Result<ExportDocument, AssembleError> {
    let common = common_fields(record)?;
    Ok(ExportDocument::V3(Cdr3Document {
        id: common.id,
        url: common.url,
        timestamp_crawl: record.fetched_at(),
        timestamp_index: ctx.indexed_at,
        team: ctx.identity.team.clone(),
        crawler: ctx.identity.crawler.clone(),
        raw_content: common.raw_content,
        content_type: common.content_type,
    }))
}

pub fn assemble_v31(
    record: &CrawlRecord,
    ctx: &AssemblyContext<'_>,
) -> Result<ExportDocument, AssembleError> {
    let common = common_fields(record)?;

    let mut objects = Vec::new();
    for reference in image_references(&common.raw_content, Some(&record.url)) {
        match ctx.media.lookup(&reference) {
            Some(object) => objects.push(object),
            None => engine_debug!("No media object for {} in {}", reference, record.url),
        }
    }

    Ok(ExportDocument::V31(Cdr31Document {
        id: common.id,
        url: common.url,
        timestamp_crawl: record.fetched_at(),
        timestamp_index: ctx.indexed_at,
        team: ctx.identity.team.clone(),
        crawler: ctx.identity.crawler.clone(),
        raw_content: common.raw_content,
        content_type: common.content_type,
        response_headers: record.response_headers.clone(),
        objects,
    }))
}
