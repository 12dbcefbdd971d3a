//! CDR core: crawl records, content addressing, and CDR document assembly.
mod address;
mod assemble;
mod decode;
mod document;
mod media;
mod record;
mod resolve;

pub use address::{content_digest, reverse_domain, storage_key, AddressError};
pub use assemble::{
    assemble_v2, assemble_v3, assemble_v31, assembler_for, classify, AssembleError, Assembler,
    AssemblyContext, DocumentIdentity, RecordClass, DEFAULT_CRAWLER, DEFAULT_TEAM,
};
pub use decode::{decode_text, DecodedText};
pub use document::{
    document_id, Cdr2Document, Cdr31Document, Cdr3Document, CdrVersion, CrawlData, ExportDocument,
    UnknownVersion, CDR2_VERSION,
};
pub use media::{MediaLookup, MediaObject};
pub use record::{CrawlRecord, ResponseHeaders};
pub use resolve::{image_references, normalize_url};
