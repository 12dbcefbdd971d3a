use std::fs;
use std::io;
use std::path::Path;

use cdr_core::{MediaLookup, MediaObject};
use engine_logging::engine_warn;
use tempfile::TempDir;
use thiserror::Error;

const TEMP_PREFIX: &str = "cdr-export-tmp";
const STORE_DIR: &str = "media-cache";

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cannot prepare cache directory: {0}")]
    Io(#[from] io::Error),
    #[error("cache store error: {0}")]
    Store(#[from] sled::Error),
    #[error("cannot encode media object: {0}")]
    Encode(#[from] serde_json::Error),
}

/// On-disk map from original media URL to its uploaded [`MediaObject`].
///
/// The store lives in a fresh temporary directory that is removed when the
/// cache is closed or dropped, so nothing survives past one export run.
pub struct MediaCache {
    // Declared before `dir` so the store is released before the directory goes.
    db: sled::Db,
    dir: TempDir,
}

impl MediaCache {
    /// Opens an empty cache in a new temporary directory under `parent`,
    /// or under the system temp dir when `parent` is `None`.
    pub fn open_temporary(parent: Option<&Path>) -> Result<Self, CacheError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(TEMP_PREFIX);
        let dir = match parent {
            Some(parent) => {
                fs::create_dir_all(parent)?;
                builder.tempdir_in(parent)?
            }
            None => builder.tempdir()?,
        };
        // Reads only need to see writes from this process, so no background flushing.
        let db = sled::Config::new()
            .path(dir.path().join(STORE_DIR))
            .flush_every_ms(None)
            .open()?;
        Ok(Self { db, dir })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Stores `value` under `key`, replacing any earlier value.
    pub fn put(&self, key: &str, value: &MediaObject) -> Result<(), CacheError> {
        let encoded = serde_json::to_vec(value)?;
        self.db.insert(key.as_bytes(), encoded)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Option<MediaObject>, CacheError> {
        match self.db.get(key.as_bytes())? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn len(&self) -> usize {
        self.db.len()
    }

    pub fn is_empty(&self) -> bool {
        self.db.is_empty()
    }

    /// Releases the store and deletes its directory.
    pub fn close(self) -> Result<(), CacheError> {
        let MediaCache { db, dir } = self;
        db.flush()?;
        drop(db);
        dir.close()?;
        Ok(())
    }
}

impl MediaLookup for MediaCache {
    fn lookup(&self, original_url: &str) -> Option<MediaObject> {
        match self.get(original_url) {
            Ok(found) => found,
            Err(err) => {
                engine_warn!("Unreadable media cache entry for {}: {}", original_url, err);
                None
            }
        }
    }
}
