use cdr_core::{CrawlRecord, MediaLookup, MediaObject};
use cdr_engine::MediaCache;
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn object(url: &str, stored: &str) -> MediaObject {
    let record = CrawlRecord::new(url, Some("image/png"), "PNG")
        .with_fetch_time(1_600_000_000_000)
        .with_header("Content-Length", "3");
    MediaObject::from_record(&record, stored)
}

#[test]
fn stored_objects_read_back_unchanged() {
    engine_logging::initialize_for_tests();
    let cache = MediaCache::open_temporary(None).unwrap();
    let logo = object("http://x.com/logo.png", "com/x/aaa");

    cache.put("http://x.com/logo.png", &logo).unwrap();

    assert_eq!(cache.get("http://x.com/logo.png").unwrap(), Some(logo.clone()));
    assert_eq!(cache.lookup("http://x.com/logo.png"), Some(logo));
    assert_eq!(cache.len(), 1);
}

#[test]
fn missing_keys_are_absent() {
    let cache = MediaCache::open_temporary(None).unwrap();
    assert!(cache.is_empty());
    assert_eq!(cache.get("http://x.com/none.png").unwrap(), None);
    assert_eq!(cache.lookup(""), None);
}

#[test]
fn later_writes_replace_earlier_ones() {
    let cache = MediaCache::open_temporary(None).unwrap();
    cache.put("k", &object("http://x.com/a.png", "first")).unwrap();
    cache.put("k", &object("http://x.com/a.png", "second")).unwrap();

    assert_eq!(cache.get("k").unwrap().unwrap().stored_url, "second");
    assert_eq!(cache.len(), 1);
}

#[test]
fn cache_lives_under_given_parent_and_is_removed_on_close() {
    let parent = TempDir::new().unwrap();
    let cache = MediaCache::open_temporary(Some(&parent.path().join("work"))).unwrap();
    let dir = cache.path().to_path_buf();
    assert!(dir.starts_with(parent.path()));
    assert!(dir.exists());

    cache.put("k", &object("http://x.com/a.png", "s")).unwrap();
    cache.close().unwrap();

    assert!(!dir.exists());
}

#[test]
fn dropping_the_cache_removes_its_directory() {
    let dir = {
        let cache = MediaCache::open_temporary(None).unwrap();
        cache.path().to_path_buf()
    };
    assert!(!dir.exists());
}
