use cdr_core::{content_digest, reverse_domain, storage_key, AddressError};
use pretty_assertions::assert_eq;

#[test]
fn domain_labels_are_reversed_into_a_path() {
    assert_eq!(reverse_domain("a.b.com").as_deref(), Some("com/b/a"));
    assert_eq!(reverse_domain("foo.bar.com").as_deref(), Some("com/bar/foo"));
    assert_eq!(reverse_domain("localhost").as_deref(), Some("localhost"));
}

#[test]
fn empty_host_has_no_prefix() {
    assert_eq!(reverse_domain(""), None);
    assert_eq!(reverse_domain("."), None);
}

#[test]
fn trailing_dot_is_ignored() {
    assert_eq!(reverse_domain("www.example.org.").as_deref(), Some("org/example/www"));
}

#[test]
fn storage_key_combines_reversed_host_and_digest() {
    let key = storage_key(b"PNG", "http://x.com/logo.png").unwrap();
    assert_eq!(key, Some(format!("com/x/{}", content_digest(b"PNG"))));
}

#[test]
fn digest_is_lowercase_sha256_hex() {
    assert_eq!(
        content_digest(b""),
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn storage_key_is_deterministic_and_content_sensitive() {
    let first = storage_key(b"one", "https://img.example.com/a.png").unwrap();
    let again = storage_key(b"one", "https://img.example.com/b.png").unwrap();
    let other = storage_key(b"two", "https://img.example.com/a.png").unwrap();

    assert_eq!(first, again);
    assert_ne!(first, other);
    assert!(first.unwrap().starts_with("com/example/img/"));
}

#[test]
fn url_without_host_yields_no_key() {
    assert_eq!(storage_key(b"x", "file:///tmp/a.png").unwrap(), None);
}

#[test]
fn unparseable_url_is_an_error() {
    let err = storage_key(b"x", "not a url").unwrap_err();
    assert!(matches!(err, AddressError::InvalidUrl { .. }));
}
