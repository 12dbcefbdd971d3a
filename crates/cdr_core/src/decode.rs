use chardetng::EncodingDetector;
use encoding_rs::Encoding;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding_label: String,
    pub had_errors: bool,
}

/// Decode raw bytes into UTF-8 using: BOM -> Content-Type charset -> chardetng fallback.
///
/// Malformed sequences are replaced rather than rejected; `had_errors` reports them.
pub fn decode_text(bytes: &[u8], content_type: Option<&str>) -> DecodedText {
    // 1) BOM aware decode using encoding_rs helper
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return decode_with(bytes, encoding);
    }

    // 2) Content-Type header charset
    if let Some(label) = content_type.and_then(extract_charset) {
        if let Some(enc) = Encoding::for_label(label.as_bytes()) {
            return decode_with(bytes, enc);
        }
    }

    // 3) chardetng detection over the full body
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let enc = detector.guess(None, true);
    decode_with(bytes, enc)
}

fn extract_charset(content_type: &str) -> Option<String> {
    content_type
        .split(';')
        .filter_map(|part| {
            let (key, value) = part.trim().split_once('=')?;
            if !key.trim().eq_ignore_ascii_case("charset") {
                return None;
            }
            Some(value.trim_matches([' ', '"', '\''].as_ref()))
        })
        .find(|value| !value.is_empty())
        .map(|s| s.to_string())
}

fn decode_with(bytes: &[u8], enc: &'static Encoding) -> DecodedText {
    let (text, used, had_errors) = enc.decode(bytes);
    DecodedText {
        text: text.into_owned(),
        encoding_label: used.name().to_string(),
        had_errors,
    }
}

#[cfg(test)]
mod tests {
    use super::{decode_text, extract_charset};

    #[test]
    fn respects_charset_parameter() {
        let decoded = decode_text(b"caf\xe9", Some("text/html; charset=ISO-8859-1"));
        assert_eq!(decoded.text, "caf\u{e9}");
        assert!(!decoded.had_errors);
    }

    #[test]
    fn bom_wins_over_header() {
        let decoded = decode_text(b"\xEF\xBB\xBFhello", Some("text/html; charset=latin1"));
        assert_eq!(decoded.text, "hello");
        assert_eq!(decoded.encoding_label, "UTF-8");
    }

    #[test]
    fn invalid_bytes_are_replaced_not_rejected() {
        let decoded = decode_text(b"ok\xff\xfe!", Some("text/html; charset=utf-8"));
        assert!(decoded.had_errors);
        assert!(decoded.text.starts_with("ok"));
        assert!(decoded.text.ends_with('!'));
    }

    #[test]
    fn charset_lookup_is_case_insensitive_and_unquotes() {
        assert_eq!(
            extract_charset("text/html; Charset=\"windows-1252\"").as_deref(),
            Some("windows-1252")
        );
        assert_eq!(extract_charset("text/html"), None);
    }
}
