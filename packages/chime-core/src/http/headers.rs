//! Header types and request header helpers.

/// A single header as a name/value pair. Names keep the case they arrived in.
pub type Header = (String, String);

/// Ordered header list. Duplicates are kept, never merged.
pub type Headers = Vec<Header>;

/// Looks up a header by name, ignoring ASCII case. Returns `""` on a miss.
pub fn find_header<'a>(headers: &'a [Header], name: &str) -> &'a str {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map_or("", |(_, value)| value.as_str())
}

/// Builders for `Range` request headers keyed by byte offsets.
pub struct RangeHeader;

impl RangeHeader {
    /// Inclusive byte range `from..=to`.
    #[must_use]
    pub fn range(from: u64, to: u64) -> Header {
        ("Range".to_string(), format!("bytes={}-{}", from, to))
    }

    /// Everything from `from` to the end of the resource.
    #[must_use]
    pub fn from(from: u64) -> Header {
        ("Range".to_string(), format!("bytes={}-", from))
    }

    /// The final `nbytes` of the resource.
    #[must_use]
    pub fn last(nbytes: u64) -> Header {
        ("Range".to_string(), format!("bytes=-{}", nbytes))
    }
}

/// Extracts the total resource size from a `Content-Range` value.
///
/// `bytes 0-99/12345` yields `Some(12345)`; an unknown total (`*`) or a
/// malformed value yields `None`.
pub fn content_range_total(value: &str) -> Option<usize> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_returns_first_match() {
        let headers = vec![
            ("X-A".to_string(), "b".to_string()),
            ("x-a".to_string(), "c".to_string()),
        ];
        assert_eq!(find_header(&headers, "x-a"), "b");
        assert_eq!(find_header(&headers, "X-MISSING"), "");
    }

    #[test]
    fn range_headers_format_byte_offsets() {
        assert_eq!(RangeHeader::range(0, 1023).1, "bytes=0-1023");
        assert_eq!(RangeHeader::from(512).1, "bytes=512-");
        assert_eq!(RangeHeader::last(100).1, "bytes=-100");
        assert_eq!(RangeHeader::last(100).0, "Range");
    }

    #[test]
    fn content_range_total_parses_known_sizes_only() {
        assert_eq!(content_range_total("bytes 0-99/12345"), Some(12345));
        assert_eq!(content_range_total("bytes 0-99/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }
}
