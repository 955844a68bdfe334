//! HTTP Range request parsing module
//!
//! Single byte-range parsing (RFC 9110 section 14). Multi-range requests are
//! answered with the full body.

/// Inclusive byte range resolved against a known body length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    pub const fn length(self) -> u64 {
        self.end - self.start + 1
    }

    /// `Content-Range` header value for a body of `total` bytes
    pub fn content_range(self, total: u64) -> String {
        format!("bytes {}-{}/{total}", self.start, self.end)
    }
}

/// Range header parse result
#[derive(Debug, PartialEq, Eq)]
pub enum RangeParseResult {
    Valid(ByteRange),
    /// Syntactically valid but outside the body - answer 416
    NotSatisfiable,
    /// No Range header, another unit, or malformed - serve the full body
    None,
}

/// Parse a `Range` header value against a body of `total` bytes
///
/// Supported forms: `bytes=start-end`, `bytes=start-`, `bytes=-suffix`.
pub fn parse_range_header(range_header: Option<&str>, total: u64) -> RangeParseResult {
    let Some(ranges) = range_header.and_then(|h| h.trim().strip_prefix("bytes=")) else {
        return RangeParseResult::None;
    };
    if ranges.contains(',') {
        return RangeParseResult::None;
    }
    let Some((first, last)) = ranges.split_once('-') else {
        return RangeParseResult::None;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        return parse_suffix(last, total);
    }

    let Ok(start) = first.parse::<u64>() else {
        return RangeParseResult::None;
    };
    let end = if last.is_empty() {
        None
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            // last-pos < first-pos makes the whole header invalid
            _ => return RangeParseResult::None,
        }
    };

    if start >= total {
        return RangeParseResult::NotSatisfiable;
    }
    let last_byte = total - 1;
    RangeParseResult::Valid(ByteRange {
        start,
        end: end.map_or(last_byte, |e| e.min(last_byte)),
    })
}

/// `bytes=-N`: the final N bytes
fn parse_suffix(suffix: &str, total: u64) -> RangeParseResult {
    let Ok(suffix) = suffix.parse::<u64>() else {
        return RangeParseResult::None;
    };
    if suffix == 0 || total == 0 {
        return RangeParseResult::NotSatisfiable;
    }
    RangeParseResult::Valid(ByteRange {
        start: total.saturating_sub(suffix),
        end: total - 1,
    })
}
