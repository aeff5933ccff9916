//! Single byte-range parsing (`Range: bytes=...`)
//!
//! Only one range per request is honored. Anything malformed, including
//! multi-range requests, is ignored and the full body is served.

/// How to answer a request for a body of known length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    /// Serve the whole body (200)
    Full,
    /// Serve `start..=end` (206)
    Partial { start: u64, end: u64 },
    /// No byte of the body is selected (416)
    Unsatisfiable,
}

/// Interpret a `Range` header value against a body of `len` bytes
pub fn parse_range(header: &str, len: u64) -> ByteRange {
    let Some(ranges) = header.trim().strip_prefix("bytes=") else {
        return ByteRange::Full;
    };
    if ranges.contains(',') {
        return ByteRange::Full;
    }
    let Some((first, last)) = ranges.trim().split_once('-') else {
        return ByteRange::Full;
    };
    let (first, last) = (first.trim(), last.trim());

    if first.is_empty() {
        // Suffix range: the final `n` bytes
        let Ok(suffix) = last.parse::<u64>() else {
            return ByteRange::Full;
        };
        if suffix == 0 || len == 0 {
            return ByteRange::Unsatisfiable;
        }
        return ByteRange::Partial {
            start: len.saturating_sub(suffix),
            end: len - 1,
        };
    }

    let Ok(start) = first.parse::<u64>() else {
        return ByteRange::Full;
    };
    let end = if last.is_empty() {
        None
    } else {
        match last.parse::<u64>() {
            Ok(end) if end >= start => Some(end),
            _ => return ByteRange::Full,
        }
    };

    if start >= len {
        return ByteRange::Unsatisfiable;
    }
    ByteRange::Partial {
        start,
        end: end.map_or(len - 1, |end| end.min(len - 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closed_range() {
        assert_eq!(parse_range("bytes=0-99", 1000), ByteRange::Partial { start: 0, end: 99 });
        assert_eq!(parse_range("bytes=500-5000", 1000), ByteRange::Partial { start: 500, end: 999 });
    }

    #[test]
    fn test_open_and_suffix_ranges() {
        assert_eq!(parse_range("bytes=900-", 1000), ByteRange::Partial { start: 900, end: 999 });
        assert_eq!(parse_range("bytes=-100", 1000), ByteRange::Partial { start: 900, end: 999 });
        assert_eq!(parse_range("bytes=-5000", 1000), ByteRange::Partial { start: 0, end: 999 });
    }

    #[test]
    fn test_unsatisfiable() {
        assert_eq!(parse_range("bytes=1000-", 1000), ByteRange::Unsatisfiable);
        assert_eq!(parse_range("bytes=2000-3000", 1000), ByteRange::Unsatisfiable);
        assert_eq!(parse_range("bytes=-0", 1000), ByteRange::Unsatisfiable);
    }

    #[test]
    fn test_malformed_ignored() {
        for header in ["items=0-1", "bytes=abc", "bytes=5-1", "bytes=0-1,5-9", "bytes=-", "bytes=x-"] {
            assert_eq!(parse_range(header, 1000), ByteRange::Full, "{}", header);
        }
    }
}
