//! Range planning: turns an HTTP byte range into an aligned fetch plan.
//!
//! The platform's chunk RPC only accepts offsets that are multiples of the
//! chunk size, so a requested range is widened to chunk boundaries and the
//! surplus bytes are trimmed off the first and last fetched chunks.

use super::StreamError;

/// The platform hard-caps one chunk RPC at 1 MiB. Using exactly 1 MiB keeps
/// every fetch within that limit regardless of file size.
pub const CHUNK_SIZE: u64 = 1024 * 1024;

/// Request-scoped fetch plan for one byte range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangePlan {
    /// First requested byte (inclusive).
    pub from: u64,
    /// Last requested byte (inclusive).
    pub until: u64,
    /// Chunk-aligned offset the first fetch is issued at.
    pub aligned_offset: u64,
    /// Bytes to discard from the front of the first fetched chunk.
    pub leading_trim: usize,
    /// Bytes to keep from the front of the last fetched chunk.
    pub trailing_trim: usize,
    /// Number of chunk fetches spanning the range.
    pub chunk_count: u64,
}

impl RangePlan {
    /// Exact number of bytes the assembled stream must deliver.
    pub fn length(&self) -> u64 {
        self.until - self.from + 1
    }
}

/// Compute the fetch plan for `[from, until]` within a file of `total_size`.
///
/// Fails with `RangeNotSatisfiable` when `from > until` or `from` is at or
/// past the end of the file. `until` is clamped to the last byte.
pub fn plan(
    from: u64,
    until: u64,
    total_size: u64,
    chunk_size: u64,
) -> Result<RangePlan, StreamError> {
    if from > until || from >= total_size {
        return Err(StreamError::RangeNotSatisfiable {
            from,
            until,
            size: total_size,
        });
    }
    let until = until.min(total_size - 1);

    let aligned_offset = from - (from % chunk_size);
    let leading_trim = (from - aligned_offset) as usize;
    let trailing_trim = ((until % chunk_size) + 1) as usize;
    let chunk_count = (until + 1).div_ceil(chunk_size) - aligned_offset / chunk_size;

    Ok(RangePlan {
        from,
        until,
        aligned_offset,
        leading_trim,
        trailing_trim,
        chunk_count,
    })
}

/// Parse a `Range` header into `(from, until)`, both inclusive.
///
/// Only the first range of a multi-range header is honored. A missing or
/// malformed header degrades to the full file, `0..total_size-1`. Bounds
/// are clamped here; satisfiability is checked by [`plan`].
pub fn parse_range(header: Option<&str>, total_size: u64) -> (u64, u64) {
    let full = (0, total_size.saturating_sub(1));
    let Some(header) = header else {
        return full;
    };
    let spec = header.trim_start_matches("bytes=");
    let first = spec.split(',').next().unwrap_or("").trim();
    let Some((start_str, end_str)) = first.split_once('-') else {
        return full;
    };

    let from = if start_str.is_empty() {
        0
    } else {
        match start_str.parse::<u64>() {
            Ok(v) => v,
            Err(_) => return full,
        }
    };
    let until = if end_str.is_empty() {
        total_size.saturating_sub(1)
    } else {
        match end_str.parse::<u64>() {
            Ok(v) => v.min(total_size.saturating_sub(1)),
            Err(_) => return full,
        }
    };
    (from, until)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aligns_offset_and_trims() {
        // 10 MB file, range 2000000-2999999: the worked example.
        let plan = plan(2_000_000, 2_999_999, 10_000_000, CHUNK_SIZE).unwrap();
        assert_eq!(plan.aligned_offset, 1_048_576);
        assert_eq!(plan.leading_trim, 951_424);
        assert_eq!(plan.trailing_trim, 903_424);
        assert_eq!(plan.chunk_count, 2);
        assert_eq!(plan.length(), 1_000_000);
    }

    #[test]
    fn invariants_hold_across_ranges() {
        let total = 10_000_000;
        for (from, until) in [
            (0, total - 1),
            (0, 0),
            (1, 1),
            (CHUNK_SIZE - 1, CHUNK_SIZE),
            (CHUNK_SIZE, CHUNK_SIZE * 2 - 1),
            (123_456, 7_654_321),
            (total - 1, total - 1),
        ] {
            let p = plan(from, until, total, CHUNK_SIZE).unwrap();
            assert_eq!(p.aligned_offset % CHUNK_SIZE, 0);
            assert!((p.leading_trim as u64) < CHUNK_SIZE);
            assert!(p.trailing_trim >= 1 && p.trailing_trim as u64 <= CHUNK_SIZE);
            assert!(p.chunk_count >= 1);
        }
    }

    #[test]
    fn single_chunk_length_is_trim_difference() {
        let p = plan(100, 499, 1_000, CHUNK_SIZE).unwrap();
        assert_eq!(p.chunk_count, 1);
        assert_eq!(p.length(), (p.trailing_trim - p.leading_trim) as u64);
    }

    #[test]
    fn rejects_unsatisfiable_ranges() {
        assert!(matches!(
            plan(500, 400, 1_000, CHUNK_SIZE),
            Err(StreamError::RangeNotSatisfiable { .. })
        ));
        assert!(matches!(
            plan(1_000, 1_500, 1_000, CHUNK_SIZE),
            Err(StreamError::RangeNotSatisfiable { .. })
        ));
    }

    #[test]
    fn clamps_until_to_file_end() {
        let p = plan(0, u64::MAX, 1_000, CHUNK_SIZE).unwrap();
        assert_eq!(p.until, 999);
        assert_eq!(p.length(), 1_000);
    }

    #[test]
    fn parses_range_headers() {
        assert_eq!(parse_range(None, 500), (0, 499));
        assert_eq!(parse_range(Some("bytes=0-99"), 500), (0, 99));
        assert_eq!(parse_range(Some("bytes=100-"), 500), (100, 499));
        assert_eq!(parse_range(Some("bytes=-99"), 500), (0, 99));
        assert_eq!(parse_range(Some("bytes=0-49,100-199"), 500), (0, 49));
        assert_eq!(parse_range(Some("bytes=0-9999"), 500), (0, 499));
        assert_eq!(parse_range(Some("garbage"), 500), (0, 499));
    }
}
