use crate::error::ScanError;
use crate::model::BlockRange;

/// Splits `[from, to]` into consecutive ranges of at most `chunk_size` blocks.
/// The last range is shorter when the span is not a multiple of `chunk_size`.
pub fn partition(from: u64, to: u64, chunk_size: u64) -> Result<Vec<BlockRange>, ScanError> {
    if chunk_size == 0 || from > to {
        return Err(ScanError::InvalidRange {
            from,
            to,
            chunk_size,
        });
    }

    let mut ranges = Vec::new();
    let mut start = from;
    loop {
        let end = start.saturating_add(chunk_size - 1).min(to);
        ranges.push(BlockRange::new(start, end).ok_or(ScanError::InvalidRange {
            from,
            to,
            chunk_size,
        })?);
        if end == to {
            break;
        }
        start = end + 1;
    }

    Ok(ranges)
}
