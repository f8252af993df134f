//! Batch partitioning.

/// Maximum number of resource-metrics records carried by one Export request.
pub const MAX_RECORDS_PER_REQUEST: usize = 500;

/// Number of chunks `len` records split into at `max_per_chunk`.
pub fn chunk_count(len: usize, max_per_chunk: usize) -> usize {
    let max = max_per_chunk.max(1);
    len.div_ceil(max)
}

/// Split `items` into contiguous chunks of at most `max_per_chunk` items.
///
/// Order is preserved within each chunk and across chunk boundaries, so
/// concatenating the result yields the input unchanged. Items are moved, not
/// cloned.
pub fn partition<T>(mut items: Vec<T>, max_per_chunk: usize) -> Vec<Vec<T>> {
    let max = max_per_chunk.max(1);
    let mut chunks = Vec::with_capacity(chunk_count(items.len(), max));
    while items.len() > max {
        let rest = items.split_off(max);
        chunks.push(std::mem::replace(&mut items, rest));
    }
    if !items.is_empty() {
        chunks.push(items);
    }
    chunks
}
