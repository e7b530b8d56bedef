//! Request batching policy.
//!
//! Chunk sizes exist purely to respect remote request-size limits; they are
//! a performance policy, not a correctness one. Changing them never changes
//! what ends up on the remote.

use quiver_types::BlobId;

/// Snapshots per query or push request.
pub const SNAPSHOT_CHUNK: usize = 20;

/// Blob ids per fetch request.
pub const BLOB_FETCH_CHUNK: usize = 50;

/// Maximum blobs per upload batch.
pub const BLOB_PUSH_MAX_COUNT: usize = 200;

/// Maximum payload bytes per upload batch (2 MiB).
pub const BLOB_PUSH_MAX_BYTES: usize = 2 * 1024 * 1024;

/// Split blob payloads into upload batches capped by count and byte size.
///
/// A single blob larger than the byte cap still ships, alone in its batch;
/// the cap closes a batch after it overflows, it does not reject blobs.
pub fn batch_blobs(blobs: Vec<(BlobId, Vec<u8>)>) -> Vec<Vec<(BlobId, Vec<u8>)>> {
    let mut batches = Vec::new();
    let mut batch: Vec<(BlobId, Vec<u8>)> = Vec::new();
    let mut batch_bytes = 0usize;

    for (id, bytes) in blobs {
        batch_bytes += bytes.len();
        batch.push((id, bytes));

        if batch.len() >= BLOB_PUSH_MAX_COUNT || batch_bytes >= BLOB_PUSH_MAX_BYTES {
            batches.push(std::mem::take(&mut batch));
            batch_bytes = 0;
        }
    }

    if !batch.is_empty() {
        batches.push(batch);
    }

    batches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(seed: u8, size: usize) -> (BlobId, Vec<u8>) {
        (BlobId::from_bytes(&[seed]), vec![seed; size])
    }

    #[test]
    fn empty_input_yields_no_batches() {
        assert!(batch_blobs(vec![]).is_empty());
    }

    #[test]
    fn small_payloads_share_one_batch() {
        let batches = batch_blobs(vec![blob(1, 10), blob(2, 10), blob(3, 10)]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 3);
    }

    #[test]
    fn count_cap_splits_batches() {
        let blobs: Vec<_> = (0..=BLOB_PUSH_MAX_COUNT as u16)
            .map(|i| (BlobId::from_bytes(&i.to_be_bytes()), vec![0u8; 1]))
            .collect();
        let batches = batch_blobs(blobs);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), BLOB_PUSH_MAX_COUNT);
        assert_eq!(batches[1].len(), 1);
    }

    #[test]
    fn byte_cap_splits_batches() {
        let big = BLOB_PUSH_MAX_BYTES / 2 + 1;
        let batches = batch_blobs(vec![blob(1, big), blob(2, big), blob(3, 10)]);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].len(), 2);
        assert_eq!(batches[1].len(), 1);
    }

    #[test]
    fn oversized_blob_still_ships() {
        let batches = batch_blobs(vec![blob(1, BLOB_PUSH_MAX_BYTES + 1)]);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 1);
    }

    #[test]
    fn nothing_is_dropped_or_reordered() {
        let blobs: Vec<_> = (0..500u16)
            .map(|i| (BlobId::from_bytes(&i.to_be_bytes()), vec![0u8; 64]))
            .collect();
        let expected: Vec<BlobId> = blobs.iter().map(|(id, _)| *id).collect();
        let flattened: Vec<BlobId> = batch_blobs(blobs)
            .into_iter()
            .flatten()
            .map(|(id, _)| id)
            .collect();
        assert_eq!(flattened, expected);
    }
}
