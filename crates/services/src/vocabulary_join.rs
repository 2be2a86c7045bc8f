use std::collections::HashMap;

use futures::future::try_join_all;
use storage::repository::{MAX_LOOKUP_BATCH, StorageError, VocabularyLookup};
use vocab_core::model::{VocabularyEntry, WordId, WordRecord, WordWithMetadata};

/// Attach catalog entries to `records`, keeping the records' order.
///
/// Ids are looked up in chunks no larger than the lookup's batch cap, and the
/// chunks run concurrently. Records without a catalog entry get `entry: None`.
///
/// # Errors
///
/// Returns the first `StorageError` any chunk fails with.
pub async fn resolve_entries(
    lookup: &dyn VocabularyLookup,
    records: Vec<WordRecord>,
) -> Result<Vec<WordWithMetadata>, StorageError> {
    if records.is_empty() {
        return Ok(Vec::new());
    }

    let ids: Vec<WordId> = records.iter().map(WordRecord::word_id).collect();
    let chunk_size = lookup.max_batch().clamp(1, MAX_LOOKUP_BATCH);

    let chunks = try_join_all(ids.chunks(chunk_size).map(|chunk| lookup.entries_by_ids(chunk))).await?;

    let mut by_id: HashMap<WordId, VocabularyEntry> = chunks
        .into_iter()
        .flatten()
        .map(|entry| (entry.word_id, entry))
        .collect();

    Ok(records
        .into_iter()
        .map(|record| {
            // the same word never appears twice for one learner, so remove is safe
            let entry = by_id.remove(&record.word_id());
            WordWithMetadata { record, entry }
        })
        .collect())
}
