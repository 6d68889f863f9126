//! Batched detail fetches

use crate::error::Result;
use std::future::Future;
use tracing::debug;

/// Upper bound on identifiers per describe call imposed by the upstream API
pub const MAX_DESCRIBE_BATCH: usize = 100;

/// Split `ids` into contiguous groups of at most `batch_size` and call
/// `describe` once per group, concatenating results in request order
///
/// `batch_size` is clamped to `1..=MAX_DESCRIBE_BATCH`. No call is made for an
/// empty input. The first failing group aborts the whole describe.
pub async fn describe_in_batches<'a, T, F, Fut>(
    operation: &str,
    ids: &'a [String],
    batch_size: usize,
    mut describe: F,
) -> Result<Vec<T>>
where
    F: FnMut(&'a [String]) -> Fut,
    Fut: Future<Output = Result<Vec<T>>>,
{
    let batch_size = batch_size.clamp(1, MAX_DESCRIBE_BATCH);
    let mut results = Vec::with_capacity(ids.len());

    for (index, group) in ids.chunks(batch_size).enumerate() {
        debug!(operation, batch = index, size = group.len(), "Describing batch");
        results.extend(describe(group).await?);
    }

    Ok(results)
}
