//! Draining paginated listings

use crate::error::Result;
use crate::upstream::Page;
use std::future::Future;
use tracing::debug;

/// Call `fetch` until a page comes back without a continuation token,
/// accumulating items in page order
///
/// The first call receives `None`; each later call receives the token the
/// previous page returned. An empty token ends the sweep like a missing one.
/// No deduplication happens here.
pub async fn collect_pages<T, F, Fut>(operation: &str, mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(Option<String>) -> Fut,
    Fut: Future<Output = Result<Page<T>>>,
{
    let mut items = Vec::new();
    let mut next_token = None;
    let mut pages = 0usize;

    loop {
        let page = fetch(next_token.take()).await?;
        pages += 1;
        items.extend(page.items);

        match page.next_token {
            Some(token) if !token.is_empty() => next_token = Some(token),
            _ => break,
        }
    }

    debug!(operation, pages, count = items.len(), "Listing drained");
    Ok(items)
}
