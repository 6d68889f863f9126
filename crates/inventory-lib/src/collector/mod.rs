//! Listing and describe plumbing shared by every pipeline stage
//!
//! Upstream listings are paginated and describe calls accept a bounded
//! number of identifiers. This module turns both into plain vectors.

mod batch;
mod pagination;

pub use batch::{describe_in_batches, MAX_DESCRIBE_BATCH};
pub use pagination::collect_pages;
