//! Batch splitting
//!
//! Partitions an ordered item sequence into fixed-size batches. The last batch
//! holds the remainder when the item count is not a multiple of the batch size.

use crate::{Error, Result};

/// Number of files dispatched together unless configured otherwise
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Split `items` into consecutive batches of at most `size` items
///
/// Order is preserved within and across batches. An empty input yields zero
/// batches. A `size` of zero is a caller error.
pub fn split<T, I>(items: I, size: usize) -> Result<Vec<Vec<T>>>
where
    I: IntoIterator<Item = T>,
{
    if size == 0 {
        return Err(Error::InvalidInput(
            "batch size must be at least 1".to_string(),
        ));
    }

    let mut iter = items.into_iter().peekable();
    let mut batches = Vec::new();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }

    Ok(batches)
}
