//! Splitting inputs into request-sized chunks.

use std::collections::{BTreeSet, HashSet};

/// Split `items` into consecutive chunks of at most `size` elements.
///
/// A `size` of zero is treated as one.
pub fn chunked<T: Clone>(items: &[T], size: usize) -> Vec<Vec<T>> {
    items.chunks(size.max(1)).map(<[T]>::to_vec).collect()
}

/// Union of supplied and searched IDs without duplicates.
///
/// Supplied IDs keep their input order, search hits not already supplied
/// follow in ascending order.
pub fn merge_ids(supplied: &[u64], searched: &BTreeSet<u64>) -> Vec<u64> {
    let mut seen = HashSet::with_capacity(supplied.len() + searched.len());
    supplied
        .iter()
        .chain(searched.iter())
        .copied()
        .filter(|id| seen.insert(*id))
        .collect()
}
