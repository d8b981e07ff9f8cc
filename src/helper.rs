//! Pure position arithmetic for the balanced topology.
//!
//! A tree of `length` leaves decomposes into perfect subtrees ("blocks")
//! whose weights are the set bits of `length`, laid out left to right in
//! descending weight. The root is the right-to-left bag of the block
//! subroots. All shape questions (where a leaf lives, how long a proof
//! path is) reduce to arithmetic on this decomposition, so proof
//! validation never needs tree access.

/// The `(start, weight)` spans of the perfect blocks decomposing
/// `length`, in leaf order (descending weight).
///
/// For example `block_spans(6)` is `[(0, 4), (4, 2)]`.
pub(crate) fn block_spans(length: u64) -> Vec<(u64, u64)> {
    let mut spans = Vec::with_capacity(length.count_ones() as usize);
    let mut start = 0;
    for shift in (0..u64::BITS).rev() {
        let weight = 1u64 << shift;
        if length & weight != 0 {
            spans.push((start, weight));
            start += weight;
        }
    }
    spans
}

/// Index of the span containing `leaf`. Callers must have validated
/// `leaf < length`.
pub(crate) fn locate_span(spans: &[(u64, u64)], leaf: u64) -> usize {
    spans
        .iter()
        .position(|&(start, weight)| leaf >= start && leaf < start + weight)
        .expect("validated: leaf within length")
}

/// The weight of the last (smallest) block of `length`: its lowest set
/// bit. `length` must be non-zero.
pub(crate) fn lowest_block(length: u64) -> u64 {
    1u64 << length.trailing_zeros()
}

/// Number of steps in an audit path for `leaf_index` against a tree of
/// `length` leaves. Pure function of the two arguments.
pub(crate) fn audit_path_len(leaf_index: u64, length: u64) -> usize {
    let spans = block_spans(length);
    let block = locate_span(&spans, leaf_index);
    let (_, weight) = spans[block];
    weight.trailing_zeros() as usize + usize::from(block + 1 < spans.len()) + block
}

/// Number of steps in a consistency path from the state at `old_length`
/// to the state at `length`. Pure function of the two arguments.
pub(crate) fn consistency_path_len(old_length: u64, length: u64) -> usize {
    if old_length == 0 {
        return 0;
    }
    let low = lowest_block(old_length);
    let spans = block_spans(length);
    let block = locate_span(&spans, old_length - low);
    let (_, weight) = spans[block];
    (weight.trailing_zeros() - low.trailing_zeros()) as usize
        + usize::from(block + 1 < spans.len())
        + block
}
