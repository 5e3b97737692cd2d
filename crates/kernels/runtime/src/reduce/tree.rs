//! Fixed-structure tree folding.
//!
//! Pairing is determined by position, never by completion order:
//!
//! ```text
//! Slots:   [s0, s1, s2, s3, s4]
//!
//! Level 0: s0⊕s1  s2⊕s3  s4
//! Level 1: (s0⊕s1)⊕(s2⊕s3)  s4
//! Level 2: ((s0⊕s1)⊕(s2⊕s3))⊕s4
//! ```
//!
//! Odd elements are carried up unchanged. For a fixed input the result is
//! bit-for-bit reproducible, even for floating-point sums.

/// Fold `values` with `op` along a fixed binary tree.
///
/// Returns `None` for an empty slice.
pub fn tree_reduce<T, F>(values: &[T], op: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T) -> T,
{
    let mut level: Vec<T> = values.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .filter_map(|pair| pair.iter().copied().reduce(&op))
            .collect();
    }
    level.first().copied()
}
