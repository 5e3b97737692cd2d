//! Core index types shared by segments, loop bodies and kernels.

/// Index value handed to loop bodies.
pub type Index = i64;

/// Sentinel for an index that has no meaningful value.
///
/// Reported as the location of an untouched min/max-loc accumulator and as
/// the index of a kernel dimension whose current offset lies outside its
/// segment.
pub const UNDEFINED_VALUE: Index = -9_999_999;

/// Shape of an index segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SegmentType {
    /// Contiguous `[begin, end)`.
    Range,
    /// `[begin, end)` visited with a fixed stride.
    RangeStride,
    /// Explicit list of indices.
    List,
}

/// Whether a list segment owns its index storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexOwnership {
    /// Indices are borrowed from the caller.
    Unowned,
    /// Indices are owned by the segment.
    Owned,
}
