//! Index segments: the iteration spaces handed to the dispatchers.
//!
//! The engine only relies on the [`Iterable`] contract: a length, random
//! access by offset, and a begin/end cursor. Indices need not be contiguous;
//! a [`ListSegment`] is as valid an input as a [`RangeSegment`].
//!
//! ```text
//! RangeSegment(2, 6)            → 2 3 4 5
//! RangeStrideSegment(10, 0, -3) → 10 7 4 1
//! ListSegment([4, 9, 1])        → 4 9 1
//! IndexSet[Range(0,2), List(7)] → 0 1 7
//! ```

use std::borrow::Cow;
use std::iter::FusedIterator;

use crate::error::{Error, Result};
use crate::types::{Index, IndexOwnership, SegmentType};

// ============================================================================
// Iterable Contract
// ============================================================================

/// An ordered sequence of indices that can be partitioned by offset.
pub trait Iterable: Sync {
    /// Number of indices in the sequence.
    fn len(&self) -> usize;

    /// Index stored at `offset`.
    ///
    /// Callers must keep `offset < self.len()`.
    fn at(&self, offset: usize) -> Index;

    /// Whether the sequence holds no indices.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cursor over the whole sequence, in order.
    fn iter(&self) -> Cursor<'_, Self>
    where
        Self: Sized,
    {
        Cursor {
            iterable: self,
            front: 0,
            back: self.len(),
        }
    }
}

/// Begin/end cursor over an [`Iterable`].
#[derive(Debug, Clone)]
pub struct Cursor<'a, I: ?Sized> {
    iterable: &'a I,
    front: usize,
    back: usize,
}

impl<I: Iterable + ?Sized> Iterator for Cursor<'_, I> {
    type Item = Index;

    fn next(&mut self) -> Option<Index> {
        if self.front == self.back {
            return None;
        }
        let index = self.iterable.at(self.front);
        self.front += 1;
        Some(index)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back - self.front;
        (remaining, Some(remaining))
    }
}

impl<I: Iterable + ?Sized> DoubleEndedIterator for Cursor<'_, I> {
    fn next_back(&mut self) -> Option<Index> {
        if self.front == self.back {
            return None;
        }
        self.back -= 1;
        Some(self.iterable.at(self.back))
    }
}

impl<I: Iterable + ?Sized> ExactSizeIterator for Cursor<'_, I> {}

impl<I: Iterable + ?Sized> FusedIterator for Cursor<'_, I> {}

// ============================================================================
// Segment Types
// ============================================================================

/// Contiguous half-open range `[begin, end)`.
///
/// A range whose `end` precedes its `begin` is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSegment {
    begin: Index,
    end: Index,
}

impl RangeSegment {
    pub fn new(begin: Index, end: Index) -> Self {
        Self {
            begin,
            end: end.max(begin),
        }
    }

    pub fn begin(&self) -> Index {
        self.begin
    }

    pub fn end(&self) -> Index {
        self.end
    }
}

impl Iterable for RangeSegment {
    fn len(&self) -> usize {
        (self.end - self.begin) as usize
    }

    fn at(&self, offset: usize) -> Index {
        self.begin + offset as Index
    }
}

/// Half-open range `[begin, end)` visited with a non-zero stride.
///
/// A negative stride walks downwards, so `begin` must exceed `end` for the
/// segment to be non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeStrideSegment {
    begin: Index,
    end: Index,
    stride: Index,
    len: usize,
}

impl RangeStrideSegment {
    /// Create a strided range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidSegment`] if `stride` is zero.
    pub fn new(begin: Index, end: Index, stride: Index) -> Result<Self> {
        if stride == 0 {
            return Err(Error::InvalidSegment(format!(
                "stride of range [{begin}, {end}) must be non-zero"
            )));
        }
        let span = if stride > 0 { end - begin } else { begin - end };
        let step = stride.abs();
        let len = if span > 0 {
            ((span + step - 1) / step) as usize
        } else {
            0
        };
        Ok(Self {
            begin,
            end,
            stride,
            len,
        })
    }

    pub fn stride(&self) -> Index {
        self.stride
    }
}

impl Iterable for RangeStrideSegment {
    fn len(&self) -> usize {
        self.len
    }

    fn at(&self, offset: usize) -> Index {
        self.begin + offset as Index * self.stride
    }
}

/// Explicit list of indices, owned or borrowed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListSegment<'a> {
    indices: Cow<'a, [Index]>,
}

impl<'a> ListSegment<'a> {
    /// List segment that takes ownership of `indices`.
    pub fn owned(indices: Vec<Index>) -> Self {
        Self {
            indices: Cow::Owned(indices),
        }
    }

    /// List segment that borrows the caller's indices.
    pub fn borrowed(indices: &'a [Index]) -> Self {
        Self {
            indices: Cow::Borrowed(indices),
        }
    }

    pub fn ownership(&self) -> IndexOwnership {
        match self.indices {
            Cow::Borrowed(_) => IndexOwnership::Unowned,
            Cow::Owned(_) => IndexOwnership::Owned,
        }
    }

    pub fn as_slice(&self) -> &[Index] {
        &self.indices
    }
}

impl Iterable for ListSegment<'_> {
    fn len(&self) -> usize {
        self.indices.len()
    }

    fn at(&self, offset: usize) -> Index {
        self.indices[offset]
    }
}

/// Any of the supported segment kinds.
///
/// Kernels bind one `Segment` per loop dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    Range(RangeSegment),
    RangeStride(RangeStrideSegment),
    List(ListSegment<'a>),
}

impl Segment<'_> {
    pub fn segment_type(&self) -> SegmentType {
        match self {
            Segment::Range(_) => SegmentType::Range,
            Segment::RangeStride(_) => SegmentType::RangeStride,
            Segment::List(_) => SegmentType::List,
        }
    }
}

impl Iterable for Segment<'_> {
    fn len(&self) -> usize {
        match self {
            Segment::Range(s) => s.len(),
            Segment::RangeStride(s) => s.len(),
            Segment::List(s) => s.len(),
        }
    }

    fn at(&self, offset: usize) -> Index {
        match self {
            Segment::Range(s) => s.at(offset),
            Segment::RangeStride(s) => s.at(offset),
            Segment::List(s) => s.at(offset),
        }
    }
}

impl From<RangeSegment> for Segment<'_> {
    fn from(segment: RangeSegment) -> Self {
        Segment::Range(segment)
    }
}

impl From<RangeStrideSegment> for Segment<'_> {
    fn from(segment: RangeStrideSegment) -> Self {
        Segment::RangeStride(segment)
    }
}

impl<'a> From<ListSegment<'a>> for Segment<'a> {
    fn from(segment: ListSegment<'a>) -> Self {
        Segment::List(segment)
    }
}

// ============================================================================
// Index Set
// ============================================================================

/// Ordered union of segments, iterated segment after segment.
#[derive(Debug, Clone, Default)]
pub struct IndexSet<'a> {
    segments: Vec<Segment<'a>>,
    /// Offset at which each segment starts within the set.
    starts: Vec<usize>,
    len: usize,
}

impl<'a> IndexSet<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment to the end of the set.
    pub fn push(&mut self, segment: impl Into<Segment<'a>>) {
        let segment = segment.into();
        self.starts.push(self.len);
        self.len += segment.len();
        self.segments.push(segment);
    }

    pub fn segments(&self) -> &[Segment<'a>] {
        &self.segments
    }
}

impl Iterable for IndexSet<'_> {
    fn len(&self) -> usize {
        self.len
    }

    fn at(&self, offset: usize) -> Index {
        // Last segment starting at or before `offset`; empty segments share a
        // start with their successor and are skipped by taking the last match.
        let slot = self.starts.partition_point(|&start| start <= offset) - 1;
        self.segments[slot].at(offset - self.starts[slot])
    }
}

// ============================================================================
// Tests
// ============================================================================
