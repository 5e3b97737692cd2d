//! Launch-shape calculation.
//!
//! The shape of a statement subtree is the minimal worker grid that covers
//! it, extents listed outermost first:
//!
//! ```text
//! For(0, len 4)                       → [4, 3]
//!   For(1, len 3)
//!     Lambda
//!
//! For(0, len 5)                       → [5]
//!   Lambda                              max([], []) extended by 5
//!   Lambda
//!
//! For(0, len 2) ; For(1, len 6)       → [6]
//!
//! For(0, len 0)                       → [0]
//!   Lambda
//! ```
//!
//! Sequential loops contribute no extent; they iterate inside the worker.
//! An empty sequence has the unit shape.

use super::data::KernelData;
use super::{LoopExec, Statement};

/// Worker-grid extents needed to cover a statement subtree.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LaunchShape {
    extents: Vec<usize>,
}

impl LaunchShape {
    /// The trivial shape of a single lambda invocation.
    pub fn unit() -> Self {
        Self::default()
    }

    pub fn from_extents(extents: impl Into<Vec<usize>>) -> Self {
        Self {
            extents: extents.into(),
        }
    }

    /// Extents, outermost first. Empty for the unit shape.
    pub fn extents(&self) -> &[usize] {
        &self.extents
    }

    pub fn rank(&self) -> usize {
        self.extents.len()
    }

    /// Number of workers the shape covers, saturating at `usize::MAX`.
    pub fn size(&self) -> usize {
        self.checked_size().unwrap_or(usize::MAX)
    }

    /// Number of workers the shape covers, or `None` if it overflows.
    pub fn checked_size(&self) -> Option<usize> {
        self.extents
            .iter()
            .try_fold(1usize, |acc, &extent| acc.checked_mul(extent))
    }

    /// Prepend an outer dimension of `len`.
    fn extended(mut self, len: usize) -> Self {
        self.extents.insert(0, len);
        self
    }

    /// Elementwise maximum, aligned at the outermost dimension.
    ///
    /// A missing extent counts as 1.
    pub fn max(&self, other: &Self) -> Self {
        let rank = self.rank().max(other.rank());
        let extents = (0..rank)
            .map(|d| {
                let a = self.extents.get(d).copied().unwrap_or(1);
                let b = other.extents.get(d).copied().unwrap_or(1);
                a.max(b)
            })
            .collect();
        Self { extents }
    }

    /// Row-major coordinates of worker `id`; the last extent varies fastest.
    pub fn coords(&self, id: usize) -> Vec<usize> {
        let mut coords = vec![0; self.rank()];
        let mut rest = id;
        for (coord, &extent) in coords.iter_mut().zip(&self.extents).rev() {
            if extent == 0 {
                continue;
            }
            *coord = rest % extent;
            rest /= extent;
        }
        coords
    }
}

impl Statement {
    /// Shape needed to cover this statement. Never depends on masking.
    pub fn calculate_dimensions<P>(&self, data: &KernelData<'_, P>) -> LaunchShape {
        match self {
            Statement::Lambda { .. } | Statement::Sync => LaunchShape::unit(),
            Statement::For {
                dim,
                exec: LoopExec::Parallel,
                body,
            } => calculate_dimensions(body, data).extended(data.segment_len(*dim)),
            Statement::For {
                exec: LoopExec::Seq,
                body,
                ..
            } => calculate_dimensions(body, data),
        }
    }
}

/// Shape of a statement sequence: the elementwise maximum of its members.
pub fn calculate_dimensions<P>(statements: &[Statement], data: &KernelData<'_, P>) -> LaunchShape {
    statements
        .iter()
        .map(|statement| statement.calculate_dimensions(data))
        .reduce(|acc, shape| acc.max(&shape))
        .unwrap_or_default()
}
