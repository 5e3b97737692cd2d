//! Reduction operators.
//!
//! | Operator | Values | Identity |
//! |----------|--------|----------|
//! | [`Sum`] | numeric | `0` |
//! | [`Min`] | numeric | highest value (`+∞` for floats) |
//! | [`Max`] | numeric | lowest value (`-∞` for floats) |
//! | [`BitAnd`] | integers, `bool` | all bits set |
//! | [`BitOr`] | integers, `bool` | no bits set |
//! | [`LogicalAnd`] | `bool` | `true` |
//! | [`LogicalOr`] | `bool` | `false` |
//! | [`MinLoc`] | [`ValLoc`] | highest value at [`UNDEFINED_VALUE`] |
//! | [`MaxLoc`] | [`ValLoc`] | lowest value at [`UNDEFINED_VALUE`] |
//!
//! Every operator must be associative. Partial results are folded in an
//! order the engine chooses, so floating-point subtraction and similar
//! non-associative folds are a usage error.

use std::ops;

use crate::types::{Index, UNDEFINED_VALUE};

/// Associative combining operator with a neutral element.
pub trait ReduceOperator<T>: Copy + Send + Sync + 'static {
    /// Short name used in logs.
    const NAME: &'static str;

    /// Neutral element: `apply(identity(), x) == x`.
    fn identity() -> T;

    fn apply(a: T, b: T) -> T;
}

/// Numeric types usable with [`Sum`], [`Min`], [`Max`] and the location
/// reductions.
pub trait ReduceValue: Copy + Send + Sync + PartialOrd + ops::Add<Output = Self> + 'static {
    const ZERO: Self;
    /// Identity of `max`.
    const LOWEST: Self;
    /// Identity of `min`.
    const HIGHEST: Self;
}

macro_rules! impl_reduce_value_int {
    ($($t:ty),*) => {
        $(impl ReduceValue for $t {
            const ZERO: Self = 0;
            const LOWEST: Self = <$t>::MIN;
            const HIGHEST: Self = <$t>::MAX;
        })*
    };
}

macro_rules! impl_reduce_value_float {
    ($($t:ty),*) => {
        $(impl ReduceValue for $t {
            const ZERO: Self = 0.0;
            const LOWEST: Self = <$t>::NEG_INFINITY;
            const HIGHEST: Self = <$t>::INFINITY;
        })*
    };
}

impl_reduce_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);
impl_reduce_value_float!(f32, f64);

// ============================================================================
// Arithmetic and Comparison
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct Sum;

impl<T: ReduceValue> ReduceOperator<T> for Sum {
    const NAME: &'static str = "sum";

    fn identity() -> T {
        T::ZERO
    }

    fn apply(a: T, b: T) -> T {
        a + b
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Min;

impl<T: ReduceValue> ReduceOperator<T> for Min {
    const NAME: &'static str = "min";

    fn identity() -> T {
        T::HIGHEST
    }

    fn apply(a: T, b: T) -> T {
        if b < a { b } else { a }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Max;

impl<T: ReduceValue> ReduceOperator<T> for Max {
    const NAME: &'static str = "max";

    fn identity() -> T {
        T::LOWEST
    }

    fn apply(a: T, b: T) -> T {
        if b > a { b } else { a }
    }
}

// ============================================================================
// Bitwise and Logical
// ============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct BitAnd;

impl<T> ReduceOperator<T> for BitAnd
where
    T: Copy + Default + Send + Sync + ops::BitAnd<Output = T> + ops::Not<Output = T> + 'static,
{
    const NAME: &'static str = "bit_and";

    fn identity() -> T {
        !T::default()
    }

    fn apply(a: T, b: T) -> T {
        a & b
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BitOr;

impl<T> ReduceOperator<T> for BitOr
where
    T: Copy + Default + Send + Sync + ops::BitOr<Output = T> + 'static,
{
    const NAME: &'static str = "bit_or";

    fn identity() -> T {
        T::default()
    }

    fn apply(a: T, b: T) -> T {
        a | b
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalAnd;

impl ReduceOperator<bool> for LogicalAnd {
    const NAME: &'static str = "logical_and";

    fn identity() -> bool {
        true
    }

    fn apply(a: bool, b: bool) -> bool {
        a && b
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LogicalOr;

impl ReduceOperator<bool> for LogicalOr {
    const NAME: &'static str = "logical_or";

    fn identity() -> bool {
        false
    }

    fn apply(a: bool, b: bool) -> bool {
        a || b
    }
}

// ============================================================================
// Location Reductions
// ============================================================================

/// A value together with the index it was found at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ValLoc<T> {
    pub value: T,
    pub loc: Index,
}

impl<T> ValLoc<T> {
    pub fn new(value: T, loc: Index) -> Self {
        Self { value, loc }
    }
}

/// Whether `b` beats `a` on a value tie: lower locations win, and an
/// undefined location loses to any defined one.
fn loc_wins(a: Index, b: Index) -> bool {
    match (a == UNDEFINED_VALUE, b == UNDEFINED_VALUE) {
        (_, true) => false,
        (true, false) => true,
        (false, false) => b < a,
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MinLoc;

impl<T: ReduceValue> ReduceOperator<ValLoc<T>> for MinLoc {
    const NAME: &'static str = "min_loc";

    fn identity() -> ValLoc<T> {
        ValLoc::new(T::HIGHEST, UNDEFINED_VALUE)
    }

    fn apply(a: ValLoc<T>, b: ValLoc<T>) -> ValLoc<T> {
        if b.value < a.value || (b.value == a.value && loc_wins(a.loc, b.loc)) {
            b
        } else {
            a
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MaxLoc;

impl<T: ReduceValue> ReduceOperator<ValLoc<T>> for MaxLoc {
    const NAME: &'static str = "max_loc";

    fn identity() -> ValLoc<T> {
        ValLoc::new(T::LOWEST, UNDEFINED_VALUE)
    }

    fn apply(a: ValLoc<T>, b: ValLoc<T>) -> ValLoc<T> {
        if b.value > a.value || (b.value == a.value && loc_wins(a.loc, b.loc)) {
            b
        } else {
            a
        }
    }
}
