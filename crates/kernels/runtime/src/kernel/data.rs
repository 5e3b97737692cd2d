//! Kernel execution context and argument binding.

use crate::segment::{Iterable, Segment};
use crate::types::{Index, UNDEFINED_VALUE};

use super::Arg;

// ============================================================================
// Arguments
// ============================================================================

/// One bound lambda argument.
#[derive(Debug)]
pub enum ArgValue<'a, P> {
    /// A segment index or segment offset.
    Index(Index),
    /// A kernel parameter.
    Param(&'a P),
}

impl<P> Clone for ArgValue<'_, P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for ArgValue<'_, P> {}

/// Ordered argument list handed to a lambda.
#[derive(Debug)]
pub struct Args<'a, P = ()> {
    values: &'a [ArgValue<'a, P>],
}

impl<'a, P> Args<'a, P> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, position: usize) -> Option<&ArgValue<'a, P>> {
        self.values.get(position)
    }

    /// Index bound at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of range or binds a parameter.
    pub fn index(&self, position: usize) -> Index {
        match self.values[position] {
            ArgValue::Index(index) => index,
            ArgValue::Param(_) => panic!("argument {position} binds a parameter, not an index"),
        }
    }

    /// Parameter bound at `position`.
    ///
    /// # Panics
    ///
    /// Panics if `position` is out of range or binds an index.
    pub fn param(&self, position: usize) -> &'a P {
        match self.values[position] {
            ArgValue::Param(param) => param,
            ArgValue::Index(_) => panic!("argument {position} binds an index, not a parameter"),
        }
    }

    /// All bound indices, in argument order. Parameters are skipped.
    pub fn indices(&self) -> impl Iterator<Item = Index> + '_ {
        self.values.iter().filter_map(|value| match value {
            ArgValue::Index(index) => Some(*index),
            ArgValue::Param(_) => None,
        })
    }
}

// ============================================================================
// Lambda Table
// ============================================================================

/// The callables a kernel's Lambda statements refer to by position.
pub trait LambdaTable<P>: Sync {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Invoke lambda `index`. Callers validate `index < self.len()`.
    fn invoke(&self, index: usize, args: &Args<'_, P>);
}

macro_rules! impl_lambda_table_tuple {
    ($len:expr; $($name:ident $idx:tt),+) => {
        impl<P, $($name),+> LambdaTable<P> for ($($name,)+)
        where
            $($name: Fn(&Args<'_, P>) + Sync,)+
        {
            fn len(&self) -> usize {
                $len
            }

            fn invoke(&self, index: usize, args: &Args<'_, P>) {
                match index {
                    $($idx => (self.$idx)(args),)+
                    _ => {}
                }
            }
        }
    };
}

impl_lambda_table_tuple!(1; A 0);
impl_lambda_table_tuple!(2; A 0, B 1);
impl_lambda_table_tuple!(3; A 0, B 1, C 2);
impl_lambda_table_tuple!(4; A 0, B 1, C 2, D 3);
impl_lambda_table_tuple!(5; A 0, B 1, C 2, D 3, E 4);
impl_lambda_table_tuple!(6; A 0, B 1, C 2, D 3, E 4, F 5);
impl_lambda_table_tuple!(7; A 0, B 1, C 2, D 3, E 4, F 5, G 6);
impl_lambda_table_tuple!(8; A 0, B 1, C 2, D 3, E 4, F 5, G 6, H 7);

/// Boxed lambdas, for tables assembled at runtime.
pub type BoxedLambda<'f, P> = Box<dyn Fn(&Args<'_, P>) + Sync + 'f>;

impl<P> LambdaTable<P> for Vec<BoxedLambda<'_, P>> {
    fn len(&self) -> usize {
        Vec::len(self)
    }

    fn invoke(&self, index: usize, args: &Args<'_, P>) {
        (self[index])(args)
    }
}

// ============================================================================
// Context
// ============================================================================

/// Live bindings of one worker's kernel walk.
///
/// Holds the current offset of every dimension, plus read-only access to the
/// segments and parameters. Each worker walks the statement tree with its
/// own copy; nothing here outlives one launch.
#[derive(Debug)]
pub struct KernelData<'k, P> {
    segments: &'k [Segment<'k>],
    params: &'k [P],
    offsets: Vec<usize>,
    scratch: Vec<ArgValue<'k, P>>,
}

/// Offset of a dimension no enclosing loop binds.
const UNBOUND: usize = usize::MAX;

impl<'k, P> KernelData<'k, P> {
    pub(crate) fn new(segments: &'k [Segment<'k>], params: &'k [P]) -> Self {
        Self {
            segments,
            params,
            offsets: vec![UNBOUND; segments.len()],
            scratch: Vec::new(),
        }
    }

    pub fn dims(&self) -> usize {
        self.segments.len()
    }

    /// Length of the segment bound to `dim`.
    pub fn segment_len(&self, dim: usize) -> usize {
        self.segments[dim].len()
    }

    /// Current index of `dim`, or [`UNDEFINED_VALUE`] when no loop binds it
    /// or its offset lies past the segment end.
    pub fn index(&self, dim: usize) -> Index {
        let offset = self.offsets[dim];
        let segment = &self.segments[dim];
        if offset < segment.len() {
            segment.at(offset)
        } else {
            UNDEFINED_VALUE
        }
    }

    /// Current offset of `dim` within its segment, or [`UNDEFINED_VALUE`].
    pub fn offset(&self, dim: usize) -> Index {
        let offset = self.offsets[dim];
        if offset < self.segments[dim].len() {
            offset as Index
        } else {
            UNDEFINED_VALUE
        }
    }

    pub(crate) fn set_offset(&mut self, dim: usize, offset: usize) {
        self.offsets[dim] = offset;
    }

    pub(crate) fn unbind(&mut self, dim: usize) {
        self.offsets[dim] = UNBOUND;
    }

    fn resolve(&self, arg: &Arg) -> ArgValue<'k, P> {
        match *arg {
            Arg::Seg(dim) => ArgValue::Index(self.index(dim)),
            Arg::Offset(dim) => ArgValue::Index(self.offset(dim)),
            Arg::Param(i) => ArgValue::Param(&self.params[i]),
        }
    }

    /// Bind the argument list and call lambda `index`.
    ///
    /// With no descriptors, every segment index is passed in dimension order.
    pub(crate) fn invoke<L>(&mut self, lambdas: &L, index: usize, args: Option<&[Arg]>)
    where
        L: LambdaTable<P> + ?Sized,
    {
        self.scratch.clear();
        match args {
            None => {
                for dim in 0..self.segments.len() {
                    let value = ArgValue::Index(self.index(dim));
                    self.scratch.push(value);
                }
            }
            Some(args) => {
                for arg in args {
                    let value = self.resolve(arg);
                    self.scratch.push(value);
                }
            }
        }
        lambdas.invoke(index, &Args { values: &self.scratch });
    }
}

impl<P> Clone for KernelData<'_, P> {
    fn clone(&self) -> Self {
        Self {
            segments: self.segments,
            params: self.params,
            offsets: self.offsets.clone(),
            scratch: Vec::with_capacity(self.scratch.capacity()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::segment::{ListSegment, RangeSegment};

    #[test]
    fn test_unbound_dimensions_are_undefined() {
        let segments = [Segment::from(RangeSegment::new(10, 13))];
        let mut data = KernelData::<()>::new(&segments, &[]);
        assert_eq!(data.index(0), UNDEFINED_VALUE);

        data.set_offset(0, 2);
        assert_eq!(data.index(0), 12);
        assert_eq!(data.offset(0), 2);

        data.set_offset(0, 3);
        assert_eq!(data.index(0), UNDEFINED_VALUE);
    }

    #[test]
    fn test_invoke_binds_descriptors_in_order() {
        let segments = [
            Segment::from(RangeSegment::new(0, 4)),
            Segment::from(ListSegment::owned(vec![7, 8, 9])),
        ];
        let params = [2.5_f64, -1.0];
        let seen = Mutex::new(Vec::new());
        let lambdas = (|args: &Args<'_, f64>| {
            seen.lock()
                .unwrap()
                .push((args.index(0), args.index(1), *args.param(2), args.len()));
        },);

        let mut data = KernelData::new(&segments, &params);
        data.set_offset(0, 3);
        data.set_offset(1, 1);
        data.invoke(&lambdas, 0, Some(&[Arg::Seg(1), Arg::Offset(0), Arg::Param(1)]));

        assert_eq!(seen.into_inner().unwrap(), vec![(8, 3, -1.0, 3)]);
    }

    #[test]
    fn test_invoke_without_descriptors_passes_all_indices() {
        let segments = [
            Segment::from(RangeSegment::new(5, 6)),
            Segment::from(RangeSegment::new(0, 2)),
        ];
        let seen = Mutex::new(Vec::new());
        let lambdas: Vec<BoxedLambda<'_, ()>> = vec![Box::new(|args: &Args<'_>| {
            seen.lock().unwrap().push(args.indices().collect::<Vec<_>>());
        })];

        let mut data = KernelData::new(&segments, &[]);
        data.set_offset(0, 0);
        data.set_offset(1, 1);
        data.invoke(&lambdas, 0, None);

        assert_eq!(LambdaTable::<()>::len(&lambdas), 1);
        drop(lambdas);
        assert_eq!(seen.into_inner().unwrap(), vec![vec![5, 1]]);
    }

    #[test]
    #[should_panic(expected = "binds a parameter")]
    fn test_index_accessor_rejects_param() {
        let value = 1u8;
        let values = [ArgValue::Param(&value)];
        let args = Args { values: &values };
        args.index(0);
    }
}
