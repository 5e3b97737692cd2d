//! Aligned element buffers for data shared with loop bodies.
//!
//! The alignment comes from the injected [`DataLayout`], resolved once where
//! the buffer is allocated. Bodies only ever see a plain slice.

use std::alloc::{self, Layout};
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::config::DataLayout;
use crate::error::{Error, Result};

/// Fixed-length buffer whose first element is aligned to
/// `DataLayout::alignment` bytes.
pub struct AlignedBuffer<T: Copy> {
    /// Null for empty buffers and zero-sized `T`.
    ptr: Option<NonNull<T>>,
    len: usize,
    layout: Layout,
}

impl<T: Copy> AlignedBuffer<T> {
    /// Buffer of `len` copies of `value`.
    pub fn filled(data_layout: &DataLayout, len: usize, value: T) -> Result<Self> {
        let mut buffer = Self::allocate(data_layout, len)?;
        if let Some(ptr) = buffer.ptr {
            for i in 0..len {
                // SAFETY: the allocation holds `len` elements of `T`.
                unsafe { ptr.as_ptr().add(i).write(value) };
            }
        }
        buffer.len = len;
        Ok(buffer)
    }

    /// Buffer holding a copy of `values`.
    pub fn from_slice(data_layout: &DataLayout, values: &[T]) -> Result<Self> {
        let mut buffer = Self::allocate(data_layout, values.len())?;
        if let Some(ptr) = buffer.ptr {
            // SAFETY: fresh allocation of `values.len()` elements, disjoint
            // from `values`.
            unsafe {
                std::ptr::copy_nonoverlapping(values.as_ptr(), ptr.as_ptr(), values.len());
            }
        }
        buffer.len = values.len();
        Ok(buffer)
    }

    fn allocate(data_layout: &DataLayout, len: usize) -> Result<Self> {
        data_layout.validate()?;
        let layout = Layout::array::<T>(len)
            .and_then(|layout| layout.align_to(data_layout.alignment))
            .map_err(|err| Error::InvalidConfig(format!("buffer of {len} elements: {err}")))?;

        let ptr = if layout.size() == 0 {
            None
        } else {
            // SAFETY: `layout` has non-zero size.
            let raw = unsafe { alloc::alloc(layout) };
            match NonNull::new(raw.cast::<T>()) {
                Some(ptr) => Some(ptr),
                None => alloc::handle_alloc_error(layout),
            }
        };

        Ok(Self {
            ptr,
            len: 0,
            layout,
        })
    }

    /// Alignment of the first element, in bytes.
    pub fn alignment(&self) -> usize {
        self.layout.align()
    }
}

impl<T: Copy> Deref for AlignedBuffer<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        match self.ptr {
            // SAFETY: `len` elements were initialized at construction.
            Some(ptr) => unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.len) },
            // SAFETY: nothing was allocated, so `T` is zero-sized or `len` is 0.
            None => unsafe { std::slice::from_raw_parts(NonNull::dangling().as_ptr(), self.len) },
        }
    }
}

impl<T: Copy> DerefMut for AlignedBuffer<T> {
    fn deref_mut(&mut self) -> &mut [T] {
        match self.ptr {
            // SAFETY: as in `deref`; `&mut self` guarantees exclusive access.
            Some(ptr) => unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.len) },
            // SAFETY: as in `deref`.
            None => unsafe {
                std::slice::from_raw_parts_mut(NonNull::dangling().as_ptr(), self.len)
            },
        }
    }
}

impl<T: Copy> Drop for AlignedBuffer<T> {
    fn drop(&mut self) {
        if let Some(ptr) = self.ptr {
            // SAFETY: allocated in `allocate` with exactly `self.layout`.
            unsafe { alloc::dealloc(ptr.as_ptr().cast::<u8>(), self.layout) };
        }
    }
}

impl<T: Copy + fmt::Debug> fmt::Debug for AlignedBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AlignedBuffer")
            .field("alignment", &self.alignment())
            .field("values", &self.deref())
            .finish()
    }
}

// SAFETY: the buffer owns its elements like a `Box<[T]>` does.
unsafe impl<T: Copy + Send> Send for AlignedBuffer<T> {}

// SAFETY: shared access only hands out `&[T]`.
unsafe impl<T: Copy + Sync> Sync for AlignedBuffer<T> {}
