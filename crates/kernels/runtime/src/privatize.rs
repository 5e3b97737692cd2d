//! Worker privatization of loop bodies.
//!
//! Concurrent workers must not share mutable closure state by accident. A
//! [`LoopBody`] hands each chunk of work its own callable:
//!
//! - [`Shared`] wraps a stateless `Fn` body; every worker borrows the same
//!   closure, nothing is copied.
//! - [`Private`] wraps a stateful `FnMut + Clone` body; every chunk gets a
//!   fresh clone, so scratch state captured by value never leaks between
//!   workers. Data the body only reads should be captured by reference, so
//!   the clone stays a cheap handle onto the caller's data.

/// A loop body that can produce a per-worker callable.
pub trait LoopBody<T>: Sync {
    /// Callable owned by one worker for the duration of one chunk.
    type Worker<'a>: FnMut(T)
    where
        Self: 'a;

    /// Produce the callable for one chunk of work.
    fn privatize(&self) -> Self::Worker<'_>;
}

/// Stateless body shared by reference between workers.
#[derive(Debug, Clone, Copy)]
pub struct Shared<F>(pub F);

impl<T, F> LoopBody<T> for Shared<F>
where
    F: Fn(T) + Sync,
{
    type Worker<'a>
        = &'a F
    where
        Self: 'a;

    fn privatize(&self) -> &F {
        &self.0
    }
}

/// Stateful body cloned once per chunk.
#[derive(Debug, Clone)]
pub struct Private<F>(pub F);

impl<T, F> LoopBody<T> for Private<F>
where
    F: FnMut(T) + Clone + Sync,
{
    type Worker<'a>
        = F
    where
        Self: 'a;

    fn privatize(&self) -> F {
        self.0.clone()
    }
}
