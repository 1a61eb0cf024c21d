//! Pending Operation Module
//!
//! Handle returned by the asynchronous cache operations.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::task::JoinHandle;

use crate::error::{CacheError, Result};

// == Pending ==
/// Completion handle for a cache operation running on the scheduler.
///
/// Resolves to the operation's own result. If the work panicked or the
/// runtime dropped it, resolves to [`CacheError::TaskFailed`].
#[must_use = "the operation runs regardless, but its result is only observed by awaiting"]
#[derive(Debug)]
pub struct Pending<T> {
    handle: JoinHandle<Result<T>>,
}

impl<T> Pending<T> {
    pub(crate) fn new(handle: JoinHandle<Result<T>>) -> Self {
        Self { handle }
    }

    /// Returns true once the underlying work has completed.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

impl<T> Future for Pending<T> {
    type Output = Result<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.handle).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(join_error)) => {
                let message = if join_error.is_panic() {
                    CacheError::panic_message(join_error.into_panic().as_ref())
                } else {
                    join_error.to_string()
                };
                Poll::Ready(Err(CacheError::TaskFailed(message)))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}
