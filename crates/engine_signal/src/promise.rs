//! Cancellable asynchronous tasks.
//!
//! A [`Promise`] is the cancellation side of a future; the future side is
//! returned alongside it and is driven by a single-threaded executor (a
//! `LocalSet`, `block_on`). Cancelling the promise resolves the future with
//! [`Cancelled`] at its next poll.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::FutureExt;
use futures::future::{AbortHandle, Abortable};
use tracing::debug;

use crate::cleanup::{self, CANCEL, Cleanup, CleanupError};

/// The future was cancelled before it completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("promise was cancelled")]
pub struct Cancelled;

#[derive(Default)]
struct PromiseState {
    settled: Cell<bool>,
    finished: Cell<bool>,
    on_finish: RefCell<Vec<Box<dyn FnOnce()>>>,
}

impl PromiseState {
    /// Mark the promise finished and run its finish callbacks, once.
    fn finish(&self) {
        if self.finished.replace(true) {
            return;
        }
        let callbacks = std::mem::take(&mut *self.on_finish.borrow_mut());
        for callback in callbacks {
            callback();
        }
    }
}

/// Handle used to cancel an in-flight future.
#[derive(Clone)]
pub struct Promise {
    handle: AbortHandle,
    state: Rc<PromiseState>,
}

impl Promise {
    /// Wrap `future` so it can be cancelled through the returned [`Promise`].
    ///
    /// The wrapped future resolves to `Ok(output)` when `future` completes,
    /// or `Err(Cancelled)` if the promise was cancelled first.
    pub fn new<F>(future: F) -> (Self, impl Future<Output = Result<F::Output, Cancelled>>)
    where
        F: Future,
    {
        let (handle, registration) = AbortHandle::new_pair();
        let state = Rc::new(PromiseState::default());
        let shared = Rc::clone(&state);

        let wrapped = Abortable::new(future, registration).map(move |result| {
            shared.settled.set(true);
            shared.finish();
            result.map_err(|_| Cancelled)
        });

        (Self { handle, state }, wrapped)
    }

    /// Cancel the future. No effect once it has settled.
    pub fn cancel(&self) {
        if self.is_settled() {
            return;
        }
        debug!("cancelling promise");
        self.handle.abort();
        self.state.finish();
    }

    /// Returns `true` if [`Promise::cancel`] took effect.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.handle.is_aborted()
    }

    /// Returns `true` once the wrapped future has resolved, either way.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        self.state.settled.get()
    }

    /// Returns `true` once the promise has settled or been cancelled.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.state.finished.get()
    }

    /// Run `callback` when the promise settles or is cancelled, whichever
    /// comes first. Runs immediately if that already happened.
    pub fn on_finish(&self, callback: impl FnOnce() + 'static) {
        if self.is_finished() {
            callback();
            return;
        }
        self.state.on_finish.borrow_mut().push(Box::new(callback));
    }
}

impl fmt::Debug for Promise {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Promise")
            .field("settled", &self.is_settled())
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

impl Cleanup for Promise {
    fn default_method(&self) -> Option<&'static str> {
        Some(CANCEL)
    }

    fn supports(&self, method: &str) -> bool {
        method == CANCEL
    }

    fn cleanup(&self, method: &str) -> Result<(), CleanupError> {
        match method {
            CANCEL => {
                self.cancel();
                Ok(())
            }
            other => Err(cleanup::unknown(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn test_promise_resolves() {
        let (promise, future) = Promise::new(async { 21 * 2 });
        assert!(!promise.is_settled());
        assert_eq!(block_on(future), Ok(42));
        assert!(promise.is_settled());
        assert!(!promise.is_cancelled());
    }

    #[test]
    fn test_cancel_before_poll() {
        let (promise, future) = Promise::new(async { "never" });
        promise.cleanup(CANCEL).unwrap();
        assert!(promise.is_cancelled());
        assert_eq!(block_on(future), Err(Cancelled));
        assert!(promise.is_settled());
    }

    #[test]
    fn test_cancel_after_settle_is_noop() {
        let (promise, future) = Promise::new(async { 1 });
        assert_eq!(block_on(future), Ok(1));
        promise.cancel();
        assert!(!promise.is_cancelled());
    }

    #[test]
    fn test_on_finish_runs_once_on_settle() {
        let (promise, future) = Promise::new(async {});
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        promise.on_finish(move || counter.set(counter.get() + 1));

        block_on(future).unwrap();
        promise.cancel();
        assert!(promise.is_finished());
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_on_finish_runs_on_cancel_without_poll() {
        let (promise, _future) = Promise::new(futures::future::pending::<()>());
        let hits = Rc::new(Cell::new(0));
        let counter = Rc::clone(&hits);
        promise.on_finish(move || counter.set(counter.get() + 1));

        promise.cancel();
        promise.cancel();
        assert_eq!(hits.get(), 1);
        assert!(promise.is_finished());
        assert!(!promise.is_settled());

        let late = Rc::clone(&hits);
        promise.on_finish(move || late.set(late.get() + 10));
        assert_eq!(hits.get(), 11);
    }

    #[test]
    fn test_cancel_pending_future() {
        let (promise, future) = Promise::new(futures::future::pending::<()>());
        promise.cancel();
        assert_eq!(block_on(future), Err(Cancelled));
    }
}
