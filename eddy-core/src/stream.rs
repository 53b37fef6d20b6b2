//! Externally driven value streams.
//!
//! A [`ValueStream`] is the asynchronous-enumerable seam of the engine: a
//! pull source whose fetches may be pending. Suspension is an explicit
//! tri-state poll result; there is no hidden continuation capture and no
//! blocking wait. The outer driver re-polls after the transport makes
//! progress.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::value::Value;

/// Result of polling a [`ValueStream`].
#[derive(Debug)]
pub enum StreamPoll {
    /// The next element is available.
    Item(Value),
    /// A fetch is in flight; poll again after the driver makes progress.
    Pending,
    /// The stream is exhausted.
    Done,
}

/// A pull source of values with suspendable fetches.
///
/// Cancellation is cooperative: the engine checks the token only right
/// before starting or resuming a fetch. Once a fetch is in flight it is
/// drained, and cancellation is honored at the next boundary.
pub trait ValueStream {
    /// Produce the next element, or report a pending fetch.
    fn poll_next(&mut self, cancel: &CancelToken) -> StreamPoll;

    /// Release resources held by the stream. Called exactly once by the
    /// engine when the owning top-level write completes or is abandoned.
    fn dispose(&mut self) -> Result<(), DisposeError> {
        Ok(())
    }
}

/// Cloneable cooperative cancellation flag.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    /// Create a token in the not-cancelled state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelToken")
            .field(&self.is_cancelled())
            .finish()
    }
}

/// Error raised while disposing a stream. Disposal errors are aggregated
/// by the engine, never dropped.
#[derive(Debug, Clone)]
pub struct DisposeError {
    /// Description of the disposal failure.
    pub message: String,
}

impl DisposeError {
    /// Create a disposal error from a message.
    pub fn new(message: impl Into<String>) -> Self {
        DisposeError {
            message: message.into(),
        }
    }
}

impl fmt::Display for DisposeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream disposal failed: {}", self.message)
    }
}

impl std::error::Error for DisposeError {}

/// A stream backed by a queue of values, optionally interleaving pending
/// fetches. Mostly useful in tests and as the trivial adapter for sources
/// that are already fully buffered.
pub struct VecStream {
    items: VecDeque<Value>,
    pending_every: usize,
    polls: usize,
    pending_armed: bool,
    pub(crate) disposed: bool,
    dispose_error: Option<String>,
}

impl VecStream {
    /// A stream yielding the given items then `Done`.
    pub fn new(items: Vec<Value>) -> Self {
        VecStream {
            items: items.into(),
            pending_every: 0,
            polls: 0,
            pending_armed: false,
            disposed: false,
            dispose_error: None,
        }
    }

    /// Report `Pending` once before every `n`-th item (n >= 1).
    pub fn pending_every(mut self, n: usize) -> Self {
        self.pending_every = n;
        self
    }

    /// Make `dispose` fail with the given message.
    pub fn fail_disposal(mut self, message: impl Into<String>) -> Self {
        self.dispose_error = Some(message.into());
        self
    }

    /// Whether `dispose` has run.
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

impl ValueStream for VecStream {
    fn poll_next(&mut self, _cancel: &CancelToken) -> StreamPoll {
        if self.items.is_empty() {
            return StreamPoll::Done;
        }
        self.polls += 1;
        if self.pending_every > 0 && !self.pending_armed && self.polls % self.pending_every == 0 {
            self.pending_armed = true;
            return StreamPoll::Pending;
        }
        self.pending_armed = false;
        match self.items.pop_front() {
            Some(item) => StreamPoll::Item(item),
            None => StreamPoll::Done,
        }
    }

    fn dispose(&mut self) -> Result<(), DisposeError> {
        self.disposed = true;
        match self.dispose_error.take() {
            Some(message) => Err(DisposeError::new(message)),
            None => Ok(()),
        }
    }
}
