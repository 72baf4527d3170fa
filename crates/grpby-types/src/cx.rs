//! Cancellation context (`Cx`) threaded through a group-by run.
//!
//! The operator calls [`Cx::checkpoint`] between rows. Any clone of the
//! context can request cancellation from another thread; the next
//! checkpoint then fails and the operator tears down its spill file.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

/// Reason for cancellation, ordered from weakest to strongest.
///
/// Multiple cancel requests are monotone: the strongest reason wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CancelReason {
    Timeout = 0,
    UserInterrupt = 1,
    Abort = 2,
}

/// Error returned by [`Cx::checkpoint`] once cancellation was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    pub reason: CancelReason,
}

#[derive(Debug)]
struct CxInner {
    cancel_requested: AtomicBool,
    cancel_reason: Mutex<Option<CancelReason>>,
    last_checkpoint_msg: Mutex<Option<String>>,
}

/// Shared cancellation handle.
#[derive(Debug, Clone)]
pub struct Cx {
    inner: Arc<CxInner>,
}

impl Default for Cx {
    fn default() -> Self {
        Self::new()
    }
}

impl Cx {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(CxInner {
                cancel_requested: AtomicBool::new(false),
                cancel_reason: Mutex::new(None),
                last_checkpoint_msg: Mutex::new(None),
            }),
        }
    }

    #[must_use]
    pub fn is_cancel_requested(&self) -> bool {
        self.inner.cancel_requested.load(Ordering::Acquire)
    }

    /// Request cancellation with the default reason (`UserInterrupt`).
    pub fn cancel(&self) {
        self.cancel_with_reason(CancelReason::UserInterrupt);
    }

    /// Request cancellation with an explicit reason.
    pub fn cancel_with_reason(&self, reason: CancelReason) {
        self.inner.cancel_requested.store(true, Ordering::Release);
        let mut r = self.inner.cancel_reason.lock();
        match *r {
            Some(existing) if existing >= reason => {}
            _ => *r = Some(reason),
        }
    }

    /// The strongest cancellation reason set so far, if any.
    #[must_use]
    pub fn cancel_reason(&self) -> Option<CancelReason> {
        *self.inner.cancel_reason.lock()
    }

    /// Fail if cancellation was requested.
    pub fn checkpoint(&self) -> Result<(), Cancelled> {
        if !self.inner.cancel_requested.load(Ordering::Acquire) {
            return Ok(());
        }
        Err(Cancelled {
            reason: self.cancel_reason().unwrap_or(CancelReason::UserInterrupt),
        })
    }

    /// Check for cancellation and record a progress message.
    pub fn checkpoint_with(&self, msg: impl Into<String>) -> Result<(), Cancelled> {
        *self.inner.last_checkpoint_msg.lock() = Some(msg.into());
        self.checkpoint()
    }

    #[must_use]
    pub fn last_checkpoint_message(&self) -> Option<String> {
        self.inner.last_checkpoint_msg.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_context_passes_checkpoint() {
        let cx = Cx::new();
        assert!(!cx.is_cancel_requested());
        assert!(cx.checkpoint().is_ok());
    }

    #[test]
    fn cancel_is_seen_by_clones() {
        let cx = Cx::new();
        let other = cx.clone();
        other.cancel();
        assert!(cx.is_cancel_requested());
        assert_eq!(
            cx.checkpoint(),
            Err(Cancelled {
                reason: CancelReason::UserInterrupt
            })
        );
    }

    #[test]
    fn strongest_reason_wins() {
        let cx = Cx::new();
        cx.cancel_with_reason(CancelReason::Abort);
        cx.cancel_with_reason(CancelReason::Timeout);
        assert_eq!(cx.cancel_reason(), Some(CancelReason::Abort));
    }

    #[test]
    fn checkpoint_message_recorded() {
        let cx = Cx::new();
        cx.checkpoint_with("row 10").unwrap();
        assert_eq!(cx.last_checkpoint_message().as_deref(), Some("row 10"));
    }
}
