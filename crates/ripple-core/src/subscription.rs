#![forbid(unsafe_code)]

//! Disposers for listener registrations.
//!
//! A [`Subscription`] owns the teardown of one registration: a signal
//! listener, an effect's dependency edge, a property binding, or any other
//! resource a caller wants released exactly once.
//!
//! # Invariants
//!
//! 1. The dispose function runs at most once, whether through
//!    [`dispose()`](Subscription::dispose) or `Drop`.
//! 2. Disposing twice is a no-op.
//! 3. [`detach()`](Subscription::detach) discards the dispose function without
//!    running it; the registration then lives as long as its source.

use std::cell::RefCell;
use std::fmt;

/// RAII guard that releases a registration on drop.
pub struct Subscription {
    dispose: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    /// Wrap a dispose function.
    pub fn new(dispose: impl FnOnce() + 'static) -> Self {
        Self {
            dispose: RefCell::new(Some(Box::new(dispose))),
        }
    }

    /// A subscription that owns nothing. Already disposed.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            dispose: RefCell::new(None),
        }
    }

    /// Release the registration. Safe to call any number of times.
    pub fn dispose(&self) {
        let dispose = self.dispose.borrow_mut().take();
        if let Some(dispose) = dispose {
            dispose();
        }
    }

    /// Whether the registration has already been released.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.dispose.borrow().is_none()
    }

    /// Keep the registration alive for the lifetime of its source.
    pub fn detach(self) {
        drop(self.dispose.borrow_mut().take());
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.is_disposed())
            .finish()
    }
}
