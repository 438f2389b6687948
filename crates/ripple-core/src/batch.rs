#![forbid(unsafe_code)]

//! Update batching.
//!
//! Inside a batch, signal writes take effect immediately but notifications
//! are deferred. When the outermost batch closes, each written signal
//! notifies once with its final value, and every effect scheduled by those
//! notifications runs once.
//!
//! Nested scopes are supported; only the outermost one flushes.

use std::marker::PhantomData;

use crate::runtime;

/// RAII guard that defers notifications until it is dropped.
#[must_use = "notifications flush when the scope is dropped"]
pub struct BatchScope {
    // Batches are bound to the thread-local runtime.
    _not_send: PhantomData<*const ()>,
}

impl BatchScope {
    /// Open a batch.
    pub fn new() -> Self {
        runtime::enter_batch();
        Self {
            _not_send: PhantomData,
        }
    }

    /// Current nesting depth.
    #[must_use]
    pub fn depth() -> usize {
        runtime::batch_depth()
    }
}

impl Default for BatchScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BatchScope {
    fn drop(&mut self) {
        runtime::exit_batch();
    }
}

impl std::fmt::Debug for BatchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchScope")
            .field("depth", &runtime::batch_depth())
            .finish()
    }
}

/// Run `f` inside a batch and return its result.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    let _scope = BatchScope::new();
    f()
}
