#![forbid(unsafe_code)]

//! Reactive primitives for ripple.
//!
//! - [`Signal`]: a writable, version-tracked cell with change notification.
//! - [`Computed`]: a lazily recomputed value derived from other sources.
//! - [`Effect`]: a side-effecting observer re-run when its dependencies change.
//! - [`batch`] / [`BatchScope`]: coalesce writes so each observer runs once.
//! - [`Subscription`]: RAII disposer for a listener registration.
//! - [`ReadSignal`]: a type-erased read-only view over a signal or computed.
//!
//! # Architecture
//!
//! All primitives use `Rc`-based shared ownership and a thread-local runtime
//! (see [`runtime`]) that records which observer is currently executing.
//! Reads through `get()` register that observer as a dependent; `peek()` and
//! [`untracked`] bypass tracking.
//!
//! # Invariants
//!
//! 1. Writing a value equal (`PartialEq`) to the current one never notifies.
//! 2. Listeners run in registration order over a snapshot taken when the
//!    notification starts.
//! 3. A panicking listener never prevents its siblings from running.
//! 4. Inside a batch each listener is notified at most once, with the final
//!    value, and each effect runs at most once.

pub mod batch;
pub mod computed;
pub mod effect;
mod listeners;
pub mod runtime;
pub mod signal;
pub mod subscription;

pub use batch::{BatchScope, batch};
pub use computed::{Computed, computed};
pub use effect::{Cleanup, Effect, IntoCleanup, effect};
pub use runtime::{batch_depth, is_tracking, panic_message, untracked};
pub use signal::{ReadSignal, Readable, Signal, signal};
pub use subscription::Subscription;
