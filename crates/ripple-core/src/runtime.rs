#![forbid(unsafe_code)]

//! Thread-local reactive runtime: dependency tracking and batch queues.
//!
//! The runtime holds three pieces of state per thread:
//!
//! - a stack of tracking frames; the top frame (if any) collects every
//!   [`Source`] read while an effect or computed value is executing,
//! - the batch depth plus the sources whose notifications were deferred,
//! - the queue of effects scheduled while a batch was open.
//!
//! Reactivity is single-threaded and cooperative. Nothing here is `Send`;
//! every signal, effect and computed value belongs to the thread that created
//! it.
//!
//! # Invariants
//!
//! 1. A tracking frame records each source at most once per run.
//! 2. An untracked frame hides all enclosing frames.
//! 3. Deferred sources are flushed in first-write order, each at most once per
//!    flush round.
//! 4. Scheduled effects are de-duplicated by id; each runs at most once per
//!    outermost batch.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

use ahash::AHashSet;

use crate::subscription::Subscription;

/// Upper bound on flush rounds before the runtime gives up on a batch.
///
/// A round is one pass over deferred sources or scheduled effects. Exceeding
/// the bound means listeners keep writing to each other without settling.
pub const MAX_FLUSH_ROUNDS: usize = 10_000;

static NEXT_REACTIVE_ID: AtomicU64 = AtomicU64::new(1);

/// Allocate a process-unique id for a signal, computed value, effect or
/// listener.
pub(crate) fn next_id() -> u64 {
    NEXT_REACTIVE_ID.fetch_add(1, Ordering::Relaxed)
}

// ---------------------------------------------------------------------------
// Source / pending / scheduled seams
// ---------------------------------------------------------------------------

/// Something an observer can depend on.
pub(crate) trait Source {
    fn source_id(&self) -> u64;

    /// Register `on_change` to run whenever the source notifies.
    fn subscribe_change(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Subscription;
}

/// A source with a notification deferred by an open batch.
pub(crate) trait Pending {
    fn flush_pending(&self);
}

/// An observer that can be queued for execution.
pub(crate) trait Scheduled {
    fn scheduled_id(&self) -> u64;
    fn run_scheduled(self: Rc<Self>);
}

// ---------------------------------------------------------------------------
// Runtime state
// ---------------------------------------------------------------------------

/// Dependencies collected during one tracked run.
#[derive(Default)]
pub(crate) struct TrackingFrame {
    deps: Vec<Rc<dyn Source>>,
    seen: AHashSet<u64>,
}

impl TrackingFrame {
    pub(crate) fn into_deps(self) -> Vec<Rc<dyn Source>> {
        self.deps
    }
}

#[derive(Default)]
struct Runtime {
    /// `None` marks an untracked region.
    frames: RefCell<Vec<Option<TrackingFrame>>>,
    batch_depth: Cell<usize>,
    pending_sources: RefCell<Vec<Rc<dyn Pending>>>,
    pending_source_ids: RefCell<AHashSet<u64>>,
    pending_effects: RefCell<VecDeque<Rc<dyn Scheduled>>>,
    pending_effect_ids: RefCell<AHashSet<u64>>,
}

thread_local! {
    static RUNTIME: Runtime = Runtime::default();
}

// ---------------------------------------------------------------------------
// Tracking
// ---------------------------------------------------------------------------

/// Record a read of the source identified by `id` in the active frame.
///
/// `source` is only invoked when a tracking frame is active and the source
/// was not already recorded, so untracked reads never clone the handle.
pub(crate) fn track(id: u64, source: impl FnOnce() -> Rc<dyn Source>) {
    RUNTIME.with(|rt| {
        let mut frames = rt.frames.borrow_mut();
        if let Some(Some(frame)) = frames.last_mut()
            && frame.seen.insert(id)
        {
            frame.deps.push(source());
        }
    });
}

/// Pops its frame on drop so a panicking observer never leaves a stale frame
/// on the stack.
struct FrameGuard {
    frame: Option<TrackingFrame>,
    popped: bool,
}

impl FrameGuard {
    fn push(frame: Option<TrackingFrame>) -> Self {
        RUNTIME.with(|rt| rt.frames.borrow_mut().push(frame));
        Self {
            frame: None,
            popped: false,
        }
    }

    fn pop(&mut self) {
        if !self.popped {
            self.popped = true;
            self.frame = RUNTIME.with(|rt| rt.frames.borrow_mut().pop().flatten());
        }
    }
}

impl Drop for FrameGuard {
    fn drop(&mut self) {
        self.pop();
    }
}

/// Run `f` inside a fresh tracking frame and return its result together with
/// every source it read.
pub(crate) fn with_tracking<R>(f: impl FnOnce() -> R) -> (R, TrackingFrame) {
    let mut guard = FrameGuard::push(Some(TrackingFrame::default()));
    let result = f();
    guard.pop();
    (result, guard.frame.take().unwrap_or_default())
}

/// Run `f` without attributing its reads to the enclosing effect or computed
/// value.
pub fn untracked<R>(f: impl FnOnce() -> R) -> R {
    let _guard = FrameGuard::push(None);
    f()
}

/// Whether a tracked observer is currently executing.
#[must_use]
pub fn is_tracking() -> bool {
    RUNTIME.with(|rt| matches!(rt.frames.borrow().last(), Some(Some(_))))
}

// ---------------------------------------------------------------------------
// Batching
// ---------------------------------------------------------------------------

/// Current batch nesting depth (0 when no batch is open).
#[must_use]
pub fn batch_depth() -> usize {
    RUNTIME.with(|rt| rt.batch_depth.get())
}

pub(crate) fn in_batch() -> bool {
    batch_depth() > 0
}

pub(crate) fn enter_batch() {
    RUNTIME.with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
}

/// Leave one batch level; the outermost exit flushes.
pub(crate) fn exit_batch() {
    let outermost = RUNTIME.with(|rt| {
        let depth = rt.batch_depth.get().saturating_sub(1);
        // Stay "inside" while flushing sources so their listeners queue
        // effects instead of running them.
        if depth == 0 {
            true
        } else {
            rt.batch_depth.set(depth);
            false
        }
    });
    if outermost {
        flush();
    }
}

/// Defer the notification of source `id` until the outermost batch exits.
pub(crate) fn defer(id: u64, pending: impl FnOnce() -> Rc<dyn Pending>) {
    RUNTIME.with(|rt| {
        if rt.pending_source_ids.borrow_mut().insert(id) {
            rt.pending_sources.borrow_mut().push(pending());
        }
    });
}

/// Run `observer` now, or queue it when a batch is open.
pub(crate) fn schedule(observer: Rc<dyn Scheduled>) {
    if in_batch() {
        RUNTIME.with(|rt| {
            if rt
                .pending_effect_ids
                .borrow_mut()
                .insert(observer.scheduled_id())
            {
                rt.pending_effects.borrow_mut().push_back(observer);
            }
        });
    } else {
        observer.run_scheduled();
    }
}

fn flush() {
    // Phase 1: deliver deferred notifications with final values. Depth is
    // still 1, so effects triggered here are queued.
    let mut rounds = 0usize;
    loop {
        let sources = RUNTIME.with(|rt| {
            rt.pending_source_ids.borrow_mut().clear();
            std::mem::take(&mut *rt.pending_sources.borrow_mut())
        });
        if sources.is_empty() {
            break;
        }
        rounds += 1;
        if rounds > MAX_FLUSH_ROUNDS {
            tracing::error!(
                limit = MAX_FLUSH_ROUNDS,
                "batch flush did not settle; dropping remaining notifications"
            );
            break;
        }
        for source in sources {
            source.flush_pending();
        }
    }

    RUNTIME.with(|rt| rt.batch_depth.set(0));

    // Phase 2: run each queued effect once. Effects run outside the batch,
    // so their own writes propagate immediately.
    let mut runs = 0usize;
    while let Some(observer) = RUNTIME.with(|rt| {
        let next = rt.pending_effects.borrow_mut().pop_front();
        if let Some(observer) = &next {
            rt.pending_effect_ids
                .borrow_mut()
                .remove(&observer.scheduled_id());
        }
        next
    }) {
        runs += 1;
        if runs > MAX_FLUSH_ROUNDS {
            tracing::error!(
                limit = MAX_FLUSH_ROUNDS,
                "effect queue did not drain; dropping remaining effects"
            );
            RUNTIME.with(|rt| {
                rt.pending_effects.borrow_mut().clear();
                rt.pending_effect_ids.borrow_mut().clear();
            });
            break;
        }
        observer.run_scheduled();
    }
}

// ---------------------------------------------------------------------------
// Failure isolation
// ---------------------------------------------------------------------------

/// Extract a readable message from a panic payload.
#[must_use]
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Run one listener, containing a panic so sibling listeners still run.
///
/// Returns `false` when the listener panicked.
pub(crate) fn isolate(kind: &'static str, id: u64, f: impl FnOnce()) -> bool {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => true,
        Err(payload) => {
            tracing::error!(
                kind,
                id,
                message = %panic_message(payload.as_ref()),
                "reactive listener panicked"
            );
            false
        }
    }
}
