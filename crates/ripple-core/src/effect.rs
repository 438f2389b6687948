#![forbid(unsafe_code)]

//! Side-effecting observers that re-run when their dependencies change.
//!
//! [`effect`] runs its function immediately inside a tracking frame. Every
//! signal or computed value read during that run becomes a dependency; a
//! change to any of them re-runs the function (or queues it, inside a batch).
//! Dependencies are re-collected on every run.
//!
//! The function may return a cleanup (see [`IntoCleanup`]) that runs before
//! the next run and on disposal.
//!
//! # Invariants
//!
//! 1. A running effect that is triggered again (for instance by writing one
//!    of its own dependencies) does not recurse: the nested trigger is logged
//!    and dropped.
//! 2. After [`Effect::dispose`] the function never runs again and every
//!    dependency edge is released.
//!
//! # Failure Modes
//!
//! - **Effect function panics**: contained and logged. Dependencies read
//!   before the panic stay registered, so the effect can recover on the next
//!   change.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::runtime::{self, Scheduled, next_id};
use crate::subscription::Subscription;

/// Cleanup returned by an effect run.
pub type Cleanup = Box<dyn FnOnce()>;

/// Conversion from an effect function's return value into an optional
/// cleanup.
pub trait IntoCleanup {
    fn into_cleanup(self) -> Option<Cleanup>;
}

impl IntoCleanup for () {
    fn into_cleanup(self) -> Option<Cleanup> {
        None
    }
}

impl IntoCleanup for Cleanup {
    fn into_cleanup(self) -> Option<Cleanup> {
        Some(self)
    }
}

impl IntoCleanup for Option<Cleanup> {
    fn into_cleanup(self) -> Option<Cleanup> {
        self
    }
}

struct EffectInner {
    id: u64,
    run: RefCell<Box<dyn FnMut() -> Option<Cleanup>>>,
    cleanup: RefCell<Option<Cleanup>>,
    deps: RefCell<Vec<Subscription>>,
    running: Cell<bool>,
    disposed: Cell<bool>,
    runs: Cell<u64>,
    this: Weak<EffectInner>,
}

impl EffectInner {
    fn execute(&self) {
        if self.disposed.get() {
            return;
        }
        if self.running.get() {
            tracing::warn!(effect = self.id, "effect re-entered itself; skipping");
            return;
        }
        self.running.set(true);

        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            runtime::isolate("effect-cleanup", self.id, cleanup);
        }

        let mut returned = None;
        let ((), frame) = runtime::with_tracking(|| {
            runtime::isolate("effect", self.id, || {
                let mut run = self.run.borrow_mut();
                returned = (&mut *run)();
            });
        });
        *self.cleanup.borrow_mut() = returned;

        let weak = self.this.clone();
        let on_change: Rc<dyn Fn()> = Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                runtime::schedule(inner);
            }
        });
        let subs: Vec<Subscription> = frame
            .into_deps()
            .into_iter()
            .map(|dep| dep.subscribe_change(Rc::clone(&on_change)))
            .collect();
        let old = std::mem::replace(&mut *self.deps.borrow_mut(), subs);
        drop(old);

        self.runs.set(self.runs.get() + 1);
        self.running.set(false);

        // Disposed from inside its own run: release what the run registered.
        if self.disposed.get() {
            self.release();
        }
    }

    fn release(&self) {
        let deps = std::mem::take(&mut *self.deps.borrow_mut());
        drop(deps);
        if let Some(cleanup) = self.cleanup.borrow_mut().take() {
            runtime::isolate("effect-cleanup", self.id, cleanup);
        }
    }
}

impl Scheduled for EffectInner {
    fn scheduled_id(&self) -> u64 {
        self.id
    }

    fn run_scheduled(self: Rc<Self>) {
        self.execute();
    }
}

/// Handle to a running effect. Dropping the handle disposes the effect.
pub struct Effect {
    inner: Rc<EffectInner>,
}

impl fmt::Debug for Effect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("id", &self.inner.id)
            .field("runs", &self.inner.runs.get())
            .field("disposed", &self.inner.disposed.get())
            .finish()
    }
}

/// Run `f` now and again whenever a signal it read changes.
pub fn effect<R: IntoCleanup>(mut f: impl FnMut() -> R + 'static) -> Effect {
    let inner = Rc::new_cyclic(|this| EffectInner {
        id: next_id(),
        run: RefCell::new(Box::new(move || f().into_cleanup())),
        cleanup: RefCell::new(None),
        deps: RefCell::new(Vec::new()),
        running: Cell::new(false),
        disposed: Cell::new(false),
        runs: Cell::new(0),
        this: this.clone(),
    });
    inner.execute();
    Effect { inner }
}

impl Effect {
    /// Stop the effect: release dependencies and run the pending cleanup.
    /// Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        if !self.inner.running.get() {
            self.inner.release();
        }
    }

    /// Whether [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Number of completed runs.
    #[must_use]
    pub fn run_count(&self) -> u64 {
        self.inner.runs.get()
    }

    /// Number of sources the last run depended on.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.deps.borrow().len()
    }

    /// Let the effect run for the rest of the thread's life.
    ///
    /// A detached effect can no longer be disposed and its state is never
    /// freed. Keep the handle, or use
    /// [`into_subscription`](Self::into_subscription), when it must stop.
    pub fn detach(self) {
        std::mem::forget(self);
    }

    /// Convert into a [`Subscription`] that disposes the effect.
    #[must_use]
    pub fn into_subscription(self) -> Subscription {
        Subscription::new(move || self.dispose())
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::batch;
    use crate::computed::computed;
    use crate::signal::Signal;

    #[test]
    fn runs_immediately_and_on_change() {
        let s = Signal::new(1);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (s2, seen2) = (s.clone(), Rc::clone(&seen));
        let e = effect(move || seen2.borrow_mut().push(s2.get()));
        s.set(2);
        s.set(3);
        assert_eq!(*seen.borrow(), vec![1, 2, 3]);
        assert_eq!(e.run_count(), 3);
    }

    #[test]
    fn detached_effect_keeps_running() {
        let s = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (s2, seen2) = (s.clone(), Rc::clone(&seen));
        effect(move || seen2.borrow_mut().push(s2.get())).detach();
        s.set(1);
        s.set(2);
        assert_eq!(*seen.borrow(), vec![0, 1, 2]);
        assert_eq!(s.listener_count(), 1);
    }

    #[test]
    fn batch_runs_effect_once_with_final_value() {
        let x = Signal::new(0);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (x2, seen2) = (x.clone(), Rc::clone(&seen));
        let _e = effect(move || seen2.borrow_mut().push(x2.get()));
        batch(|| {
            x.set(1);
            x.set(2);
        });
        assert_eq!(*seen.borrow(), vec![0, 2]);
    }

    #[test]
    fn batch_dedupes_across_signals() {
        let a = Signal::new(0);
        let b = Signal::new(0);
        let runs = Rc::new(Cell::new(0));
        let (a2, b2, r) = (a.clone(), b.clone(), Rc::clone(&runs));
        let _e = effect(move || {
            let _ = a2.get() + b2.get();
            r.set(r.get() + 1);
        });
        batch(|| {
            a.set(1);
            b.set(1);
        });
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn cleanup_runs_before_rerun_and_on_dispose() {
        let s = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let (s2, l) = (s.clone(), Rc::clone(&log));
        let e = effect(move || -> Cleanup {
            let v = s2.get();
            l.borrow_mut().push(format!("run {v}"));
            let l = Rc::clone(&l);
            Box::new(move || l.borrow_mut().push(format!("cleanup {v}")))
        });
        s.set(1);
        e.dispose();
        assert_eq!(
            *log.borrow(),
            vec!["run 0", "cleanup 0", "run 1", "cleanup 1"]
        );
    }

    #[test]
    fn dispose_stops_reruns_and_releases_deps() {
        let s = Signal::new(0);
        let runs = Rc::new(Cell::new(0));
        let (s2, r) = (s.clone(), Rc::clone(&runs));
        let e = effect(move || {
            let _ = s2.get();
            r.set(r.get() + 1);
        });
        assert_eq!(s.listener_count(), 1);
        e.dispose();
        e.dispose();
        s.set(5);
        assert_eq!(runs.get(), 1);
        assert_eq!(s.listener_count(), 0);
    }

    #[test]
    fn self_write_does_not_recurse() {
        let s = Signal::new(0);
        let s2 = s.clone();
        let e = effect(move || {
            let v = s2.get();
            if v < 100 {
                s2.set(v + 1);
            }
        });
        assert_eq!(e.run_count(), 1);
        assert_eq!(s.peek(), 1);
    }

    #[test]
    fn panic_in_effect_is_contained() {
        let s = Signal::new(0);
        let s2 = s.clone();
        let e = effect(move || {
            if s2.get() == 1 {
                panic!("effect failure");
            }
        });
        s.set(1);
        s.set(2);
        assert_eq!(e.run_count(), 3);
        assert_eq!(s.listener_count(), 1);
    }

    #[test]
    fn tracks_computed_dependencies() {
        let source = Signal::new(1);
        let s = source.clone();
        let doubled = computed(move || s.get() * 2);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let (d, seen2) = (doubled.clone(), Rc::clone(&seen));
        let _e = effect(move || seen2.borrow_mut().push(d.get()));
        source.set(4);
        assert_eq!(*seen.borrow(), vec![2, 8]);
    }

    #[test]
    fn drop_handle_disposes() {
        let s = Signal::new(0);
        let s2 = s.clone();
        {
            let _e = effect(move || {
                let _ = s2.get();
            });
            assert_eq!(s.listener_count(), 1);
        }
        assert_eq!(s.listener_count(), 0);
    }
}
