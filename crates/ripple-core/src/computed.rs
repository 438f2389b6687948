#![forbid(unsafe_code)]

//! Lazily recomputed values derived from other reactive sources.
//!
//! # Design
//!
//! [`Computed<T>`] wraps a compute function and its cached result in shared,
//! reference-counted storage. When a dependency notifies, the cached value is
//! marked stale. The next read recomputes it.
//!
//! Dependencies are either discovered automatically ([`computed`]: every
//! source read during the compute function is tracked, and the set is
//! refreshed on each recomputation) or fixed up front
//! ([`Computed::from_signal`], [`Computed::from2`]).
//!
//! A computed value with listeners of its own must deliver values to them, so
//! on a dependency change it recomputes immediately and notifies only if the
//! result differs from the cached one. Without listeners it stays lazy.
//!
//! # Invariants
//!
//! 1. `get()` never returns a value computed before the latest dependency
//!    change.
//! 2. The compute function runs at most once per dependency change cycle.
//! 3. `version` increments by exactly 1 per recomputation.
//!
//! # Failure Modes
//!
//! - **Compute function panics**: the panic propagates to the reader; the
//!   value stays stale so the next read retries.
//! - **Cycle** (the compute function reads its own value): panics with a
//!   descriptive message. This is a programming error.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use crate::listeners::ListenerSet;
use crate::runtime::{self, Pending, Source, next_id};
use crate::signal::{ReadSignal, Readable, Signal};
use crate::subscription::Subscription;

struct ComputedInner<T> {
    id: u64,
    compute: Box<dyn Fn() -> T>,
    cached: RefCell<Option<T>>,
    dirty: Cell<bool>,
    version: Cell<u64>,
    computing: Cell<bool>,
    /// Auto-tracked dependencies are replaced on every recomputation.
    tracked: bool,
    dep_subscriptions: RefCell<Vec<Subscription>>,
    listeners: ListenerSet<T>,
    /// Back-reference used to build dependency callbacks.
    this: Weak<ComputedInner<T>>,
}

impl<T: Clone + PartialEq + 'static> ComputedInner<T> {
    fn refresh(&self) {
        if !self.dirty.get() && self.cached.borrow().is_some() {
            return;
        }
        assert!(
            !self.computing.get(),
            "computed value {} read itself while computing (dependency cycle)",
            self.id
        );
        self.computing.set(true);

        struct Reset<'a>(&'a Cell<bool>);
        impl Drop for Reset<'_> {
            fn drop(&mut self) {
                self.0.set(false);
            }
        }
        let _reset = Reset(&self.computing);

        let value = if self.tracked {
            let (value, frame) = runtime::with_tracking(|| (self.compute)());
            let on_change = self.on_change_callback();
            let subs: Vec<Subscription> = frame
                .into_deps()
                .into_iter()
                .filter(|dep| dep.source_id() != self.id)
                .map(|dep| dep.subscribe_change(Rc::clone(&on_change)))
                .collect();
            let old = std::mem::replace(&mut *self.dep_subscriptions.borrow_mut(), subs);
            drop(old);
            value
        } else {
            runtime::untracked(|| (self.compute)())
        };

        *self.cached.borrow_mut() = Some(value);
        self.dirty.set(false);
        self.version.set(self.version.get() + 1);
    }

    fn on_change_callback(&self) -> Rc<dyn Fn()> {
        let weak = self.this.clone();
        Rc::new(move || {
            if let Some(inner) = weak.upgrade() {
                inner.mark_stale();
            }
        })
    }

    fn mark_stale(self: Rc<Self>) {
        self.dirty.set(true);
        if self.listeners.is_empty() {
            return;
        }
        if runtime::in_batch() {
            let id = self.id;
            runtime::defer(id, || self as Rc<dyn Pending>);
        } else {
            self.flush_pending();
        }
    }

    fn current(&self) -> T {
        self.refresh();
        match self.cached.borrow().as_ref() {
            Some(value) => value.clone(),
            None => unreachable!("refresh always fills the cache"),
        }
    }
}

impl<T: Clone + PartialEq + 'static> Pending for ComputedInner<T> {
    fn flush_pending(&self) {
        if !self.dirty.get() {
            return;
        }
        let previous = self.cached.borrow().clone();
        let next = self.current();
        if previous.as_ref() != Some(&next) {
            self.listeners.notify(&next, "computed", self.id);
        }
    }
}

impl<T: Clone + PartialEq + 'static> Source for ComputedInner<T> {
    fn source_id(&self) -> u64 {
        self.id
    }

    fn subscribe_change(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Subscription {
        // A dependent needs a baseline to compare against.
        self.refresh();
        self.listeners.add(Box::new(move |_| on_change()))
    }
}

/// A lazily evaluated, memoized reactive value.
///
/// Cloning a `Computed` creates a new handle to the **same** state.
pub struct Computed<T> {
    inner: Rc<ComputedInner<T>>,
}

impl<T> Clone for Computed<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Computed<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computed")
            .field("id", &self.inner.id)
            .field("cached", &self.inner.cached.borrow())
            .field("dirty", &self.inner.dirty.get())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

/// Create an auto-tracking computed value.
pub fn computed<T: Clone + PartialEq + 'static>(compute: impl Fn() -> T + 'static) -> Computed<T> {
    Computed::build(Box::new(compute), true)
}

impl<T: Clone + PartialEq + 'static> Computed<T> {
    fn build(compute: Box<dyn Fn() -> T>, tracked: bool) -> Self {
        let inner = Rc::new_cyclic(|this| ComputedInner {
            id: next_id(),
            compute,
            cached: RefCell::new(None),
            dirty: Cell::new(true),
            version: Cell::new(0),
            computing: Cell::new(false),
            tracked,
            dep_subscriptions: RefCell::new(Vec::new()),
            listeners: ListenerSet::new(),
            this: this.clone(),
        });
        Self { inner }
    }

    fn with_fixed_deps(compute: Box<dyn Fn() -> T>, sources: Vec<Rc<dyn Source>>) -> Self {
        let this = Self::build(compute, false);
        let on_change = this.inner.on_change_callback();
        let subs = sources
            .into_iter()
            .map(|source| source.subscribe_change(Rc::clone(&on_change)))
            .collect();
        *this.inner.dep_subscriptions.borrow_mut() = subs;
        this
    }

    /// Derive a value from a single signal.
    pub fn from_signal<S: Clone + PartialEq + 'static>(
        source: &Signal<S>,
        map: impl Fn(&S) -> T + 'static,
    ) -> Self {
        let src = source.clone();
        Self::with_fixed_deps(
            Box::new(move || src.with(|v| map(v))),
            vec![source.as_source()],
        )
    }

    /// Derive a value from two signals.
    pub fn from2<S1, S2>(
        s1: &Signal<S1>,
        s2: &Signal<S2>,
        map: impl Fn(&S1, &S2) -> T + 'static,
    ) -> Self
    where
        S1: Clone + PartialEq + 'static,
        S2: Clone + PartialEq + 'static,
    {
        let a = s1.clone();
        let b = s2.clone();
        Self::with_fixed_deps(
            Box::new(move || a.with(|v1| b.with(|v2| map(v1, v2)))),
            vec![s1.as_source(), s2.as_source()],
        )
    }

    /// Current value, recomputing first if stale. Registers a dependency.
    #[must_use]
    pub fn get(&self) -> T {
        let inner = &self.inner;
        runtime::track(inner.id, || Rc::clone(inner) as Rc<dyn Source>);
        inner.current()
    }

    /// Current value without registering a dependency.
    #[must_use]
    pub fn peek(&self) -> T {
        self.inner.current()
    }

    /// Register `listener` to run when the derived value changes.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.inner.refresh();
        self.inner.listeners.add(Box::new(listener))
    }

    /// Whether the cached value is stale.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.get()
    }

    /// Force the next read to recompute.
    pub fn invalidate(&self) {
        Rc::clone(&self.inner).mark_stale();
    }

    /// Number of recomputations so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of sources this value currently depends on.
    #[must_use]
    pub fn dependency_count(&self) -> usize {
        self.inner.dep_subscriptions.borrow().len()
    }

    /// Process-unique id.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// A read-only view of this value.
    #[must_use]
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal::from(self.clone())
    }
}

impl<T: Clone + PartialEq + 'static> Readable<T> for Computed<T> {
    fn get(&self) -> T {
        Computed::get(self)
    }

    fn peek(&self) -> T {
        Computed::peek(self)
    }

    fn subscribe_dyn(&self, listener: Box<dyn Fn(&T)>) -> Subscription {
        self.inner.refresh();
        self.inner.listeners.add(listener)
    }

    fn source_id(&self) -> u64 {
        self.inner.id
    }
}

impl<T: Clone + PartialEq + 'static> From<Computed<T>> for ReadSignal<T> {
    fn from(computed: Computed<T>) -> Self {
        Self::new(computed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::batch;

    #[test]
    fn doubles_source() {
        let source = Signal::new(0);
        let s = source.clone();
        let doubled = computed(move || s.get() * 2);

        source.set(5);
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn subscriber_fires_once_with_new_value() {
        let source = Signal::new(0);
        let s = source.clone();
        let doubled = computed(move || s.get() * 2);

        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = doubled.subscribe(move |v| l.borrow_mut().push(*v));

        source.set(5);
        assert_eq!(doubled.get(), 10);
        assert_eq!(*log.borrow(), vec![10]);
    }

    #[test]
    fn lazy_until_read() {
        let runs = Rc::new(Cell::new(0u32));
        let r = Rc::clone(&runs);
        let source = Signal::new(1);
        let s = source.clone();
        let c = computed(move || {
            r.set(r.get() + 1);
            s.get() + 1
        });
        assert_eq!(runs.get(), 0);
        assert_eq!(c.get(), 2);
        assert_eq!(runs.get(), 1);

        source.set(2);
        source.set(3);
        assert_eq!(runs.get(), 1, "no eager recompute without listeners");
        assert!(c.is_dirty());
        assert_eq!(c.get(), 4);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn memoizes_between_reads() {
        let runs = Rc::new(Cell::new(0u32));
        let r = Rc::clone(&runs);
        let source = Signal::new(10);
        let c = Computed::from_signal(&source, move |v| {
            r.set(r.get() + 1);
            v * 2
        });
        assert_eq!(c.get(), 20);
        assert_eq!(c.get(), 20);
        assert_eq!(runs.get(), 1);
        assert_eq!(c.version(), 1);
    }

    #[test]
    fn two_explicit_deps() {
        let w = Signal::new(10);
        let h = Signal::new(20);
        let area = Computed::from2(&w, &h, |w, h| w * h);
        assert_eq!(area.get(), 200);
        w.set(5);
        assert_eq!(area.get(), 100);
        assert_eq!(area.dependency_count(), 2);
    }

    #[test]
    fn dynamic_dependencies_follow_branches() {
        let flag = Signal::new(true);
        let a = Signal::new(1);
        let b = Signal::new(100);
        let (f, a2, b2) = (flag.clone(), a.clone(), b.clone());
        let c = computed(move || if f.get() { a2.get() } else { b2.get() });

        assert_eq!(c.get(), 1);
        assert_eq!(c.dependency_count(), 2);
        flag.set(false);
        assert_eq!(c.get(), 100);
        assert_eq!(a.listener_count(), 0, "stale branch unsubscribed");
        assert_eq!(b.listener_count(), 1);
    }

    #[test]
    fn unchanged_result_is_not_renotified() {
        let source = Signal::new(1);
        let s = source.clone();
        let parity = computed(move || s.get() % 2);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = parity.subscribe(move |_| h.set(h.get() + 1));
        source.set(3);
        assert_eq!(hits.get(), 0);
        source.set(4);
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn chained_computed() {
        let source = Signal::new(2);
        let s = source.clone();
        let squared = computed(move || s.get() * s.get());
        let sq = squared.clone();
        let plus_one = computed(move || sq.get() + 1);
        assert_eq!(plus_one.get(), 5);
        source.set(3);
        assert_eq!(plus_one.get(), 10);
    }

    #[test]
    fn batched_writes_notify_once() {
        let source = Signal::new(0);
        let s = source.clone();
        let doubled = computed(move || s.get() * 2);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = doubled.subscribe(move |v| l.borrow_mut().push(*v));
        batch(|| {
            source.set(1);
            source.set(2);
        });
        assert_eq!(*log.borrow(), vec![4]);
    }

    #[test]
    fn invalidate_forces_recompute() {
        let runs = Rc::new(Cell::new(0u32));
        let r = Rc::clone(&runs);
        let c = computed(move || {
            r.set(r.get() + 1);
            7
        });
        assert_eq!(c.get(), 7);
        c.invalidate();
        assert!(c.is_dirty());
        assert_eq!(c.get(), 7);
        assert_eq!(runs.get(), 2);
    }

    #[test]
    fn read_only_view() {
        let source = Signal::new(3);
        let s = source.clone();
        let c = computed(move || s.get() + 1);
        let view = c.read_only();
        assert_eq!(view.get(), 4);
        assert_eq!(view.id(), c.id());
    }
}
