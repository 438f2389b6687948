#![forbid(unsafe_code)]

//! Writable reactive cells.
//!
//! # Design
//!
//! [`Signal<T>`] is a cheaply cloneable handle to shared, single-threaded
//! state (`Rc` inside). Reads through [`get()`](Signal::get) or
//! [`with()`](Signal::with) register the running effect or computed value as a
//! dependent; [`peek()`](Signal::peek) never does.
//!
//! # Invariants
//!
//! 1. Writing a value equal to the current one is a no-op: no version bump,
//!    no notification.
//! 2. Listeners observe the fully updated value; the cell is never borrowed
//!    while listeners run, so a listener may read or write the signal.
//! 3. Inside a batch the value updates immediately but listeners are notified
//!    once, at flush, with the final value, and only if it differs from the
//!    value held when the batch first touched the signal.
//!
//! # Failure Modes
//!
//! - **Listener panics**: contained and logged; remaining listeners still run.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use crate::listeners::ListenerSet;
use crate::runtime::{self, Pending, Source, next_id};
use crate::subscription::Subscription;

pub(crate) struct SignalInner<T> {
    id: u64,
    value: RefCell<T>,
    version: Cell<u64>,
    listeners: ListenerSet<T>,
    /// Value held before the first write of the open batch.
    batched_from: RefCell<Option<T>>,
}

impl<T: Clone + PartialEq + 'static> SignalInner<T> {
    fn notify(&self) {
        let value = self.value.borrow().clone();
        self.listeners.notify(&value, "signal", self.id);
    }
}

impl<T: Clone + PartialEq + 'static> Source for SignalInner<T> {
    fn source_id(&self) -> u64 {
        self.id
    }

    fn subscribe_change(self: Rc<Self>, on_change: Rc<dyn Fn()>) -> Subscription {
        self.listeners.add(Box::new(move |_| on_change()))
    }
}

impl<T: Clone + PartialEq + 'static> Pending for SignalInner<T> {
    fn flush_pending(&self) {
        let from = self.batched_from.borrow_mut().take();
        if let Some(from) = from
            && *self.value.borrow() == from
        {
            return;
        }
        self.notify();
    }
}

/// A shared, version-tracked reactive value.
///
/// Cloning a `Signal` creates a new handle to the **same** cell.
pub struct Signal<T> {
    inner: Rc<SignalInner<T>>,
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("id", &self.inner.id)
            .field("value", &self.inner.value.borrow())
            .field("version", &self.inner.version.get())
            .finish()
    }
}

/// Create a signal holding `initial`.
pub fn signal<T: Clone + PartialEq + 'static>(initial: T) -> Signal<T> {
    Signal::new(initial)
}

impl<T: Clone + PartialEq + 'static> Signal<T> {
    /// Create a signal holding `initial`.
    #[must_use]
    pub fn new(initial: T) -> Self {
        Self {
            inner: Rc::new(SignalInner {
                id: next_id(),
                value: RefCell::new(initial),
                version: Cell::new(0),
                listeners: ListenerSet::new(),
                batched_from: RefCell::new(None),
            }),
        }
    }

    fn track(&self) {
        runtime::track(self.inner.id, || self.as_source());
    }

    pub(crate) fn as_source(&self) -> Rc<dyn Source> {
        Rc::clone(&self.inner) as Rc<dyn Source>
    }

    /// Read the current value, registering the running observer as a
    /// dependent.
    #[must_use]
    pub fn get(&self) -> T {
        self.track();
        self.inner.value.borrow().clone()
    }

    /// Read the current value without registering a dependency.
    #[must_use]
    pub fn peek(&self) -> T {
        self.inner.value.borrow().clone()
    }

    /// Borrow the current value, registering a dependency.
    ///
    /// # Panics
    ///
    /// Panics if `f` writes to this same signal (re-entrant borrow).
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        self.track();
        f(&self.inner.value.borrow())
    }

    /// Replace the value, notifying listeners if it changed.
    pub fn set(&self, value: T) {
        {
            let mut current = self.inner.value.borrow_mut();
            if *current == value {
                return;
            }
            let previous = std::mem::replace(&mut *current, value);
            if runtime::in_batch() {
                let mut from = self.inner.batched_from.borrow_mut();
                if from.is_none() {
                    *from = Some(previous);
                }
            }
        }
        self.inner.version.set(self.inner.version.get() + 1);

        if runtime::in_batch() {
            runtime::defer(self.inner.id, || Rc::clone(&self.inner) as Rc<dyn Pending>);
        } else {
            self.inner.notify();
        }
    }

    /// Mutate a copy of the value in place, then write it back.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.peek();
        f(&mut next);
        self.set(next);
    }

    /// Register `listener` to run after each change.
    ///
    /// The listener is not called for the current value. Dropping or
    /// disposing the returned [`Subscription`] unregisters it.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.inner.listeners.add(Box::new(listener))
    }

    /// Number of mutations that changed the value.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.version.get()
    }

    /// Number of live listeners, including effect and computed dependents.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.len()
    }

    /// Process-unique id of the underlying cell.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Whether two handles point at the same cell.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A read-only view of this signal.
    #[must_use]
    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal::from(self.clone())
    }
}

impl<T: Clone + PartialEq + Default + 'static> Default for Signal<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

// ---------------------------------------------------------------------------
// ReadSignal<T>: type-erased read-only view
// ---------------------------------------------------------------------------

/// Read-side operations shared by every reactive value.
pub trait Readable<T> {
    /// Tracked read.
    fn get(&self) -> T;
    /// Untracked read.
    fn peek(&self) -> T;
    /// Register a change listener.
    fn subscribe_dyn(&self, listener: Box<dyn Fn(&T)>) -> Subscription;
    /// Identity of the underlying source.
    fn source_id(&self) -> u64;
}

impl<T: Clone + PartialEq + 'static> Readable<T> for Signal<T> {
    fn get(&self) -> T {
        Signal::get(self)
    }

    fn peek(&self) -> T {
        Signal::peek(self)
    }

    fn subscribe_dyn(&self, listener: Box<dyn Fn(&T)>) -> Subscription {
        self.inner.listeners.add(listener)
    }

    fn source_id(&self) -> u64 {
        self.inner.id
    }
}

/// A read-only handle over a [`Signal`] or [`Computed`](crate::Computed).
///
/// Equality is identity: two `ReadSignal`s are equal when they read the same
/// source.
pub struct ReadSignal<T> {
    source: Rc<dyn Readable<T>>,
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self {
            source: Rc::clone(&self.source),
        }
    }
}

impl<T> PartialEq for ReadSignal<T> {
    fn eq(&self, other: &Self) -> bool {
        self.source.source_id() == other.source.source_id()
    }
}

impl<T> fmt::Debug for ReadSignal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadSignal")
            .field("id", &self.source.source_id())
            .finish()
    }
}

impl<T: 'static> ReadSignal<T> {
    /// Wrap any readable source.
    pub fn new(source: impl Readable<T> + 'static) -> Self {
        Self {
            source: Rc::new(source),
        }
    }

    /// Tracked read.
    #[must_use]
    pub fn get(&self) -> T {
        self.source.get()
    }

    /// Untracked read.
    #[must_use]
    pub fn peek(&self) -> T {
        self.source.peek()
    }

    /// Register `listener` to run after each change.
    pub fn subscribe(&self, listener: impl Fn(&T) + 'static) -> Subscription {
        self.source.subscribe_dyn(Box::new(listener))
    }

    /// Identity of the underlying source.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.source.source_id()
    }
}

impl<T: Clone + PartialEq + 'static> From<Signal<T>> for ReadSignal<T> {
    fn from(signal: Signal<T>) -> Self {
        Self::new(signal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::batch;

    #[test]
    fn get_set_roundtrip() {
        let s = Signal::new(1);
        assert_eq!(s.get(), 1);
        s.set(2);
        assert_eq!(s.get(), 2);
        assert_eq!(s.version(), 1);
    }

    #[test]
    fn equal_write_is_noop() {
        let s = Signal::new(5);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = s.subscribe(move |_| h.set(h.get() + 1));
        s.set(5);
        assert_eq!(hits.get(), 0);
        assert_eq!(s.version(), 0);
    }

    #[test]
    fn listener_sees_updated_value() {
        let s = Signal::new(0);
        let s2 = s.clone();
        let seen = Rc::new(Cell::new(-1));
        let seen2 = Rc::clone(&seen);
        let _sub = s.subscribe(move |v| {
            assert_eq!(*v, s2.peek());
            seen2.set(*v);
        });
        s.set(9);
        assert_eq!(seen.get(), 9);
    }

    #[test]
    fn unsubscribed_listener_not_notified() {
        let s = Signal::new(0);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let sub = s.subscribe(move |_| h.set(h.get() + 1));
        s.set(1);
        sub.dispose();
        s.set(2);
        assert_eq!(hits.get(), 1);
        assert_eq!(s.listener_count(), 0);
    }

    #[test]
    fn listener_added_during_notify_fires_next_time() {
        let s = Signal::new(0);
        let late_hits = Rc::new(Cell::new(0));
        let held: Rc<RefCell<Vec<Subscription>>> = Rc::new(RefCell::new(Vec::new()));

        let s2 = s.clone();
        let lh = Rc::clone(&late_hits);
        let held2 = Rc::clone(&held);
        let _outer = s.subscribe(move |_| {
            if held2.borrow().is_empty() {
                let lh = Rc::clone(&lh);
                let sub = s2.subscribe(move |_| lh.set(lh.get() + 1));
                held2.borrow_mut().push(sub);
            }
        });

        s.set(1);
        assert_eq!(late_hits.get(), 0, "snapshot taken at notify start");
        s.set(2);
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn listener_disposed_during_notify_is_skipped() {
        let s = Signal::new(0);
        let slot: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let hits = Rc::new(Cell::new(0));

        let slot2 = Rc::clone(&slot);
        let _first = s.subscribe(move |_| {
            if let Some(sub) = slot2.borrow_mut().take() {
                sub.dispose();
            }
        });
        let h = Rc::clone(&hits);
        *slot.borrow_mut() = Some(s.subscribe(move |_| h.set(h.get() + 1)));

        s.set(1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn listener_may_write_back() {
        let s = Signal::new(0);
        let s2 = s.clone();
        let _clamp = s.subscribe(move |v| {
            if *v > 10 {
                s2.set(10);
            }
        });
        s.set(50);
        assert_eq!(s.peek(), 10);
    }

    #[test]
    fn update_mutates_in_place() {
        let s = Signal::new(vec![1, 2]);
        s.update(|v| v.push(3));
        assert_eq!(s.get(), vec![1, 2, 3]);
    }

    #[test]
    fn batch_notifies_once_with_final_value() {
        let s = Signal::new(0);
        let log = Rc::new(RefCell::new(Vec::new()));
        let l = Rc::clone(&log);
        let _sub = s.subscribe(move |v| l.borrow_mut().push(*v));
        batch(|| {
            s.set(1);
            s.set(2);
            s.set(3);
        });
        assert_eq!(*log.borrow(), vec![3]);
    }

    #[test]
    fn batch_round_trip_to_original_is_silent() {
        let s = Signal::new(0);
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _sub = s.subscribe(move |_| h.set(h.get() + 1));
        batch(|| {
            s.set(7);
            s.set(0);
        });
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn read_signal_identity() {
        let s = Signal::new("a".to_string());
        let r1 = s.read_only();
        let r2 = ReadSignal::from(s.clone());
        let other = Signal::new("a".to_string()).read_only();
        assert_eq!(r1, r2);
        assert_ne!(r1, other);
        s.set("b".into());
        assert_eq!(r1.get(), "b");
    }
}
