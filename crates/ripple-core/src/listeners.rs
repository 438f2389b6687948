#![forbid(unsafe_code)]

//! Ordered listener storage shared by [`Signal`](crate::Signal) and
//! [`Computed`](crate::Computed).
//!
//! Notification snapshots the listener list before calling anything. A
//! listener registered during a notification first fires on the next one; a
//! listener disposed during a notification is skipped if it has not run yet.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::runtime::{self, next_id};
use crate::subscription::Subscription;

struct Entry<T> {
    id: u64,
    active: Cell<bool>,
    callback: Box<dyn Fn(&T)>,
}

type Entries<T> = RefCell<Vec<Rc<Entry<T>>>>;

pub(crate) struct ListenerSet<T> {
    entries: Rc<Entries<T>>,
}

impl<T: 'static> ListenerSet<T> {
    pub(crate) fn new() -> Self {
        Self {
            entries: Rc::new(RefCell::new(Vec::new())),
        }
    }

    pub(crate) fn add(&self, callback: Box<dyn Fn(&T)>) -> Subscription {
        let entry = Rc::new(Entry {
            id: next_id(),
            active: Cell::new(true),
            callback,
        });
        self.entries.borrow_mut().push(Rc::clone(&entry));

        let weak: Weak<Entries<T>> = Rc::downgrade(&self.entries);
        Subscription::new(move || {
            entry.active.set(false);
            if let Some(entries) = weak.upgrade() {
                entries.borrow_mut().retain(|e| e.id != entry.id);
            }
        })
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    /// Call every listener registered before this call, in registration order.
    pub(crate) fn notify(&self, value: &T, kind: &'static str, source_id: u64) {
        let snapshot: Vec<Rc<Entry<T>>> = self.entries.borrow().clone();
        for entry in snapshot {
            if entry.active.get() {
                runtime::isolate(kind, source_id, || (entry.callback)(value));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_in_registration_order() {
        let set = ListenerSet::<i32>::new();
        let log = Rc::new(RefCell::new(Vec::new()));
        let l1 = Rc::clone(&log);
        let l2 = Rc::clone(&log);
        let _a = set.add(Box::new(move |v| l1.borrow_mut().push(("a", *v))));
        let _b = set.add(Box::new(move |v| l2.borrow_mut().push(("b", *v))));
        set.notify(&3, "test", 0);
        assert_eq!(*log.borrow(), vec![("a", 3), ("b", 3)]);
    }

    #[test]
    fn dispose_removes_entry() {
        let set = ListenerSet::<i32>::new();
        let sub = set.add(Box::new(|_| {}));
        assert_eq!(set.len(), 1);
        sub.dispose();
        assert!(set.is_empty());
    }

    #[test]
    fn panicking_listener_does_not_block_others() {
        let set = ListenerSet::<i32>::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let _a = set.add(Box::new(|_| panic!("listener failure")));
        let _b = set.add(Box::new(move |_| h.set(h.get() + 1)));
        set.notify(&1, "test", 0);
        assert_eq!(hits.get(), 1);
    }
}
